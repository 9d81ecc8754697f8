use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keyboard::finger::{Finger, Hand};
use crate::session::Mode;

/// One accepted keypress. Timestamps are epoch milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keystroke {
    pub key: char,
    pub timestamp: f64,
    pub prev_key: Option<char>,
    pub index: usize,
}

/// Server-assigned fields copied back during reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    pub finger: Option<Finger>,
    pub hand: Option<Hand>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedKeystroke {
    #[serde(flatten)]
    pub keystroke: Keystroke,
    pub duration: f64,
    #[serde(default)]
    pub annotation: Option<Annotation>,
}

impl RecordedKeystroke {
    pub fn is_reconciled(&self) -> bool {
        self.annotation.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub mode: Mode,
    pub text: String,
    pub keystrokes: Vec<RecordedKeystroke>,
    pub total_time: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<i64>,
}

impl Session {
    /// Build a session from a finalized keystroke list. `session_start` is the
    /// timestamp of the first accepted keypress.
    pub fn assemble(
        mode: Mode,
        text: &str,
        keystrokes: &[Keystroke],
        session_start: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let total_time = keystrokes
            .last()
            .map(|last| last.timestamp - session_start)
            .unwrap_or(0.0);

        Self {
            mode,
            text: text.to_string(),
            keystrokes: with_durations(keystrokes),
            total_time,
            timestamp: created_at,
            session_id: None,
        }
    }

    pub fn wpm(&self) -> f64 {
        estimate_wpm(&self.text, self.total_time)
    }

    pub fn reconciled_count(&self) -> usize {
        self.keystrokes.iter().filter(|k| k.is_reconciled()).count()
    }
}

/// `duration[0] = 0`, `duration[i] = timestamp[i] - timestamp[i-1]`.
pub fn with_durations(keystrokes: &[Keystroke]) -> Vec<RecordedKeystroke> {
    let mut prev_ts: Option<f64> = None;
    keystrokes
        .iter()
        .map(|ks| {
            let duration = prev_ts.map_or(0.0, |p| ks.timestamp - p);
            prev_ts = Some(ks.timestamp);
            RecordedKeystroke {
                keystroke: ks.clone(),
                duration,
                annotation: None,
            }
        })
        .collect()
}

/// Rough words-per-minute: words are counted by splitting on single spaces
/// (runs of spaces yield empty words that still count), and `total_time`
/// starts at the first keystroke, so the first character's own reaction time
/// is never included. Returns 0 when no time has elapsed.
pub fn estimate_wpm(text: &str, total_time_ms: f64) -> f64 {
    if total_time_ms <= 0.0 {
        return 0.0;
    }
    let word_count = text.split(' ').count() as f64;
    (word_count / (total_time_ms / 60000.0)).round()
}
