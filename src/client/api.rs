//! Wire shapes exchanged with the session store.

use serde::{Deserialize, Serialize};

use crate::keyboard::finger::{Finger, Hand};
use crate::session::Mode;
use crate::session::record::Session;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub mode: Mode,
    pub raw_text: String,
    pub keystrokes: Vec<SubmitKeystroke>,
}

/// Keystroke as the store wants it: timestamp in float seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmitKeystroke {
    pub key: String,
    pub timestamp: f64,
    pub prev_key: Option<String>,
}

impl SubmitRequest {
    pub fn from_session(session: &Session) -> Self {
        Self {
            mode: session.mode,
            raw_text: session.text.clone(),
            keystrokes: session
                .keystrokes
                .iter()
                .map(|rk| SubmitKeystroke {
                    key: rk.keystroke.key.to_string(),
                    timestamp: rk.keystroke.timestamp / 1000.0,
                    prev_key: rk.keystroke.prev_key.map(|c| c.to_string()),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub keystroke_count: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: i64,
    pub mode: String,
    pub raw_text: String,
    pub timestamp: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub keystrokes: Vec<StoredKeystroke>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredKeystroke {
    #[serde(default)]
    pub id: Option<i64>,
    pub key: String,
    #[serde(default)]
    pub prev_key: Option<String>,
    pub timestamp: f64,
    #[serde(default)]
    pub finger: Option<String>,
    #[serde(default)]
    pub hand: Option<String>,
}

impl StoredKeystroke {
    pub fn key_is(&self, ch: char) -> bool {
        let mut chars = self.key.chars();
        chars.next() == Some(ch) && chars.next().is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerAnnotation {
    pub keystroke_id: i64,
    pub finger: Finger,
    pub hand: Hand,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerAnnotationsUpdate {
    pub session_id: i64,
    pub annotations: Vec<FingerAnnotation>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateFingersResponse {
    #[serde(default)]
    pub annotations_count: usize,
}

/// `GET /sessions` body. Listed sessions carry no keystrokes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SessionList {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub sessions: Vec<StoredSession>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LabelUpdate {
    pub label: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: f64,
}
