use std::cell::Cell;

use chrono::Utc;

use crate::session::input::InputKey;
use crate::session::record::Keystroke;

/// Timestamp source for accepted keypresses, in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1000.0
    }
}

/// Clock whose time only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    Running,
    Complete,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrialEvent {
    /// Modifier, wrong character, or input after completion.
    Ignored,
    Accepted { index: usize },
    Completed(FinishedTrial),
    /// Tab/Escape: buffer discarded, caller should fetch a new text.
    Aborted,
}

/// The finalized keystroke list handed to the session assembler.
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedTrial {
    pub text: String,
    pub keystrokes: Vec<Keystroke>,
    pub session_start: f64,
}

pub struct TrialController {
    target: Vec<char>,
    text: String,
    cursor: usize,
    state: TrialState,
    session_start: Option<f64>,
    keystrokes: Vec<Keystroke>,
}

impl TrialController {
    pub fn new(text: &str) -> Self {
        Self {
            target: text.chars().collect(),
            text: text.to_string(),
            cursor: 0,
            state: TrialState::Idle,
            session_start: None,
            keystrokes: Vec::new(),
        }
    }

    /// Start over against a (possibly identical) target text.
    pub fn reset(&mut self, text: &str) {
        *self = Self::new(text);
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn target(&self) -> &[char] {
        &self.target
    }

    pub fn keystrokes(&self) -> &[Keystroke] {
        &self.keystrokes
    }

    pub fn progress(&self) -> f64 {
        if self.target.is_empty() {
            return 0.0;
        }
        self.cursor as f64 / self.target.len() as f64
    }

    pub fn handle_key(&mut self, key: InputKey, clock: &dyn Clock) -> TrialEvent {
        if key.is_abort() {
            self.abort();
            return TrialEvent::Aborted;
        }
        match key {
            InputKey::Char(ch) => self.process_char(ch, clock),
            _ => TrialEvent::Ignored,
        }
    }

    fn abort(&mut self) {
        self.keystrokes.clear();
        self.cursor = 0;
        self.session_start = None;
        self.state = TrialState::Idle;
    }

    fn process_char(&mut self, ch: char, clock: &dyn Clock) -> TrialEvent {
        if self.state == TrialState::Complete {
            return TrialEvent::Ignored;
        }
        let Some(&expected) = self.target.get(self.cursor) else {
            // Empty target: nothing can ever be accepted.
            return TrialEvent::Ignored;
        };
        if ch != expected {
            return TrialEvent::Ignored;
        }

        let now = clock.now_ms();
        if self.state == TrialState::Idle {
            self.state = TrialState::Running;
            self.session_start = Some(now);
        }

        let index = self.cursor;
        self.keystrokes.push(Keystroke {
            key: ch,
            timestamp: now,
            prev_key: index.checked_sub(1).map(|i| self.target[i]),
            index,
        });
        self.cursor += 1;

        if self.cursor < self.target.len() {
            return TrialEvent::Accepted { index };
        }

        self.state = TrialState::Complete;
        TrialEvent::Completed(FinishedTrial {
            text: self.text.clone(),
            keystrokes: self.keystrokes.clone(),
            session_start: self.session_start.unwrap_or(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_at(trial: &mut TrialController, clock: &ManualClock, ch: char, ms: f64) -> TrialEvent {
        clock.set(ms);
        trial.handle_key(InputKey::Char(ch), clock)
    }

    #[test]
    fn cat_example_produces_expected_keystrokes() {
        let clock = ManualClock::default();
        let mut trial = TrialController::new("cat");

        assert_eq!(type_at(&mut trial, &clock, 'c', 1000.0), TrialEvent::Accepted { index: 0 });
        assert_eq!(trial.state(), TrialState::Running);
        assert_eq!(type_at(&mut trial, &clock, 'a', 1150.0), TrialEvent::Accepted { index: 1 });

        let TrialEvent::Completed(finished) = type_at(&mut trial, &clock, 't', 1400.0) else {
            panic!("expected completion");
        };
        assert_eq!(trial.state(), TrialState::Complete);
        assert_eq!(finished.session_start, 1000.0);
        assert_eq!(
            finished.keystrokes,
            vec![
                Keystroke { key: 'c', timestamp: 1000.0, prev_key: None, index: 0 },
                Keystroke { key: 'a', timestamp: 1150.0, prev_key: Some('c'), index: 1 },
                Keystroke { key: 't', timestamp: 1400.0, prev_key: Some('a'), index: 2 },
            ]
        );
    }

    #[test]
    fn wrong_first_key_stays_idle() {
        let clock = ManualClock::default();
        let mut trial = TrialController::new("cat");
        assert_eq!(type_at(&mut trial, &clock, 'x', 5.0), TrialEvent::Ignored);
        assert_eq!(trial.cursor(), 0);
        assert_eq!(trial.state(), TrialState::Idle);
        assert!(trial.keystrokes().is_empty());
    }

    #[test]
    fn wrong_keys_mid_trial_are_invisible() {
        let clock = ManualClock::default();
        let mut trial = TrialController::new("ab");
        type_at(&mut trial, &clock, 'a', 0.0);
        type_at(&mut trial, &clock, 'x', 50.0);
        type_at(&mut trial, &clock, 'y', 60.0);
        let TrialEvent::Completed(finished) = type_at(&mut trial, &clock, 'b', 90.0) else {
            panic!("expected completion");
        };
        assert_eq!(finished.keystrokes.len(), 2);
        assert_eq!(finished.keystrokes[1].timestamp, 90.0);
    }

    #[test]
    fn modifiers_never_move_the_cursor() {
        use crate::session::input::ModifierKey;
        let clock = ManualClock::default();
        let mut trial = TrialController::new("Ab");
        for m in [ModifierKey::Shift, ModifierKey::Control, ModifierKey::Alt, ModifierKey::Meta] {
            assert_eq!(trial.handle_key(InputKey::Modifier(m), &clock), TrialEvent::Ignored);
        }
        assert_eq!(trial.cursor(), 0);
        type_at(&mut trial, &clock, 'A', 1.0);
        trial.handle_key(InputKey::Modifier(ModifierKey::Shift), &clock);
        assert_eq!(trial.cursor(), 1);
    }

    #[test]
    fn escape_and_tab_discard_buffer() {
        let clock = ManualClock::default();
        let mut trial = TrialController::new("abc");
        type_at(&mut trial, &clock, 'a', 1.0);
        type_at(&mut trial, &clock, 'b', 2.0);
        assert_eq!(trial.handle_key(InputKey::Escape, &clock), TrialEvent::Aborted);
        assert_eq!(trial.state(), TrialState::Idle);
        assert_eq!(trial.cursor(), 0);
        assert!(trial.keystrokes().is_empty());

        assert_eq!(trial.handle_key(InputKey::Tab, &clock), TrialEvent::Aborted);
        assert_eq!(trial.state(), TrialState::Idle);
    }

    #[test]
    fn empty_text_never_leaves_idle() {
        let clock = ManualClock::default();
        let mut trial = TrialController::new("");
        assert_eq!(type_at(&mut trial, &clock, 'a', 1.0), TrialEvent::Ignored);
        assert_eq!(type_at(&mut trial, &clock, ' ', 2.0), TrialEvent::Ignored);
        assert_eq!(trial.state(), TrialState::Idle);
        assert_eq!(trial.progress(), 0.0);
    }

    #[test]
    fn input_after_completion_is_ignored() {
        let clock = ManualClock::default();
        let mut trial = TrialController::new("a");
        assert!(matches!(type_at(&mut trial, &clock, 'a', 1.0), TrialEvent::Completed(_)));
        assert_eq!(type_at(&mut trial, &clock, 'a', 2.0), TrialEvent::Ignored);
        assert_eq!(trial.keystrokes().len(), 1);
    }

    #[test]
    fn reset_returns_to_idle_on_same_text() {
        let clock = ManualClock::default();
        let mut trial = TrialController::new("ab");
        type_at(&mut trial, &clock, 'a', 1.0);
        type_at(&mut trial, &clock, 'b', 2.0);
        trial.reset("ab");
        assert_eq!(trial.state(), TrialState::Idle);
        assert_eq!(trial.text(), "ab");
        assert!(trial.keystrokes().is_empty());
    }

    #[test]
    fn keys_form_prefix_of_target_until_complete() {
        let clock = ManualClock::default();
        let text = "the cat sat";
        let mut trial = TrialController::new(text);
        let presses = "tqhe xcatt sxat";
        let mut completed = false;
        for (i, ch) in presses.chars().enumerate() {
            clock.set(i as f64 * 10.0);
            if let TrialEvent::Completed(done) = trial.handle_key(InputKey::Char(ch), &clock) {
                let typed: String = done.keystrokes.iter().map(|k| k.key).collect();
                assert_eq!(typed, text);
                completed = true;
            } else {
                let typed: String = trial.keystrokes().iter().map(|k| k.key).collect();
                assert!(text.starts_with(&typed));
                assert_ne!(typed, text);
            }
        }
        assert!(completed);
    }
}
