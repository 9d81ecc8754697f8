use chrono::Utc;
use tracing::{debug, warn};

use crate::generator::{GenerationError, TextSource};
use crate::session::Mode;
use crate::session::input::InputKey;
use crate::session::record::{RecordedKeystroke, Session};
use crate::session::trial::{Clock, TrialController, TrialEvent, TrialState};

pub const PROBE_LENGTH: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub enum ProbePhase {
    AwaitingProbe,
    PracticeRun,
    RecordedRun,
    /// Text generation failed; `begin_probe` may be retried.
    Failed(String),
    /// All probes in the sequence have been recorded.
    Finished,
}

#[derive(Clone, Debug, Default)]
pub struct ProbeRunState {
    pub current_probe_text: Option<String>,
    pub is_practice_pass: bool,
    pub accumulated_recorded: Vec<RecordedKeystroke>,
    pub probe_sequence_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProbeEvent {
    Ignored,
    Accepted { index: usize },
    /// Practice pass done; the same text is now armed for the recorded pass.
    PracticeComplete,
    /// Recorded pass done. The session should be submitted, and `advance`
    /// called once the settle delay has passed.
    RecordedComplete(Session),
    Aborted,
}

/// Two-phase trial driver for short probe texts.
pub struct ProbeProtocol {
    phase: ProbePhase,
    run: ProbeRunState,
    trial: TrialController,
    probe_count: usize,
}

impl ProbeProtocol {
    pub fn new(probe_count: usize) -> Self {
        Self {
            phase: ProbePhase::AwaitingProbe,
            run: ProbeRunState::default(),
            trial: TrialController::new(""),
            probe_count,
        }
    }

    pub fn phase(&self) -> &ProbePhase {
        &self.phase
    }

    pub fn run_state(&self) -> &ProbeRunState {
        &self.run
    }

    pub fn trial(&self) -> &TrialController {
        &self.trial
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count
    }

    /// True between a recorded completion and the call to `advance`.
    pub fn is_settling(&self) -> bool {
        self.phase == ProbePhase::RecordedRun && self.trial.state() == TrialState::Complete
    }

    /// Fetch the next probe text and arm its practice pass.
    pub fn begin_probe(&mut self, source: &mut dyn TextSource) -> Result<(), GenerationError> {
        match self.phase {
            ProbePhase::AwaitingProbe | ProbePhase::Failed(_) => {}
            _ => return Ok(()),
        }

        let text = match source.generate(Mode::TrigraphTest) {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                let err = GenerationError::Empty(Mode::TrigraphTest);
                self.phase = ProbePhase::Failed(err.to_string());
                return Err(err);
            }
            Err(err) => {
                warn!(error = %err, "probe text generation failed");
                self.phase = ProbePhase::Failed(err.to_string());
                return Err(err);
            }
        };

        if text.chars().count() != PROBE_LENGTH {
            warn!(probe = %text, "probe text is not {PROBE_LENGTH} characters");
        }
        debug!(probe = %text, index = self.run.probe_sequence_index, "starting practice pass");

        self.trial.reset(&text);
        self.run.current_probe_text = Some(text);
        self.run.is_practice_pass = true;
        self.phase = ProbePhase::PracticeRun;
        Ok(())
    }

    pub fn handle_key(&mut self, key: InputKey, clock: &dyn Clock) -> ProbeEvent {
        if !matches!(self.phase, ProbePhase::PracticeRun | ProbePhase::RecordedRun) {
            return ProbeEvent::Ignored;
        }
        // The recorded pass is already submitted; only `advance` moves on.
        if self.is_settling() {
            return ProbeEvent::Ignored;
        }

        match self.trial.handle_key(key, clock) {
            TrialEvent::Ignored => ProbeEvent::Ignored,
            TrialEvent::Accepted { index } => ProbeEvent::Accepted { index },
            TrialEvent::Aborted => {
                self.run.current_probe_text = None;
                self.run.is_practice_pass = false;
                self.phase = ProbePhase::AwaitingProbe;
                ProbeEvent::Aborted
            }
            TrialEvent::Completed(finished) => {
                if self.phase == ProbePhase::PracticeRun {
                    // Practice timings are dropped here and never leave this module.
                    self.trial.reset(&finished.text);
                    self.run.is_practice_pass = false;
                    self.phase = ProbePhase::RecordedRun;
                    ProbeEvent::PracticeComplete
                } else {
                    let session = Session::assemble(
                        Mode::TrigraphTest,
                        &finished.text,
                        &finished.keystrokes,
                        finished.session_start,
                        Utc::now(),
                    );
                    self.run
                        .accumulated_recorded
                        .extend(session.keystrokes.iter().cloned());
                    ProbeEvent::RecordedComplete(session)
                }
            }
        }
    }

    /// Move on after the settle delay. No-op unless a recorded pass just finished.
    pub fn advance(&mut self) {
        if !self.is_settling() {
            return;
        }
        self.run.probe_sequence_index += 1;
        self.run.current_probe_text = None;
        self.phase = if self.run.probe_sequence_index >= self.probe_count {
            ProbePhase::Finished
        } else {
            ProbePhase::AwaitingProbe
        };
    }
}
