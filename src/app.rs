use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Instant;

use tracing::{info, warn};

use crate::client::submit::{Delivery, SubmissionWorker};
use crate::client::store::SessionStore;
use crate::config::Config;
use crate::event::AppEvent;
use crate::generator::TextSource;
use crate::session::Mode;
use crate::session::input::InputKey;
use crate::session::metrics::SessionMetrics;
use crate::session::probe::{ProbeEvent, ProbePhase, ProbeProtocol};
use crate::session::record::Session;
use crate::session::trial::{Clock, TrialController, TrialEvent};
use crate::store::json_store::JsonStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppScreen {
    Typing,
    Review,
    /// Text generation failed; `r` retries.
    Error,
}

/// Whichever controller currently owns the target text and cursor.
pub enum Runner {
    Single(TrialController),
    Probe(ProbeProtocol),
}

/// Latest finished session shown on the review screen.
pub struct Review {
    pub seq: u64,
    pub session: Session,
    pub metrics: SessionMetrics,
    pub pending: bool,
    /// Deleted from the store at the user's request.
    pub discarded: bool,
}

pub struct App {
    pub config: Config,
    pub mode: Mode,
    pub screen: AppScreen,
    pub runner: Runner,
    pub review: Option<Review>,
    pub status: Option<String>,
    pub error: Option<String>,
    pub in_flight: usize,
    pub should_quit: bool,
    source: Box<dyn TextSource>,
    store: Arc<dyn SessionStore>,
    clock: Box<dyn Clock>,
    worker: SubmissionWorker,
    journal: Option<JsonStore>,
    events: Sender<AppEvent>,
    next_seq: u64,
    settle_until: Option<Instant>,
}

impl App {
    pub fn new(
        config: Config,
        source: Box<dyn TextSource>,
        store: Arc<dyn SessionStore>,
        clock: Box<dyn Clock>,
        journal: Option<JsonStore>,
        events: Sender<AppEvent>,
    ) -> Self {
        let worker = SubmissionWorker::new(Arc::clone(&store), config.submit_options());
        let mode = config.mode;
        let runner = Self::runner_for(mode, &config);
        Self {
            config,
            mode,
            screen: AppScreen::Typing,
            runner,
            review: None,
            status: None,
            error: None,
            in_flight: 0,
            should_quit: false,
            source,
            store,
            clock,
            worker,
            journal,
            events,
            next_seq: 0,
            settle_until: None,
        }
    }

    fn runner_for(mode: Mode, config: &Config) -> Runner {
        if mode.is_probe() {
            Runner::Probe(ProbeProtocol::new(config.probe_count))
        } else {
            Runner::Single(TrialController::new(""))
        }
    }

    /// The controller whose text is on screen, if any.
    pub fn active_trial(&self) -> Option<&TrialController> {
        match &self.runner {
            Runner::Single(trial) => Some(trial),
            Runner::Probe(probe) => match probe.phase() {
                ProbePhase::PracticeRun | ProbePhase::RecordedRun => Some(probe.trial()),
                _ => None,
            },
        }
    }

    pub fn is_practice_pass(&self) -> bool {
        matches!(&self.runner, Runner::Probe(p) if p.phase() == &ProbePhase::PracticeRun)
    }

    /// Fetch a fresh text and arm the runner for it.
    pub fn start_trial(&mut self) {
        self.error = None;
        self.settle_until = None;
        match &mut self.runner {
            Runner::Single(trial) => match self.source.generate(self.mode) {
                Ok(text) => {
                    trial.reset(&text);
                    self.screen = AppScreen::Typing;
                }
                Err(err) => {
                    warn!(error = %err, mode = %self.mode, "text generation failed");
                    self.error = Some(err.to_string());
                    self.screen = AppScreen::Error;
                }
            },
            Runner::Probe(probe) => {
                if probe.phase() == &ProbePhase::Finished {
                    *probe = ProbeProtocol::new(self.config.probe_count);
                }
                match probe.begin_probe(self.source.as_mut()) {
                    Ok(()) => self.screen = AppScreen::Typing,
                    Err(err) => {
                        self.error = Some(err.to_string());
                        self.screen = AppScreen::Error;
                    }
                }
            }
        }
    }

    pub fn handle_input(&mut self, key: InputKey) {
        // Space only ever types; it never drives navigation.
        if self.screen != AppScreen::Typing && key.suppresses_default() {
            return;
        }
        match self.screen {
            AppScreen::Typing => self.handle_typing_key(key),
            AppScreen::Review => match key {
                InputKey::Char('q') | InputKey::Escape => self.should_quit = true,
                InputKey::Char('n') | InputKey::Tab => self.start_trial(),
                InputKey::Char('d') => self.discard_review(),
                _ => {}
            },
            AppScreen::Error => match key {
                InputKey::Char('q') | InputKey::Escape => self.should_quit = true,
                InputKey::Char('r') | InputKey::Tab => self.start_trial(),
                _ => {}
            },
        }
    }

    fn handle_typing_key(&mut self, key: InputKey) {
        match &mut self.runner {
            Runner::Single(trial) => match trial.handle_key(key, self.clock.as_ref()) {
                TrialEvent::Completed(finished) => {
                    let session = Session::assemble(
                        self.mode,
                        &finished.text,
                        &finished.keystrokes,
                        finished.session_start,
                        chrono::Utc::now(),
                    );
                    self.finish_session(session);
                    self.screen = AppScreen::Review;
                }
                TrialEvent::Aborted => self.start_trial(),
                TrialEvent::Ignored | TrialEvent::Accepted { .. } => {}
            },
            Runner::Probe(probe) => match probe.handle_key(key, self.clock.as_ref()) {
                ProbeEvent::RecordedComplete(session) => {
                    self.finish_session(session);
                    self.settle_until = Some(Instant::now() + self.config.settle_delay());
                }
                ProbeEvent::PracticeComplete => {
                    self.status = Some("practice done, now recording".to_string());
                }
                ProbeEvent::Aborted => self.start_trial(),
                ProbeEvent::Ignored | ProbeEvent::Accepted { .. } => {}
            },
        }
    }

    /// Periodic housekeeping: moves the probe sequence on after its settle delay.
    pub fn on_tick(&mut self) {
        let Some(deadline) = self.settle_until else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        self.settle_until = None;
        if let Runner::Probe(probe) = &mut self.runner {
            probe.advance();
            if probe.phase() == &ProbePhase::Finished {
                info!(probes = probe.probe_count(), "probe sequence finished");
                self.screen = AppScreen::Review;
            } else {
                self.start_trial();
            }
        }
    }

    /// Show local figures now and hand the session to the background worker.
    fn finish_session(&mut self, session: Session) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.review = Some(Review {
            seq,
            metrics: SessionMetrics::from_session(&session),
            session: session.clone(),
            pending: true,
            discarded: false,
        });
        self.in_flight += 1;

        let events = self.events.clone();
        self.worker.spawn(session, move |delivery| {
            // The receiver is gone only when the app is shutting down.
            let _ = events.send(AppEvent::Delivered {
                seq,
                delivery: Box::new(delivery),
            });
        });
    }

    /// Delete the reviewed session from the store and the local journal.
    /// Only possible once its submission has come back with an id.
    pub fn discard_review(&mut self) {
        let Some(review) = &mut self.review else {
            return;
        };
        if review.pending {
            self.status = Some("still saving, try again in a moment".to_string());
            return;
        }
        let Some(id) = review.session.session_id else {
            self.status = Some("session was never saved".to_string());
            return;
        };

        match self.store.delete_session(id) {
            Ok(()) => {
                info!(session_id = id, "session discarded");
                review.discarded = true;
                review.session.session_id = None;
                self.status = Some(format!("discarded #{id}"));
                if let Some(journal) = &self.journal
                    && let Err(err) = journal.remove_session(id)
                {
                    warn!(error = %err, "failed to drop discarded session from journal");
                }
            }
            Err(err) => {
                warn!(session_id = id, error = %err, "discard failed");
                self.status = Some(format!("could not discard #{id}: {err}"));
            }
        }
    }

    pub fn on_delivered(&mut self, seq: u64, delivery: Delivery) {
        self.in_flight = self.in_flight.saturating_sub(1);
        info!(
            seq,
            persisted = delivery.is_persisted(),
            attempts = delivery.fetch_attempts,
            "delivery received"
        );

        if let Some(warning) = &delivery.warning {
            self.status = Some(warning.to_string());
        } else if !delivery.reconcile.diagnostics.is_empty() {
            self.status = Some(format!(
                "saved as #{}, {} keystroke(s) unmatched",
                delivery.session.session_id.unwrap_or_default(),
                delivery.session.keystrokes.len() - delivery.session.reconciled_count()
            ));
        } else if let Some(id) = delivery.session.session_id {
            self.status = Some(format!("saved as #{id}"));
        }

        if self.config.journal_enabled
            && let Some(journal) = &self.journal
            && let Err(err) = journal.append_session(&delivery.session)
        {
            warn!(error = %err, "failed to journal session");
        }

        if let Some(review) = &mut self.review
            && review.seq == seq
        {
            review.metrics = SessionMetrics::from_session(&delivery.session);
            review.session = delivery.session;
            review.pending = false;
        }
    }
}
