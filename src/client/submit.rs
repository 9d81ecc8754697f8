use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{info, warn};

use crate::client::ClientError;
use crate::client::api::{FingerAnnotation, FingerAnnotationsUpdate, SubmitRequest};
use crate::client::reconcile::{ReconcileReport, reconcile};
use crate::client::retry::RetryPolicy;
use crate::client::store::SessionStore;
use crate::keyboard::finger::{Finger, qwerty_finger};
use crate::session::record::Session;

#[derive(Clone, Debug, Default)]
pub struct SubmitOptions {
    pub retry: RetryPolicy,
    /// Push QWERTY defaults for keystrokes the store left unannotated.
    pub auto_annotate: bool,
}

/// Non-fatal problems met while persisting a session.
#[derive(Debug, Error)]
pub enum SubmissionWarning {
    #[error("session was not saved: {0}")]
    Submit(#[source] ClientError),
    #[error("session saved but could not be read back: {0}")]
    Fetch(#[source] ClientError),
    #[error("session saved but default finger annotations failed: {0}")]
    Annotate(#[source] ClientError),
}

/// What the caller always gets back, whatever happened on the wire.
#[derive(Debug)]
pub struct Delivery {
    pub session: Session,
    pub warning: Option<SubmissionWarning>,
    pub reconcile: ReconcileReport,
    pub fetch_attempts: usize,
}

impl Delivery {
    pub fn is_persisted(&self) -> bool {
        self.session.session_id.is_some()
    }
}

/// Submit, read back with retries, and merge store annotations.
pub fn submit_and_reconcile(
    store: &dyn SessionStore,
    mut session: Session,
    options: &SubmitOptions,
) -> Delivery {
    let request = SubmitRequest::from_session(&session);
    let session_id = match store.submit(&request) {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, mode = %session.mode, "session submission failed");
            return Delivery {
                session,
                warning: Some(SubmissionWarning::Submit(err)),
                reconcile: ReconcileReport::default(),
                fetch_attempts: 0,
            };
        }
    };
    session.session_id = Some(session_id);
    info!(session_id, keystrokes = session.keystrokes.len(), "session submitted");

    let (fetched, fetch_attempts) = options.retry.run(
        |_| store.fetch(session_id),
        |res| matches!(res, Ok(stored) if !stored.keystrokes.is_empty()),
    );

    let mut warning = None;
    let report = match fetched {
        Some(Ok(stored)) => reconcile(&mut session.keystrokes, &stored.keystrokes),
        Some(Err(err)) => {
            warn!(session_id, error = %err, "session fetch-back failed");
            warning = Some(SubmissionWarning::Fetch(err));
            ReconcileReport::default()
        }
        None => ReconcileReport::default(),
    };
    info!(
        session_id,
        attempts = fetch_attempts,
        matched = report.matched(),
        diagnostics = report.diagnostics.len(),
        "session reconciled"
    );

    if options.auto_annotate
        && warning.is_none()
        && let Err(err) = push_default_fingers(store, &mut session)
    {
        warn!(session_id, error = %err, "default finger annotation failed");
        warning = Some(SubmissionWarning::Annotate(err));
    }

    Delivery {
        session,
        warning,
        reconcile: report,
        fetch_attempts,
    }
}

/// Send QWERTY fingers for reconciled keystrokes that have none, and copy them
/// locally once the store has accepted them.
fn push_default_fingers(store: &dyn SessionStore, session: &mut Session) -> Result<(), ClientError> {
    let Some(session_id) = session.session_id else {
        return Ok(());
    };

    let annotations: Vec<FingerAnnotation> = session
        .keystrokes
        .iter()
        .filter_map(|rk| {
            let ann = rk.annotation.as_ref()?;
            if ann.finger.is_some() {
                return None;
            }
            let finger = qwerty_finger(rk.keystroke.key);
            (finger != Finger::Unknown).then(|| FingerAnnotation {
                keystroke_id: ann.id,
                finger,
                hand: finger.hand(),
            })
        })
        .collect();
    if annotations.is_empty() {
        return Ok(());
    }

    let applied = store.update_fingers(&FingerAnnotationsUpdate {
        session_id,
        annotations: annotations.clone(),
    })?;
    info!(session_id, applied, "default finger annotations stored");

    for ann in &annotations {
        if let Some(local) = session
            .keystrokes
            .iter_mut()
            .filter_map(|rk| rk.annotation.as_mut())
            .find(|a| a.id == ann.keystroke_id)
        {
            local.finger = Some(ann.finger);
            local.hand = Some(ann.hand);
        }
    }
    Ok(())
}

/// Runs each submission on its own thread so typing never waits on the network.
#[derive(Clone)]
pub struct SubmissionWorker {
    store: Arc<dyn SessionStore>,
    options: SubmitOptions,
}

impl SubmissionWorker {
    pub fn new(store: Arc<dyn SessionStore>, options: SubmitOptions) -> Self {
        Self { store, options }
    }

    pub fn spawn(
        &self,
        session: Session,
        on_done: impl FnOnce(Delivery) + Send + 'static,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let options = self.options.clone();
        thread::spawn(move || {
            let delivery = submit_and_reconcile(store.as_ref(), session, &options);
            on_done(delivery);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use chrono::Utc;

    use super::*;
    use crate::client::reconcile::ReconcileDiagnostic;
    use crate::client::store::MemoryStore;
    use crate::keyboard::finger::Hand;
    use crate::session::Mode;
    use crate::session::record::Keystroke;

    fn session(text: &str) -> Session {
        let chars: Vec<char> = text.chars().collect();
        let keystrokes: Vec<Keystroke> = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| Keystroke {
                key: c,
                timestamp: 5000.0 + i as f64 * 120.0,
                prev_key: i.checked_sub(1).map(|p| chars[p]),
                index: i,
            })
            .collect();
        Session::assemble(Mode::Top200, text, &keystrokes, 5000.0, Utc::now())
    }

    fn fast() -> SubmitOptions {
        SubmitOptions {
            retry: RetryPolicy::from_millis(&[0, 0, 0]),
            auto_annotate: false,
        }
    }

    #[test]
    fn happy_path_reconciles_every_keystroke() {
        let store = MemoryStore::new().with_annotations();
        let delivery = submit_and_reconcile(&store, session("fig"), &fast());

        assert!(delivery.warning.is_none());
        assert_eq!(delivery.session.session_id, Some(1));
        assert_eq!(delivery.session.reconciled_count(), 3);
        assert_eq!(delivery.fetch_attempts, 1);
        let first = delivery.session.keystrokes[0].annotation.as_ref().unwrap();
        assert_eq!(first.finger, Some(Finger::LeftIndex));
        assert_eq!(delivery.session.keystrokes[2].keystroke.timestamp, 5240.0);
    }

    #[test]
    fn lagging_store_is_retried() {
        let store = MemoryStore::new().with_lag(2);
        let delivery = submit_and_reconcile(&store, session("ab"), &fast());
        assert_eq!(delivery.fetch_attempts, 3);
        assert_eq!(store.fetch_count(), 3);
        assert_eq!(delivery.session.reconciled_count(), 2);
    }

    #[test]
    fn empty_after_all_retries_still_delivers() {
        let store = MemoryStore::new().with_lag(3);
        let delivery = submit_and_reconcile(&store, session("ab"), &fast());
        assert!(delivery.warning.is_none());
        assert_eq!(delivery.session.session_id, Some(1));
        assert_eq!(delivery.session.reconciled_count(), 0);
        assert_eq!(delivery.session.keystrokes.len(), 2);
        assert_eq!(
            delivery.reconcile.diagnostics,
            vec![ReconcileDiagnostic::EmptyResponse]
        );
    }

    #[test]
    fn failed_submission_still_delivers_session() {
        let store = MemoryStore::new().failing();
        let delivery = submit_and_reconcile(&store, session("ab"), &fast());
        assert!(matches!(delivery.warning, Some(SubmissionWarning::Submit(_))));
        assert!(!delivery.is_persisted());
        assert_eq!(delivery.session.keystrokes.len(), 2);
        assert_eq!(store.fetch_count(), 0);
    }

    #[test]
    fn missing_session_id_is_a_submission_failure() {
        let store = MemoryStore::new().without_session_id();
        let delivery = submit_and_reconcile(&store, session("ab"), &fast());
        assert!(matches!(
            delivery.warning,
            Some(SubmissionWarning::Submit(ClientError::MissingSessionId))
        ));
        assert_eq!(delivery.session.session_id, None);
    }

    #[test]
    fn filtered_keystroke_is_left_unannotated() {
        let store = MemoryStore::new().with_annotations().filtering(' ');
        let delivery = submit_and_reconcile(&store, session("a b"), &fast());

        assert!(delivery.warning.is_none());
        assert_eq!(delivery.session.session_id, Some(1));
        assert_eq!(store.session(1).unwrap().keystrokes.len(), 2);

        let ks = &delivery.session.keystrokes;
        assert_eq!(ks[0].annotation.as_ref().unwrap().id, 1);
        assert!(ks[1].annotation.is_none());
        let b = ks[2].annotation.as_ref().unwrap();
        assert_eq!(b.id, 2);
        assert_eq!(b.finger, Some(Finger::LeftIndex));

        assert_eq!(delivery.reconcile.positional, 1);
        assert_eq!(delivery.reconcile.by_key, 1);
        assert_eq!(
            delivery.reconcile.diagnostics,
            vec![
                ReconcileDiagnostic::Unmatched { index: 1, key: ' ' },
                ReconcileDiagnostic::Skewed {
                    index: 2,
                    key: 'b',
                    matched: 1
                },
            ]
        );
    }

    #[test]
    fn auto_annotate_fills_missing_fingers() {
        let store = MemoryStore::new();
        let options = SubmitOptions {
            auto_annotate: true,
            ..fast()
        };
        let delivery = submit_and_reconcile(&store, session("j k"), &options);
        assert!(delivery.warning.is_none());
        let anns: Vec<_> = delivery
            .session
            .keystrokes
            .iter()
            .map(|k| k.annotation.clone().unwrap())
            .collect();
        assert_eq!(anns[0].finger, Some(Finger::RightIndex));
        assert_eq!(anns[0].hand, Some(Hand::Right));
        assert_eq!(anns[1].finger, Some(Finger::RightThumb));

        let stored = store.session(1).unwrap();
        assert_eq!(stored.keystrokes[2].finger.as_deref(), Some("right_middle"));
    }

    #[test]
    fn worker_reports_through_callback() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let worker = SubmissionWorker::new(store, fast());
        let (tx, rx) = mpsc::channel();
        let a = worker.spawn(session("ab"), {
            let tx = tx.clone();
            move |d| tx.send(d).unwrap()
        });
        let b = worker.spawn(session("cd"), move |d| tx.send(d).unwrap());
        a.join().unwrap();
        b.join().unwrap();

        let mut ids: Vec<i64> = rx.iter().filter_map(|d| d.session.session_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }
}
