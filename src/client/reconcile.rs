//! Merge store-assigned keystroke metadata into the client's records.
//!
//! Records are matched by position first. Where the key at a position
//! disagrees (the store filtered or reordered something), the nearest
//! unclaimed store record with the same key and an id is used instead, so a
//! repeated character near the skew cannot borrow a far-away annotation.
//! Unmatched positions keep no annotation at all.

use std::fmt;

use tracing::{debug, warn};

use crate::client::api::StoredKeystroke;
use crate::keyboard::finger::{Finger, Hand};
use crate::session::record::{Annotation, RecordedKeystroke};

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileDiagnostic {
    /// The store returned no keystrokes at all.
    EmptyResponse,
    /// Position `index` disagreed; matched store record `matched` by key instead.
    Skewed { index: usize, key: char, matched: usize },
    /// Nothing in the store response could be matched to `index`.
    Unmatched { index: usize, key: char },
    /// The store sent a finger or hand name outside the known vocabulary.
    UnknownAnnotation { index: usize, value: String },
}

impl fmt::Display for ReconcileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileDiagnostic::EmptyResponse => write!(f, "store returned no keystrokes"),
            ReconcileDiagnostic::Skewed {
                index,
                key,
                matched,
            } => write!(
                f,
                "keystroke {index} ({key:?}) matched store record {matched} by key"
            ),
            ReconcileDiagnostic::Unmatched { index, key } => {
                write!(f, "keystroke {index} ({key:?}) has no store record")
            }
            ReconcileDiagnostic::UnknownAnnotation { index, value } => {
                write!(f, "keystroke {index} has unrecognised annotation {value:?}")
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconcileReport {
    pub positional: usize,
    pub by_key: usize,
    pub diagnostics: Vec<ReconcileDiagnostic>,
}

impl ReconcileReport {
    pub fn matched(&self) -> usize {
        self.positional + self.by_key
    }
}

/// Overwrite every record's annotation from `server`. Running this twice
/// against the same response gives the same result.
pub fn reconcile(client: &mut [RecordedKeystroke], server: &[StoredKeystroke]) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    if server.is_empty() {
        for rk in client.iter_mut() {
            rk.annotation = None;
        }
        if !client.is_empty() {
            report.diagnostics.push(ReconcileDiagnostic::EmptyResponse);
        }
        return report;
    }

    let mut claimed = vec![false; server.len()];
    let mut matches: Vec<Option<usize>> = vec![None; client.len()];

    for (i, rk) in client.iter().enumerate() {
        if let Some(sk) = server.get(i)
            && sk.id.is_some()
            && sk.key_is(rk.keystroke.key)
        {
            matches[i] = Some(i);
            claimed[i] = true;
            report.positional += 1;
        }
    }

    for (i, rk) in client.iter().enumerate() {
        if matches[i].is_some() {
            continue;
        }
        let key = rk.keystroke.key;
        let nearest = server
            .iter()
            .enumerate()
            .filter(|(j, sk)| !claimed[*j] && sk.id.is_some() && sk.key_is(key))
            .min_by_key(|(j, _)| (j.abs_diff(i), *j))
            .map(|(j, _)| j);

        match nearest {
            Some(j) => {
                matches[i] = Some(j);
                claimed[j] = true;
                report.by_key += 1;
                report.diagnostics.push(ReconcileDiagnostic::Skewed {
                    index: i,
                    key,
                    matched: j,
                });
            }
            None => {
                report
                    .diagnostics
                    .push(ReconcileDiagnostic::Unmatched { index: i, key });
            }
        }
    }

    for (i, rk) in client.iter_mut().enumerate() {
        rk.annotation = matches[i].and_then(|j| annotation_for(i, &server[j], &mut report));
    }

    for diag in &report.diagnostics {
        match diag {
            ReconcileDiagnostic::Skewed { .. } => debug!(%diag, "reconcile"),
            _ => warn!(%diag, "reconcile"),
        }
    }

    report
}

fn annotation_for(
    index: usize,
    sk: &StoredKeystroke,
    report: &mut ReconcileReport,
) -> Option<Annotation> {
    let id = sk.id?;
    let finger = sk.finger.as_deref().and_then(|v| {
        v.parse::<Finger>()
            .map_err(|_| {
                report.diagnostics.push(ReconcileDiagnostic::UnknownAnnotation {
                    index,
                    value: v.to_string(),
                })
            })
            .ok()
    });
    let hand = sk.hand.as_deref().and_then(|v| {
        v.parse::<Hand>()
            .map_err(|_| {
                report.diagnostics.push(ReconcileDiagnostic::UnknownAnnotation {
                    index,
                    value: v.to_string(),
                })
            })
            .ok()
    });
    Some(Annotation { id, finger, hand })
}
