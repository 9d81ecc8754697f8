use std::sync::Mutex;
use std::time::Duration;

#[cfg(feature = "network")]
use tracing::warn;

use crate::client::api::{
    FingerAnnotationsUpdate, HealthResponse, SessionList, StoredKeystroke, StoredSession,
    SubmitRequest,
};
use crate::client::{ClientError, Result};
use crate::keyboard::finger::qwerty_finger;

/// Remote system of record for sessions.
pub trait SessionStore: Send + Sync {
    /// Persist a session and return its identifier.
    fn submit(&self, request: &SubmitRequest) -> Result<i64>;

    fn fetch(&self, session_id: i64) -> Result<StoredSession>;

    /// Returns the number of annotations the store applied.
    fn update_fingers(&self, update: &FingerAnnotationsUpdate) -> Result<usize>;

    fn set_label(&self, session_id: i64, label: Option<&str>) -> Result<()>;

    /// Newest first, without keystrokes.
    fn list_sessions(&self, limit: usize) -> Result<SessionList>;

    /// Remove a session and its keystrokes from the store.
    fn delete_session(&self, session_id: i64) -> Result<()>;

    fn health(&self) -> Result<HealthResponse>;
}

pub struct HttpSessionStore {
    base_url: String,
    #[cfg(feature = "network")]
    client: reqwest::blocking::Client,
}

impl HttpSessionStore {
    #[cfg(feature = "network")]
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Http {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { base_url, client })
    }

    #[cfg(not(feature = "network"))]
    pub fn new(base_url: &str, _timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(feature = "network")]
impl HttpSessionStore {
    fn send<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().map_err(|e| ClientError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json().map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(feature = "network")]
impl SessionStore for HttpSessionStore {
    fn submit(&self, request: &SubmitRequest) -> Result<i64> {
        let url = self.url("/submit_session");
        let resp: crate::client::api::SubmitResponse =
            self.send(&url, self.client.post(&url).json(request))?;
        if let Some(stored) = resp.keystroke_count
            && stored != request.keystrokes.len()
        {
            warn!(
                sent = request.keystrokes.len(),
                stored, "store kept a different number of keystrokes"
            );
        }
        resp.session_id.ok_or(ClientError::MissingSessionId)
    }

    fn fetch(&self, session_id: i64) -> Result<StoredSession> {
        let url = self.url(&format!("/session/{session_id}"));
        match self.send(&url, self.client.get(&url)) {
            Err(ClientError::Status { status: 404, .. }) => Err(ClientError::NotFound(session_id)),
            other => other,
        }
    }

    fn update_fingers(&self, update: &FingerAnnotationsUpdate) -> Result<usize> {
        let url = self.url("/update_fingers");
        let resp: crate::client::api::UpdateFingersResponse =
            self.send(&url, self.client.post(&url).json(update))?;
        Ok(resp.annotations_count)
    }

    fn set_label(&self, session_id: i64, label: Option<&str>) -> Result<()> {
        let url = self.url(&format!("/session/{session_id}/label"));
        let body = crate::client::api::LabelUpdate {
            label: label.map(str::to_string),
        };
        let _: serde_json::Value = match self.send(&url, self.client.put(&url).json(&body)) {
            Err(ClientError::Status { status: 404, .. }) => {
                return Err(ClientError::NotFound(session_id));
            }
            other => other?,
        };
        Ok(())
    }

    fn list_sessions(&self, limit: usize) -> Result<SessionList> {
        let url = self.url(&format!("/sessions?limit={limit}"));
        self.send(&url, self.client.get(&url))
    }

    fn delete_session(&self, session_id: i64) -> Result<()> {
        let url = self.url(&format!("/session/{session_id}"));
        let _: serde_json::Value = match self.send(&url, self.client.delete(&url)) {
            Err(ClientError::Status { status: 404, .. }) => {
                return Err(ClientError::NotFound(session_id));
            }
            other => other?,
        };
        Ok(())
    }

    fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/health");
        self.send(&url, self.client.get(&url))
    }
}

#[cfg(not(feature = "network"))]
impl SessionStore for HttpSessionStore {
    fn submit(&self, _request: &SubmitRequest) -> Result<i64> {
        Err(ClientError::Offline)
    }

    fn fetch(&self, _session_id: i64) -> Result<StoredSession> {
        Err(ClientError::Offline)
    }

    fn update_fingers(&self, _update: &FingerAnnotationsUpdate) -> Result<usize> {
        Err(ClientError::Offline)
    }

    fn set_label(&self, _session_id: i64, _label: Option<&str>) -> Result<()> {
        Err(ClientError::Offline)
    }

    fn list_sessions(&self, _limit: usize) -> Result<SessionList> {
        Err(ClientError::Offline)
    }

    fn delete_session(&self, _session_id: i64) -> Result<()> {
        Err(ClientError::Offline)
    }

    fn health(&self) -> Result<HealthResponse> {
        Err(ClientError::Offline)
    }
}

/// In-process store with knobs for the failure modes the client must survive:
/// annotation lag, refused submissions, missing identifiers and server-side
/// keystroke filtering.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    sessions: Vec<StoredSession>,
    next_session_id: i64,
    next_keystroke_id: i64,
    annotate: bool,
    empty_fetches: usize,
    fetch_count: usize,
    fail_submit: bool,
    omit_session_id: bool,
    filtered_key: Option<char>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign QWERTY finger/hand on submission, as an annotating store would.
    pub fn with_annotations(self) -> Self {
        self.configure(|s| s.annotate = true)
    }

    /// The first `n` fetches see no keystrokes yet.
    pub fn with_lag(self, n: usize) -> Self {
        self.configure(|s| s.empty_fetches = n)
    }

    pub fn failing(self) -> Self {
        self.configure(|s| s.fail_submit = true)
    }

    pub fn without_session_id(self) -> Self {
        self.configure(|s| s.omit_session_id = true)
    }

    /// Drop every keystroke of `key` before storing it.
    pub fn filtering(self, key: char) -> Self {
        self.configure(|s| s.filtered_key = Some(key))
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    pub fn session(&self, session_id: i64) -> Option<StoredSession> {
        self.lock().sessions.iter().find(|s| s.id == session_id).cloned()
    }

    fn configure(self, f: impl FnOnce(&mut MemoryState)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-call.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn submit(&self, request: &SubmitRequest) -> Result<i64> {
        let mut state = self.lock();
        if state.fail_submit {
            return Err(ClientError::Status {
                url: "memory:/submit_session".to_string(),
                status: 500,
            });
        }

        state.next_session_id += 1;
        let id = state.next_session_id;
        let mut keystrokes = Vec::new();
        for ks in &request.keystrokes {
            if let Some(filtered) = state.filtered_key
                && ks.key.chars().eq(std::iter::once(filtered))
            {
                continue;
            }
            state.next_keystroke_id += 1;
            let (finger, hand) = match (state.annotate, ks.key.chars().next()) {
                (true, Some(ch)) => {
                    let finger = qwerty_finger(ch);
                    (
                        Some(finger.as_str().to_string()),
                        Some(finger.hand().as_str().to_string()),
                    )
                }
                _ => (None, None),
            };
            keystrokes.push(StoredKeystroke {
                id: Some(state.next_keystroke_id),
                key: ks.key.clone(),
                prev_key: ks.prev_key.clone(),
                timestamp: ks.timestamp,
                finger,
                hand,
            });
        }

        state.sessions.push(StoredSession {
            id,
            mode: request.mode.as_str().to_string(),
            raw_text: request.raw_text.clone(),
            timestamp: request.keystrokes.last().map_or(0.0, |k| k.timestamp),
            label: None,
            keystrokes,
        });

        if state.omit_session_id {
            return Err(ClientError::MissingSessionId);
        }
        Ok(id)
    }

    fn fetch(&self, session_id: i64) -> Result<StoredSession> {
        let mut state = self.lock();
        state.fetch_count += 1;
        let mut session = state
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or(ClientError::NotFound(session_id))?;
        if state.empty_fetches > 0 {
            state.empty_fetches -= 1;
            session.keystrokes.clear();
        }
        Ok(session)
    }

    fn update_fingers(&self, update: &FingerAnnotationsUpdate) -> Result<usize> {
        let mut state = self.lock();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == update.session_id)
            .ok_or(ClientError::NotFound(update.session_id))?;
        let mut applied = 0;
        for ann in &update.annotations {
            if let Some(ks) = session
                .keystrokes
                .iter_mut()
                .find(|k| k.id == Some(ann.keystroke_id))
            {
                ks.finger = Some(ann.finger.as_str().to_string());
                ks.hand = Some(ann.hand.as_str().to_string());
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn set_label(&self, session_id: i64, label: Option<&str>) -> Result<()> {
        let mut state = self.lock();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or(ClientError::NotFound(session_id))?;
        session.label = label.map(str::to_string);
        Ok(())
    }

    fn list_sessions(&self, limit: usize) -> Result<SessionList> {
        let state = self.lock();
        let sessions: Vec<StoredSession> = state
            .sessions
            .iter()
            .rev()
            .take(limit)
            .map(|s| StoredSession {
                keystrokes: Vec::new(),
                ..s.clone()
            })
            .collect();
        Ok(SessionList {
            total: sessions.len(),
            sessions,
        })
    }

    fn delete_session(&self, session_id: i64) -> Result<()> {
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.id != session_id);
        if state.sessions.len() == before {
            return Err(ClientError::NotFound(session_id));
        }
        Ok(())
    }

    fn health(&self) -> Result<HealthResponse> {
        Ok(HealthResponse {
            status: "healthy".to_string(),
            timestamp: 0.0,
        })
    }
}
