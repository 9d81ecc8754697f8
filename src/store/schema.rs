use serde::{Deserialize, Serialize};

use crate::session::record::Session;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionHistoryData {
    pub schema_version: u32,
    pub sessions: Vec<Session>,
}

impl Default for SessionHistoryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sessions: Vec::new(),
        }
    }
}

impl SessionHistoryData {
    /// Check if loaded data has a stale schema version and needs reset.
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }

    /// Sessions the store never acknowledged.
    pub fn unsaved(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(|s| s.session_id.is_none())
    }
}
