use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::config::Config;
use crate::session::record::Session;
use crate::store::schema::SessionHistoryData;

const HISTORY_FILE: &str = "session_history.json";

/// Local journal of every delivered session, saved or not.
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(Config::data_dir())
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.file_path(name);
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "unreadable journal, starting fresh");
                    T::default()
                }),
                Err(_) => T::default(),
            }
        } else {
            T::default()
        }
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let path = self.file_path(name);
        let tmp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(data)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn load_history(&self) -> SessionHistoryData {
        let data: SessionHistoryData = self.load(HISTORY_FILE);
        if data.needs_reset() {
            warn!(
                version = data.schema_version,
                "journal schema mismatch, starting fresh"
            );
            return SessionHistoryData::default();
        }
        data
    }

    pub fn append_session(&self, session: &Session) -> Result<()> {
        let mut history = self.load_history();
        history.sessions.push(session.clone());
        self.save(HISTORY_FILE, &history)
    }

    /// Drop the entry for a session the store has deleted. Returns whether
    /// anything was removed.
    pub fn remove_session(&self, session_id: i64) -> Result<bool> {
        let mut history = self.load_history();
        let before = history.sessions.len();
        history.sessions.retain(|s| s.session_id != Some(session_id));
        if history.sessions.len() == before {
            return Ok(false);
        }
        self.save(HISTORY_FILE, &history)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::session::Mode;
    use crate::session::record::Keystroke;

    fn session(id: Option<i64>) -> Session {
        let keystrokes = vec![Keystroke {
            key: 'a',
            timestamp: 10.0,
            prev_key: None,
            index: 0,
        }];
        let mut s = Session::assemble(Mode::Nonsense, "a", &keystrokes, 10.0, Utc::now());
        s.session_id = id;
        s
    }

    #[test]
    fn appends_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        assert!(store.load_history().sessions.is_empty());

        store.append_session(&session(Some(3))).unwrap();
        store.append_session(&session(None)).unwrap();

        let history = store.load_history();
        assert_eq!(history.sessions.len(), 2);
        assert_eq!(history.sessions[0].session_id, Some(3));
        assert_eq!(history.unsaved().count(), 1);
        assert!(!dir.path().join("session_history.tmp").exists());
    }

    #[test]
    fn removes_only_the_deleted_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        store.append_session(&session(Some(1))).unwrap();
        store.append_session(&session(Some(2))).unwrap();
        store.append_session(&session(None)).unwrap();

        assert!(store.remove_session(1).unwrap());
        assert!(!store.remove_session(1).unwrap());

        let history = store.load_history();
        assert_eq!(history.sessions.len(), 2);
        assert_eq!(history.sessions[0].session_id, Some(2));
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(HISTORY_FILE), "{not json").unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        assert!(store.load_history().sessions.is_empty());
        store.append_session(&session(None)).unwrap();
        assert_eq!(store.load_history().sessions.len(), 1);
    }

    #[test]
    fn stale_schema_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(HISTORY_FILE),
            r#"{"schema_version": 99, "sessions": []}"#,
        )
        .unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(
            store.load_history().schema_version,
            crate::store::schema::SCHEMA_VERSION
        );
    }
}
