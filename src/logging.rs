use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "keytrace.log";

pub fn open_log_file(dir: &Path) -> Result<File> {
    fs::create_dir_all(dir)?;
    let file = File::options()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;
    Ok(file)
}

/// Logs go to a file in `dir`; stderr belongs to the terminal UI.
/// Level comes from `KEYTRACE_LOG`, default `info`.
pub fn init(dir: &Path) -> Result<()> {
    let file = open_log_file(dir)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KEYTRACE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directory_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        open_log_file(&nested).unwrap();
        assert!(nested.join(LOG_FILE).exists());
        open_log_file(&nested).unwrap();
    }

    #[test]
    fn unusable_directory_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        assert!(open_log_file(&blocker).is_err());
        assert!(init(&blocker).is_err());
    }
}
