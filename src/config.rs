use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::client::retry::RetryPolicy;
use crate::client::submit::SubmitOptions;
use crate::session::Mode;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default = "default_probe_count")]
    pub probe_count: usize,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_fetch_retry_delays_ms")]
    pub fetch_retry_delays_ms: Vec<u64>,
    #[serde(default = "default_auto_annotate")]
    pub auto_annotate: bool,
    #[serde(default = "default_journal_enabled")]
    pub journal_enabled: bool,
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_mode() -> Mode {
    Mode::Top200
}
fn default_probe_count() -> usize {
    10
}
fn default_settle_delay_ms() -> u64 {
    400
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_fetch_retry_delays_ms() -> Vec<u64> {
    vec![0, 200, 400]
}
fn default_auto_annotate() -> bool {
    false
}
fn default_journal_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            mode: default_mode(),
            probe_count: default_probe_count(),
            settle_delay_ms: default_settle_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            fetch_retry_delays_ms: default_fetch_retry_delays_ms(),
            auto_annotate: default_auto_annotate(),
            journal_enabled: default_journal_enabled(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keytrace")
            .join("config.toml")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keytrace")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            retry: RetryPolicy::from_millis(&self.fetch_retry_delays_ms),
            auto_annotate: self.auto_annotate,
        }
    }

    /// Repair values a hand-edited file can get wrong.
    fn normalize(&mut self) {
        if self.fetch_retry_delays_ms.is_empty() {
            self.fetch_retry_delays_ms = default_fetch_retry_delays_ms();
        }
        if self.probe_count == 0 {
            self.probe_count = default_probe_count();
        }
        let trimmed = self.server_url.trim_end_matches('/');
        if trimmed.len() != self.server_url.len() {
            self.server_url = trimmed.to_string();
        }
    }
}
