use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level runtime configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub worker: WorkerConfig,
    pub sessions: SessionConfig,
}

/// Queue worker configuration (concurrency cap, base pass interval).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Hard cap on concurrently executing jobs. Handles beyond the cap
    /// stay pending and are retried on later passes.
    pub max_jobs_executing: usize,
    pub default_timeout_ms: u64,
}

/// Session persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding one file per persisted session.
    pub save_path: PathBuf,
    /// Session files are named `<file_prefix><session_id>`.
    pub file_prefix: String,
    /// A session untouched for longer than this is eligible for eviction.
    pub inactivity_timeout_secs: u64,
    /// The sweeper runs every `sweep_interval_factor` base intervals.
    pub sweep_interval_factor: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_jobs_executing: 200,
            default_timeout_ms: 1_000,
        }
    }
}

impl WorkerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("var/sessions"),
            file_prefix: "sess_".to_string(),
            inactivity_timeout_secs: 1_440,
            sweep_interval_factor: 5,
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}
