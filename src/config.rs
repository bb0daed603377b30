use crate::error::{Result, WeaverError};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the orchestration core.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// Directory under which per-todo worktrees are created.
    pub worktrees_dir: PathBuf,
    /// Hard bound on any single external git/process operation. Expired
    /// operations are forcibly terminated and treated as failures.
    pub external_timeout: Duration,
    /// Interval of the periodic ready-todo sweep.
    pub sweep_interval: Duration,
    /// Capacity of the broadcast event channel.
    pub event_channel_capacity: usize,
    /// Default for newly created missions.
    pub auto_start_enabled: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            worktrees_dir: PathBuf::from(".weaver/worktrees"),
            external_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(30),
            event_channel_capacity: 1000,
            auto_start_enabled: true,
        }
    }
}

impl WeaverConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("WEAVER_WORKTREES_DIR") {
            config.worktrees_dir = PathBuf::from(dir);
        }

        if let Ok(secs) = std::env::var("WEAVER_EXTERNAL_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                WeaverError::Configuration(format!("Invalid external_timeout_secs: {e}"))
            })?;
            config.external_timeout = Duration::from_secs(secs);
        }

        if let Ok(secs) = std::env::var("WEAVER_SWEEP_INTERVAL_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                WeaverError::Configuration(format!("Invalid sweep_interval_secs: {e}"))
            })?;
            config.sweep_interval = Duration::from_secs(secs);
        }

        if let Ok(auto) = std::env::var("WEAVER_AUTO_START") {
            config.auto_start_enabled = auto.parse().map_err(|e| {
                WeaverError::Configuration(format!("Invalid auto_start flag: {e}"))
            })?;
        }

        Ok(config)
    }
}
