//! Configuration management.
//!
//! Settings load from an optional TOML file (falling back to
//! `config/default.toml` when present, else compiled-in defaults) and are
//! validated before use. Durations are written human-readably (`"1ms"`,
//! `"5s"`).

use crate::error::{SyncError, SyncResult};
use config::Config;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Default tracing filter, overridable via `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Synchronization timing knobs.
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Timing configuration for the synchronization core.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    /// Delay between trigger-ready queries while a device is unready.
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Upper bound on one rendezvous round; a worker that times out
    /// re-enters polling.
    #[serde(with = "humantime_serde", default = "default_rendezvous_timeout")]
    pub rendezvous_timeout: Duration,
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1)
}

fn default_rendezvous_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sync: SyncSettings::default(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            rendezvous_timeout: default_rendezvous_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `config/default.toml` when no path
    /// is given (missing file means compiled-in defaults).
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let builder = match path {
            Some(path) => Config::builder().add_source(config::File::from(path)),
            None => Config::builder()
                .add_source(config::File::with_name("config/default").required(false)),
        };
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync.poll_interval.is_zero() {
            return Err(SyncError::Configuration(
                "sync.poll_interval must be greater than zero".into(),
            ));
        }
        if self.sync.rendezvous_timeout.is_zero() {
            return Err(SyncError::Configuration(
                "sync.rendezvous_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
