// src/config.rs
//! Configuration file handling and the immutable per-session settings

use crate::{
    error::{GpsError, Result},
    gps::codec::{TalkerSet, DEFAULT_TALKERS},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// How long a probe waits for GPS traffic. One 1 Hz cadence fits comfortably.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// How long a sync waits for an active RMC sentence.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimesyncConfig {
    pub device: Option<String>,
    pub baud_rate: u32,
    pub debug: bool,
    pub probe_timeout_secs: u64,
    pub sync_timeout_secs: u64,
    pub watch_interval_secs: u64,
    pub talkers: Vec<String>,
}

impl Default for TimesyncConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: DEFAULT_BAUD_RATE,
            debug: false,
            probe_timeout_secs: PROBE_TIMEOUT.as_secs(),
            sync_timeout_secs: SYNC_TIMEOUT.as_secs(),
            watch_interval_secs: 5,
            talkers: DEFAULT_TALKERS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TimesyncConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Config file path: `$HOME/.config/gps-timesync/config.json`, or
    /// `%APPDATA%\gps-timesync\config.json` on Windows.
    pub fn get_config_path() -> Result<PathBuf> {
        #[cfg(windows)]
        let base = std::env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| GpsError::Config("APPDATA environment variable not set".to_string()))?;

        #[cfg(not(windows))]
        let base = std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .map_err(|_| GpsError::Config("HOME environment variable not set".to_string()))?;

        Ok(base.join("gps-timesync").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(GpsError::Config("baud_rate must be positive".to_string()));
        }
        if self.probe_timeout_secs == 0
            || self.sync_timeout_secs == 0
            || self.watch_interval_secs == 0
        {
            return Err(GpsError::Config("timeouts and intervals must be positive".to_string()));
        }
        if self.talkers.is_empty() {
            return Err(GpsError::Config("at least one talker ID is required".to_string()));
        }
        if let Some(bad) = self
            .talkers
            .iter()
            .find(|t| t.len() != 2 || !t.bytes().all(|b| b.is_ascii_uppercase()))
        {
            return Err(GpsError::Config(format!(
                "talker ID {:?} must be two uppercase letters",
                bad
            )));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            baud_rate: self.baud_rate,
            debug: self.debug,
            talkers: TalkerSet::new(self.talkers.iter().cloned()),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            sync_timeout: Duration::from_secs(self.sync_timeout_secs),
        }
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }
}

/// Settings handed to every probe, sync and monitor call. Never mutated
/// once a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub baud_rate: u32,
    pub debug: bool,
    pub talkers: TalkerSet,
    pub probe_timeout: Duration,
    pub sync_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        TimesyncConfig::default().session_config()
    }
}
