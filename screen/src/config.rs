use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trackkit_location::{AcquisitionConfig, Coordinate};
use trackkit_poller::{DEFAULT_INTERVAL, DEFAULT_TIMEOUT, PollError};

/// The target shown until (or instead of) a server-supplied one.
pub const FIXED_TARGET: Coordinate = Coordinate::new(49.818_016_1, 24.022_562);

/// Errors raised while building a screen.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    /// The configuration file could not be read.
    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid JSON for [`ScreenConfig`].
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The remote source could not be built.
    #[error(transparent)]
    Poll(#[from] PollError),
    /// A polled source asked for no pause between polls.
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    /// A local feed was configured but no source was supplied for it.
    #[error("local feed configured without a coordinate source")]
    MissingFeed,
}

/// Where the target coordinate comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSource {
    /// Always the fixed target; "Get Coordinates" restores it.
    #[default]
    Static,
    /// Polled from an HTTP endpoint.
    RemotePoll {
        /// URL answering `{ latitude, longitude, timestamp? }`.
        endpoint: String,
        /// Milliseconds between polls.
        #[serde(default = "default_interval_ms")]
        interval_ms: u64,
        /// Milliseconds before a fetch is abandoned.
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    /// Drained from a local feed (radio receiver, GNSS serial line) that
    /// the caller supplies as the screen's coordinate source.
    LocalFeed {
        /// Milliseconds between drains.
        #[serde(default = "default_interval_ms")]
        interval_ms: u64,
    },
}

impl TargetSource {
    /// A remote source with the default 5 s interval and 3 s timeout.
    pub fn remote(endpoint: impl Into<String>) -> Self {
        Self::RemotePoll {
            endpoint: endpoint.into(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// The poll interval, if this source polls.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        match self {
            Self::Static => None,
            Self::RemotePoll { interval_ms, .. } | Self::LocalFeed { interval_ms } => {
                Some(Duration::from_millis(*interval_ms))
            }
        }
    }
}

fn default_interval_ms() -> u64 {
    u64::try_from(DEFAULT_INTERVAL.as_millis()).unwrap_or(5_000)
}

fn default_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(3_000)
}

/// Everything a [`MapScreen`](crate::MapScreen) is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Initial target, and the one "Get Coordinates" restores.
    pub fixed_target: Coordinate,
    /// Static, remote or local-feed target.
    pub source: TargetSource,
    /// Location phase tunables.
    pub acquisition: AcquisitionConfig,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            fixed_target: FIXED_TARGET,
            source: TargetSource::Static,
            acquisition: AcquisitionConfig::default(),
        }
    }
}

impl ScreenConfig {
    /// Parses a JSON configuration; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Config`] if the JSON does not describe a config
    /// and [`ScreenError::ZeroInterval`] if it fails [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self, ScreenError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::ZeroInterval`] for a source polling every
    /// 0 ms.
    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.source.interval() == Some(Duration::ZERO) {
            return Err(ScreenError::ZeroInterval);
        }
        Ok(())
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Io`] if the file cannot be read and
    /// [`ScreenError::Config`] if it cannot be parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScreenError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
