//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::transport::DEFAULT_CHANNEL_CAPACITY;

/// Tunables for a [`SyncSession`](crate::session::SyncSession) and its driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// How long the local side may wait on the opponent before an
    /// `OpponentUnresponsive` notice is raised. `None` disables the check.
    pub remote_choice_timeout_ms: Option<u64>,
    /// Max remote messages held for future turns.
    pub max_buffered_messages: usize,
    /// Driver tick used for timeout checks.
    pub poll_interval_ms: u64,
    /// Capacity of the driver's command and notice channels.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_choice_timeout_ms: Some(60_000),
            max_buffered_messages: 256,
            poll_interval_ms: 50,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for malformed JSON or out-of-range values.
    pub fn from_json(s: &str) -> Result<Self, ValidationError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("invalid config JSON: {e}"),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| {
            Err(ValidationError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.remote_choice_timeout_ms == Some(0) {
            return invalid("remote_choice_timeout_ms must be positive; use null to disable");
        }
        if self.max_buffered_messages == 0 {
            return invalid("max_buffered_messages must be positive");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be positive");
        }
        if self.channel_capacity == 0 {
            return invalid("channel_capacity must be positive");
        }
        Ok(())
    }

    /// [`remote_choice_timeout_ms`](Self::remote_choice_timeout_ms) as a duration.
    #[must_use]
    pub fn remote_choice_timeout(&self) -> Option<Duration> {
        self.remote_choice_timeout_ms.map(Duration::from_millis)
    }

    /// [`poll_interval_ms`](Self::poll_interval_ms) as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
