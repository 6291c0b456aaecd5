//! Dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Settings for the claim/send/record dispatch pass.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_send_within_lease"))]
pub struct DispatcherConfig {
    /// Whether the daemon starts the periodic trigger.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of jobs claimed per pass.
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 1000))]
    pub batch_size: u32,
    /// Seconds a job may stay in flight before it is considered abandoned.
    #[serde(default = "default_lease_timeout")]
    #[validate(range(min = 1, max = 604800))]
    pub lease_timeout_seconds: u64,
    /// Upper bound on a single provider call.
    #[serde(default = "default_send_timeout")]
    #[validate(range(min = 1, max = 3600))]
    pub send_timeout_seconds: u64,
    /// Sends in flight at once within a single batch.
    #[serde(default = "default_send_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub send_concurrency: usize,
    /// Six-field cron expression for the periodic trigger.
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

impl DispatcherConfig {
    /// Lease timeout as a [`Duration`].
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_seconds)
    }

    /// Send timeout as a [`Duration`].
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            batch_size: default_batch_size(),
            lease_timeout_seconds: default_lease_timeout(),
            send_timeout_seconds: default_send_timeout(),
            send_concurrency: default_send_concurrency(),
            schedule: default_schedule(),
        }
    }
}

/// Each send starts on a renewed lease; one that outlives it can be
/// reclaimed and delivered twice.
fn validate_send_within_lease(config: &DispatcherConfig) -> Result<(), ValidationError> {
    if config.send_timeout_seconds >= config.lease_timeout_seconds {
        let mut err = ValidationError::new("send_timeout_exceeds_lease");
        err.message = Some("send_timeout_seconds must be smaller than lease_timeout_seconds".into());
        return Err(err);
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> u32 {
    100
}

fn default_lease_timeout() -> u64 {
    15 * 60
}

fn default_send_timeout() -> u64 {
    30
}

fn default_send_concurrency() -> usize {
    4
}

fn default_schedule() -> String {
    "0 * * * * *".to_string()
}
