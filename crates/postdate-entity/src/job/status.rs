//! Job status enumeration and the transitions it allows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery status of a scheduled job.
///
/// ```text
/// Scheduled --claim--> InFlight --send ok--> Sent
/// Scheduled --claim--> InFlight --send err--> Failed
/// InFlight  --lease expiry--> Scheduled
/// Scheduled --owner cancel--> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its due time, or reclaimed after an expired lease.
    Scheduled,
    /// Claimed by a dispatcher; the lease runs from `updated_at`.
    InFlight,
    /// Delivered.
    Sent,
    /// The provider refused or timed out. Not retried automatically.
    Failed,
    /// Cancelled by its owner before it was claimed.
    Cancelled,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        Self::Scheduled,
        Self::InFlight,
        Self::Sent,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Whether the state machine has an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::InFlight)
                | (Self::Scheduled, Self::Cancelled)
                | (Self::InFlight, Self::Sent)
                | (Self::InFlight, Self::Failed)
                | (Self::InFlight, Self::Scheduled)
        )
    }

    /// Return the status as its database label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InFlight => "in_flight",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
