//! Per-owner aggregate counts.

use serde::{Deserialize, Serialize};

use super::status::JobStatus;

/// Number of an owner's jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Waiting to be delivered.
    pub scheduled: u64,
    /// Currently claimed by a dispatcher.
    pub in_flight: u64,
    /// Delivered.
    pub sent: u64,
    /// Delivery failed.
    pub failed: u64,
    /// Cancelled by the owner.
    pub cancelled: u64,
}

impl StatusCounts {
    /// Add `count` jobs in `status`.
    pub fn record(&mut self, status: JobStatus, count: u64) {
        let slot = match status {
            JobStatus::Scheduled => &mut self.scheduled,
            JobStatus::InFlight => &mut self.in_flight,
            JobStatus::Sent => &mut self.sent,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
    }

    /// Count for a single status.
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Scheduled => self.scheduled,
            JobStatus::InFlight => self.in_flight,
            JobStatus::Sent => self.sent,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }

    /// Total across every status.
    pub fn total(&self) -> u64 {
        self.scheduled + self.in_flight + self.sent + self.failed + self.cancelled
    }
}
