//! Scheduled job entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use postdate_core::error::AppError;
use postdate_core::traits::OutboundMessage;
use postdate_core::types::{JobId, OwnerId};

use super::status::JobStatus;

/// Maximum subject length in characters.
pub const MAX_SUBJECT_CHARS: u64 = 250;
/// Maximum body length in characters.
pub const MAX_BODY_CHARS: u64 = 10_000;

/// A message scheduled for delivery at or after `scheduled_for`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Principal that submitted the job.
    pub owner_id: OwnerId,
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Earliest delivery time. Never changes after creation.
    pub scheduled_for: DateTime<Utc>,
    /// Current delivery status.
    pub status: JobStatus,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Last status transition; the lease clock while in flight.
    pub updated_at: DateTime<Utc>,
    /// Delivery time, present iff `status` is `Sent`.
    pub sent_at: Option<DateTime<Utc>>,
    /// Failure description, present iff `status` is `Failed`.
    pub error_info: Option<String>,
}

impl Job {
    /// Build a freshly scheduled job from a validated submission.
    pub fn scheduled(id: JobId, new: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id: new.owner_id,
            recipient: new.recipient,
            subject: new.subject,
            body: new.body,
            scheduled_for: new.scheduled_for,
            status: JobStatus::Scheduled,
            created_at: now,
            updated_at: now,
            sent_at: None,
            error_info: None,
        }
    }

    /// Whether a dispatcher may claim the job at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Scheduled && self.scheduled_for <= now
    }

    /// Whether an in-flight lease taken at `updated_at` has run out.
    pub fn is_lease_expired(&self, now: DateTime<Utc>, lease_timeout: Duration) -> bool {
        self.status == JobStatus::InFlight && self.updated_at < now - lease_timeout
    }

    /// The payload handed to the mail provider.
    pub fn to_message(&self) -> OutboundMessage {
        OutboundMessage {
            recipient: self.recipient.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

/// A submission, checked before anything is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewJob {
    /// Submitting principal.
    pub owner_id: OwnerId,
    /// Recipient address.
    #[validate(email(message = "recipient must be a valid email address"))]
    pub recipient: String,
    /// Subject line.
    #[validate(length(min = 1, max = 250, message = "subject must be 1-250 characters"))]
    pub subject: String,
    /// Plain-text body.
    #[validate(length(min = 1, max = 10000, message = "body must be 1-10000 characters"))]
    pub body: String,
    /// Earliest delivery time; must be strictly after submission.
    pub scheduled_for: DateTime<Utc>,
}

impl NewJob {
    /// Validate field rules plus the future-time rule against `now`.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.validate()?;
        if self.scheduled_for <= now {
            return Err(AppError::validation("scheduled_for must be in the future"));
        }
        Ok(())
    }
}
