//! The job store contract.
//!
//! Every mutating operation is a single atomic compare-and-transition on
//! one or more rows. Nothing else coordinates dispatchers: two callers
//! racing on the same job are serialized by the store, and exactly one of
//! them observes the transition.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use postdate_core::result::AppResult;
use postdate_core::types::{CursorPage, CursorRequest, JobId, OwnerId};
use postdate_entity::job::{Job, NewJob, StatusCounts};

/// Message used for every "no such job in the required state" outcome.
pub const NOT_IN_FLIGHT: &str = "Job not found or no longer in flight";
/// Message returned when a lease was reclaimed by another dispatcher.
pub const LEASE_LOST: &str = "Job lease was reclaimed by another dispatcher";
/// Message returned when a cancel loses the race or targets a foreign job.
pub const NOT_CANCELLABLE: &str = "Email not found or cannot be cancelled";

/// Durable, concurrency-safe storage of scheduled jobs.
///
/// `now` is always supplied by the caller; implementations never read the
/// wall clock.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug {
    /// Persist a validated submission in `Scheduled`.
    async fn create(&self, new: NewJob, now: DateTime<Utc>) -> AppResult<Job>;

    /// Fetch one job if it belongs to `owner_id`.
    async fn find_for_owner(&self, id: JobId, owner_id: OwnerId) -> AppResult<Option<Job>>;

    /// Atomically move up to `batch_size` due jobs to `InFlight` and return
    /// them oldest-due first. Under concurrent callers each due job is
    /// returned to exactly one of them.
    async fn claim_due(&self, now: DateTime<Utc>, batch_size: u32) -> AppResult<Vec<Job>>;

    /// `InFlight -> Sent`. Fails with `NotFound` when the job is not in flight.
    async fn mark_sent(&self, id: JobId, sent_at: DateTime<Utc>) -> AppResult<()>;

    /// `InFlight -> Failed`. Fails with `NotFound` when the job is not in flight.
    async fn mark_failed(&self, id: JobId, error_info: &str, now: DateTime<Utc>) -> AppResult<()>;

    /// Restart the lease of a job claimed at `claimed_at`, just before its
    /// send begins. Fails with `NotFound` when the job is no longer in flight
    /// under that claim, in which case the caller must not send it.
    async fn renew_lease(
        &self,
        id: JobId,
        claimed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Move every job in flight since before `now - lease_timeout` back to
    /// `Scheduled`. Returns how many were reclaimed.
    async fn reclaim_stale(&self, now: DateTime<Utc>, lease_timeout: Duration) -> AppResult<u64>;

    /// `Scheduled -> Cancelled` for a job owned by `owner_id`. Fails with
    /// `NotFound` when the job is foreign, missing, or already claimed.
    async fn cancel(&self, id: JobId, owner_id: OwnerId, now: DateTime<Utc>) -> AppResult<Job>;

    /// Owner's jobs, newest `scheduled_for` first.
    async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        request: &CursorRequest,
    ) -> AppResult<CursorPage<Job>>;

    /// Owner's job counts by status.
    async fn stats(&self, owner_id: OwnerId) -> AppResult<StatusCounts>;
}
