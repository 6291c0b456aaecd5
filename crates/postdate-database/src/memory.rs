//! In-process job store.
//!
//! One `tokio::sync::Mutex` guards the whole table, so every operation is
//! trivially atomic with respect to every other. Semantics match
//! [`PgJobStore`](crate::PgJobStore) row for row.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use postdate_core::error::AppError;
use postdate_core::result::AppResult;
use postdate_core::types::{CursorPage, CursorRequest, JobId, OwnerId};
use postdate_entity::job::{Job, JobStatus, NewJob, StatusCounts};

use crate::store::{JobStore, LEASE_LOST, NOT_CANCELLABLE, NOT_IN_FLIGHT};

/// The job `id` if the state machine allows moving it to `next`.
fn transition(
    jobs: &mut HashMap<JobId, Job>,
    id: JobId,
    next: JobStatus,
) -> Option<&mut Job> {
    jobs.get_mut(&id).filter(|job| job.status.can_transition_to(next))
}

/// `JobStore` held in memory. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a job regardless of owner.
    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.lock().await.get(&id).cloned()
    }

    /// Whether the store holds no jobs.
    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, new: NewJob, now: DateTime<Utc>) -> AppResult<Job> {
        let job = Job::scheduled(JobId::new(), new, now);
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_for_owner(&self, id: JobId, owner_id: OwnerId) -> AppResult<Option<Job>> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.get(&id).filter(|job| job.owner_id == owner_id).cloned())
    }

    async fn claim_due(&self, now: DateTime<Utc>, batch_size: u32) -> AppResult<Vec<Job>> {
        let mut jobs = self.jobs.lock().await;

        let mut due: Vec<(DateTime<Utc>, JobId)> = jobs
            .values()
            .filter(|job| job.is_due(now))
            .map(|job| (job.scheduled_for, job.id))
            .collect();
        due.sort();
        due.truncate(batch_size as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(job) = transition(&mut jobs, id, JobStatus::InFlight) {
                job.status = JobStatus::InFlight;
                job.updated_at = now;
                job.error_info = None;
                claimed.push(job.clone());
            }
        }

        debug!(claimed = claimed.len(), batch_size, "Claimed due jobs");
        Ok(claimed)
    }

    async fn mark_sent(&self, id: JobId, sent_at: DateTime<Utc>) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = transition(&mut jobs, id, JobStatus::Sent)
            .ok_or_else(|| AppError::not_found(NOT_IN_FLIGHT))?;
        job.status = JobStatus::Sent;
        job.sent_at = Some(sent_at);
        job.updated_at = sent_at;
        job.error_info = None;
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, error_info: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = transition(&mut jobs, id, JobStatus::Failed)
            .ok_or_else(|| AppError::not_found(NOT_IN_FLIGHT))?;
        job.status = JobStatus::Failed;
        job.error_info = Some(error_info.to_string());
        job.updated_at = now;
        Ok(())
    }

    async fn renew_lease(
        &self,
        id: JobId,
        claimed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::InFlight && job.updated_at == claimed_at => {
                job.updated_at = now;
                Ok(())
            }
            _ => Err(AppError::not_found(LEASE_LOST)),
        }
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>, lease_timeout: Duration) -> AppResult<u64> {
        let mut jobs = self.jobs.lock().await;
        let mut reclaimed = 0;
        for job in jobs.values_mut() {
            if job.is_lease_expired(now, lease_timeout)
                && job.status.can_transition_to(JobStatus::Scheduled)
            {
                job.status = JobStatus::Scheduled;
                job.updated_at = now;
                job.error_info = None;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn cancel(&self, id: JobId, owner_id: OwnerId, now: DateTime<Utc>) -> AppResult<Job> {
        let mut jobs = self.jobs.lock().await;
        match transition(&mut jobs, id, JobStatus::Cancelled) {
            Some(job) if job.owner_id == owner_id => {
                job.status = JobStatus::Cancelled;
                job.updated_at = now;
                Ok(job.clone())
            }
            _ => Err(AppError::not_found(NOT_CANCELLABLE)),
        }
    }

    async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        request: &CursorRequest,
    ) -> AppResult<CursorPage<Job>> {
        let jobs = self.jobs.lock().await;

        let start = match request.cursor {
            Some(cursor) => match jobs.get(&cursor).filter(|job| job.owner_id == owner_id) {
                Some(job) => Some((job.scheduled_for, job.id)),
                None => return Ok(CursorPage::empty()),
            },
            None => None,
        };

        let mut rows: Vec<Job> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .filter(|job| start.is_none_or(|key| (job.scheduled_for, job.id) <= key))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.scheduled_for, b.id).cmp(&(a.scheduled_for, a.id)));
        rows.truncate(request.fetch_limit() as usize);

        Ok(CursorPage::from_overfetch(rows, request, |job| job.id))
    }

    async fn stats(&self, owner_id: OwnerId) -> AppResult<StatusCounts> {
        let jobs = self.jobs.lock().await;
        let mut counts = StatusCounts::default();
        for job in jobs.values().filter(|job| job.owner_id == owner_id) {
            counts.record(job.status, 1);
        }
        Ok(counts)
    }
}
