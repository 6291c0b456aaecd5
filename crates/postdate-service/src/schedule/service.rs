//! Schedule CRUD service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use postdate_core::error::AppError;
use postdate_core::traits::Clock;
use postdate_core::types::{CursorPage, CursorRequest, JobId};
use postdate_database::JobStore;
use postdate_entity::job::{Job, NewJob, StatusCounts};

use crate::context::RequestContext;

/// Request to schedule a new message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Earliest delivery time.
    pub scheduled_for: DateTime<Utc>,
}

/// Manages scheduling, listing, and cancellation for one owner at a time.
#[derive(Debug, Clone)]
pub struct ScheduleService {
    /// Job store.
    store: Arc<dyn JobStore>,
    /// Time source for validation and transitions.
    clock: Arc<dyn Clock>,
}

impl ScheduleService {
    /// Creates a new schedule service.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validates and persists a new scheduled message.
    pub async fn schedule(
        &self,
        ctx: &RequestContext,
        req: ScheduleRequest,
    ) -> Result<Job, AppError> {
        let now = self.clock.now();
        let new = NewJob {
            owner_id: ctx.owner_id,
            recipient: req.recipient.trim().to_string(),
            subject: req.subject,
            body: req.body,
            scheduled_for: req.scheduled_for,
        };
        new.validate_at(now)?;

        let job = self.store.create(new, now).await?;
        info!(
            job_id = %job.id,
            owner_id = %job.owner_id,
            scheduled_for = %job.scheduled_for,
            "Scheduled message"
        );
        Ok(job)
    }

    /// Lists the caller's jobs, newest scheduled time first.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        limit: u32,
        cursor: Option<JobId>,
    ) -> Result<CursorPage<Job>, AppError> {
        let request = CursorRequest::new(limit, cursor);
        self.store.list_for_owner(ctx.owner_id, &request).await
    }

    /// Fetches one of the caller's jobs.
    pub async fn get(&self, ctx: &RequestContext, id: JobId) -> Result<Job, AppError> {
        self.store
            .find_for_owner(id, ctx.owner_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Email {id} not found")))
    }

    /// Cancels a job that has not been claimed yet.
    pub async fn cancel(&self, ctx: &RequestContext, id: JobId) -> Result<Job, AppError> {
        let job = self.store.cancel(id, ctx.owner_id, self.clock.now()).await?;
        info!(job_id = %job.id, owner_id = %job.owner_id, "Cancelled scheduled message");
        Ok(job)
    }

    /// Counts the caller's jobs per status.
    pub async fn stats(&self, ctx: &RequestContext) -> Result<StatusCounts, AppError> {
        self.store.stats(ctx.owner_id).await
    }
}
