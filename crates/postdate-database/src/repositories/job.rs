//! PostgreSQL job store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::debug;

use postdate_core::error::{AppError, ErrorKind};
use postdate_core::result::AppResult;
use postdate_core::types::{CursorPage, CursorRequest, JobId, OwnerId};
use postdate_entity::job::{Job, JobStatus, NewJob, StatusCounts};

use crate::store::{JobStore, LEASE_LOST, NOT_CANCELLABLE, NOT_IN_FLIGHT};

/// Claims due rows with `FOR UPDATE SKIP LOCKED` so concurrent dispatchers
/// partition the due set instead of blocking on each other. The outer
/// `UPDATE` only touches rows this statement locked.
const CLAIM_DUE_SQL: &str = "\
    WITH due AS ( \
        SELECT id FROM scheduled_jobs \
        WHERE status = 'scheduled' AND scheduled_for <= $1 \
        ORDER BY scheduled_for ASC, id ASC \
        LIMIT $2 \
        FOR UPDATE SKIP LOCKED \
    ) \
    UPDATE scheduled_jobs AS j \
    SET status = 'in_flight', updated_at = $1, error_info = NULL \
    FROM due WHERE j.id = due.id \
    RETURNING j.*";

/// The cursor row is inclusive and must belong to the same owner; an
/// unknown cursor compares as NULL and yields an empty page.
const LIST_FOR_OWNER_SQL: &str = "\
    SELECT * FROM scheduled_jobs \
    WHERE owner_id = $1 \
      AND ($2::uuid IS NULL OR (scheduled_for, id) <= ( \
            SELECT c.scheduled_for, c.id FROM scheduled_jobs c \
            WHERE c.id = $2 AND c.owner_id = $1)) \
    ORDER BY scheduled_for DESC, id DESC \
    LIMIT $3";

/// `JobStore` backed by the `scheduled_jobs` table.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Create a new job store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, new: NewJob, now: DateTime<Utc>) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO scheduled_jobs \
             (id, owner_id, recipient, subject, body, scheduled_for, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'scheduled', $7, $7) RETURNING *",
        )
        .bind(JobId::new())
        .bind(new.owner_id)
        .bind(&new.recipient)
        .bind(&new.subject)
        .bind(&new.body)
        .bind(new.scheduled_for)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create job"))
    }

    async fn find_for_owner(&self, id: JobId, owner_id: OwnerId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM scheduled_jobs WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find job"))
    }

    async fn claim_due(&self, now: DateTime<Utc>, batch_size: u32) -> AppResult<Vec<Job>> {
        let mut jobs = sqlx::query_as::<_, Job>(CLAIM_DUE_SQL)
            .bind(now)
            .bind(i64::from(batch_size))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to claim due jobs"))?;

        // RETURNING does not preserve the CTE order.
        jobs.sort_by(|a, b| (a.scheduled_for, a.id).cmp(&(b.scheduled_for, b.id)));

        debug!(claimed = jobs.len(), batch_size, "Claimed due jobs");
        Ok(jobs)
    }

    async fn mark_sent(&self, id: JobId, sent_at: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET status = 'sent', sent_at = $2, updated_at = $2, \
             error_info = NULL WHERE id = $1 AND status = 'in_flight'",
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark job as sent"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(NOT_IN_FLIGHT));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, error_info: &str, now: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET status = 'failed', error_info = $2, updated_at = $3 \
             WHERE id = $1 AND status = 'in_flight'",
        )
        .bind(id)
        .bind(error_info)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark job as failed"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(NOT_IN_FLIGHT));
        }
        Ok(())
    }

    async fn renew_lease(
        &self,
        id: JobId,
        claimed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET updated_at = $3 \
             WHERE id = $1 AND status = 'in_flight' AND updated_at = $2",
        )
        .bind(id)
        .bind(claimed_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to renew job lease"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(LEASE_LOST));
        }
        Ok(())
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>, lease_timeout: Duration) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET status = 'scheduled', updated_at = $1, error_info = NULL \
             WHERE status = 'in_flight' AND updated_at < $2",
        )
        .bind(now)
        .bind(now - lease_timeout)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to reclaim stale jobs"))?;

        Ok(result.rows_affected())
    }

    async fn cancel(&self, id: JobId, owner_id: OwnerId, now: DateTime<Utc>) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "UPDATE scheduled_jobs SET status = 'cancelled', updated_at = $3 \
             WHERE id = $1 AND owner_id = $2 AND status = 'scheduled' RETURNING *",
        )
        .bind(id)
        .bind(owner_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to cancel job"))?
        .ok_or_else(|| AppError::not_found(NOT_CANCELLABLE))
    }

    async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        request: &CursorRequest,
    ) -> AppResult<CursorPage<Job>> {
        let rows = sqlx::query_as::<_, Job>(LIST_FOR_OWNER_SQL)
            .bind(owner_id)
            .bind(request.cursor)
            .bind(i64::from(request.fetch_limit()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list jobs"))?;

        Ok(CursorPage::from_overfetch(rows, request, |job| job.id))
    }

    async fn stats(&self, owner_id: OwnerId) -> AppResult<StatusCounts> {
        let rows = sqlx::query_as::<_, (JobStatus, i64)>(
            "SELECT status, COUNT(*) FROM scheduled_jobs WHERE owner_id = $1 GROUP BY status",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to count jobs"))?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.record(status, count.max(0) as u64);
        }
        Ok(counts)
    }
}
