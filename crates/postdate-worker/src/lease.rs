//! Recovery of jobs whose dispatcher died mid-send.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing;

use postdate_core::error::AppError;
use postdate_database::JobStore;

/// Returns abandoned in-flight jobs to the claim pool.
///
/// A job is abandoned once it has been `InFlight` for longer than the lease
/// timeout. A live dispatcher renews the lease as each send starts, and the
/// send timeout is smaller than the lease, so it records the outcome before
/// the lease runs out.
#[derive(Debug, Clone)]
pub struct LeaseRecovery {
    /// Job store.
    store: Arc<dyn JobStore>,
    /// How long a claim stays valid.
    lease_timeout: Duration,
}

impl LeaseRecovery {
    /// Create a new lease recovery with the given lease.
    pub fn new(store: Arc<dyn JobStore>, lease_timeout: std::time::Duration) -> Result<Self, AppError> {
        let lease_timeout = Duration::from_std(lease_timeout)
            .map_err(|e| AppError::configuration(format!("Lease timeout out of range: {e}")))?;
        Ok(Self {
            store,
            lease_timeout,
        })
    }

    /// Reclaim stale jobs. Best-effort: a store failure is logged and
    /// reported as `None`, never propagated.
    pub async fn reclaim(&self, now: DateTime<Utc>) -> Option<u64> {
        match self.store.reclaim_stale(now, self.lease_timeout).await {
            Ok(0) => Some(0),
            Ok(count) => {
                tracing::warn!(
                    reclaimed = count,
                    lease_seconds = self.lease_timeout.num_seconds(),
                    "Reclaimed jobs with expired leases"
                );
                Some(count)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lease recovery failed; continuing with dispatch");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use postdate_core::types::OwnerId;
    use postdate_database::InMemoryJobStore;
    use postdate_entity::job::{JobStatus, NewJob};

    #[tokio::test]
    async fn test_reclaims_only_after_lease() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let store = InMemoryJobStore::new();
        let recovery =
            LeaseRecovery::new(Arc::new(store.clone()), std::time::Duration::from_secs(900)).unwrap();

        let job = store
            .create(
                NewJob {
                    owner_id: OwnerId::new(),
                    recipient: "ada@example.com".to_string(),
                    subject: "Hello".to_string(),
                    body: "World".to_string(),
                    scheduled_for: start,
                },
                start - Duration::hours(1),
            )
            .await
            .unwrap();
        store.claim_due(start, 10).await.unwrap();

        assert_eq!(recovery.reclaim(start + Duration::minutes(15)).await, Some(0));
        assert_eq!(
            recovery
                .reclaim(start + Duration::minutes(15) + Duration::seconds(1))
                .await,
            Some(1)
        );
        assert_eq!(store.get(job.id).await.unwrap().status, JobStatus::Scheduled);
    }
}
