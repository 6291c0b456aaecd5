//! Integration tests for the PostgreSQL job store.
//!
//! Require a disposable database:
//! `DATABASE_URL=postgres://... cargo test -p postdate-database -- --ignored`

use chrono::{DateTime, Duration, DurationRound, Utc};

use postdate_core::config::DatabaseConfig;
use postdate_core::error::ErrorKind;
use postdate_core::types::{CursorRequest, OwnerId};
use postdate_database::{JobDatabase, JobStore, PgJobStore};
use postdate_entity::job::{JobStatus, NewJob};

async fn store() -> PgJobStore {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        ..Default::default()
    };
    let database = JobDatabase::connect(&config).await.expect("connect");
    database.migrate().await.expect("migrations");
    database.job_store()
}

/// Postgres keeps microseconds; truncate so round-tripped values compare equal.
fn now() -> DateTime<Utc> {
    Utc::now()
        .duration_trunc(Duration::microseconds(1))
        .expect("truncate")
}

fn new_job(owner_id: OwnerId, scheduled_for: DateTime<Utc>) -> NewJob {
    NewJob {
        owner_id,
        recipient: "grace@example.com".to_string(),
        subject: "Quarterly report".to_string(),
        body: "Attached.".to_string(),
        scheduled_for,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_claim_send_roundtrip() {
    let store = store().await;
    let owner = OwnerId::new();
    let t = now();
    let job = store
        .create(new_job(owner, t - Duration::seconds(1)), t - Duration::minutes(1))
        .await
        .unwrap();

    // Other tests share the table; claim until ours shows up.
    let mut claimed = None;
    for _ in 0..20 {
        let batch = store.claim_due(t, 1000).await.unwrap();
        if let Some(found) = batch.into_iter().find(|j| j.id == job.id) {
            claimed = Some(found);
            break;
        }
    }
    let claimed = claimed.expect("job was claimed");
    assert_eq!(claimed.status, JobStatus::InFlight);

    let started = t + Duration::seconds(2);
    store
        .renew_lease(job.id, claimed.updated_at, started)
        .await
        .unwrap();
    let err = store
        .renew_lease(job.id, claimed.updated_at, started)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    store.mark_sent(job.id, t).await.unwrap();
    let err = store.mark_sent(job.id, t).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let stored = store.find_for_owner(job.id, owner).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Sent);
    assert_eq!(stored.sent_at, Some(t));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_claims_never_overlap() {
    let store = store().await;
    let owner = OwnerId::new();
    let t = now();
    for offset in 0..40 {
        store
            .create(new_job(owner, t - Duration::seconds(offset + 1)), t - Duration::hours(1))
            .await
            .unwrap();
    }

    let claimers = (0..6).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.claim_due(t, 10).await.unwrap() })
    });
    let mut ids: Vec<_> = futures::future::join_all(claimers)
        .await
        .into_iter()
        .flat_map(|batch| batch.unwrap())
        .filter(|job| job.owner_id == owner)
        .map(|job| job.id)
        .collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_cancel_and_list() {
    let store = store().await;
    let owner = OwnerId::new();
    let t = now();
    let mut created = Vec::new();
    for hours in 1..=3 {
        created.push(
            store
                .create(new_job(owner, t + Duration::hours(hours)), t)
                .await
                .unwrap(),
        );
    }

    let cancelled = store.cancel(created[0].id, owner, t).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(store.cancel(created[0].id, owner, t).await.is_err());
    assert!(store.cancel(created[1].id, OwnerId::new(), t).await.is_err());

    let page = store
        .list_for_owner(owner, &CursorRequest::new(2, None))
        .await
        .unwrap();
    assert_eq!(page.items[0].id, created[2].id);
    assert_eq!(page.next_cursor, Some(created[0].id));

    let counts = store.stats(owner).await.unwrap();
    assert_eq!(counts.scheduled, 2);
    assert_eq!(counts.cancelled, 1);
}
