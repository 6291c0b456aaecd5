//! Dispatcher: one claim, send, record pass over the due jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing;

use postdate_core::config::DispatcherConfig;
use postdate_core::error::{AppError, ErrorKind};
use postdate_core::traits::{Clock, MessageSender, SendError};
use postdate_database::JobStore;
use postdate_entity::job::Job;

use crate::lease::LeaseRecovery;

/// Aggregate result of one dispatch pass.
///
/// `processed` counts every claimed job. A job whose outcome could not be
/// recorded (its lease was lost, or the store failed) is in none of `sent`,
/// `failed` and `skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Jobs claimed by this pass.
    pub processed: usize,
    /// Jobs delivered and recorded as sent.
    pub sent: usize,
    /// Jobs recorded as failed.
    pub failed: usize,
    /// Jobs never sent: their lease was reclaimed while they waited, or the
    /// dispatcher was stopping. They stay with whoever holds the lease.
    pub skipped: usize,
    /// Abandoned jobs returned to the pool before claiming.
    pub reclaimed: u64,
    /// The `now` the pass ran at.
    pub timestamp: DateTime<Utc>,
}

/// What happened to one claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Failed,
    Skipped,
    Unrecorded,
}

/// Runs dispatch passes. Any number of dispatchers may share a store.
///
/// A claim starts the lease of every job in the batch, but a job only
/// reaches the provider after [`JobStore::renew_lease`] restarts its lease
/// under that same claim. A job that waited in the batch past its lease
/// and was reclaimed elsewhere is skipped instead of sent twice.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Job store.
    store: Arc<dyn JobStore>,
    /// Mail provider.
    sender: Arc<dyn MessageSender>,
    /// Time source for `run_once` and completion timestamps.
    clock: Arc<dyn Clock>,
    /// Stale lease recovery run before each claim.
    recovery: LeaseRecovery,
    /// Maximum jobs claimed per pass.
    batch_size: u32,
    /// Upper bound on one provider call.
    send_timeout: Duration,
    /// Sends in flight at once within a batch.
    send_concurrency: usize,
    /// Set by [`Dispatcher::stop`]; shared by clones.
    stopping: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Create a dispatcher from validated configuration.
    pub fn new(
        store: Arc<dyn JobStore>,
        sender: Arc<dyn MessageSender>,
        clock: Arc<dyn Clock>,
        config: &DispatcherConfig,
    ) -> Result<Self, AppError> {
        let recovery = LeaseRecovery::new(Arc::clone(&store), config.lease_timeout())?;
        Ok(Self {
            store,
            sender,
            clock,
            recovery,
            batch_size: config.batch_size.max(1),
            send_timeout: config.send_timeout(),
            send_concurrency: config.send_concurrency.max(1),
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Stop starting sends. Sends already running finish and are recorded;
    /// claimed jobs that have not started are left to lease recovery.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Whether [`Dispatcher::stop`] has been called.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Run one pass at the clock's current time.
    pub async fn run_once(&self) -> Result<RunSummary, AppError> {
        self.run_once_at(self.clock.now()).await
    }

    /// Run one pass at `now`.
    ///
    /// Fails only when the claim itself fails; per-job send and record
    /// failures are absorbed into the summary.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<RunSummary, AppError> {
        if self.is_stopping() {
            tracing::debug!("Dispatcher stopping, not claiming");
            return Ok(RunSummary {
                processed: 0,
                sent: 0,
                failed: 0,
                skipped: 0,
                reclaimed: 0,
                timestamp: now,
            });
        }

        let reclaimed = self.recovery.reclaim(now).await.unwrap_or(0);

        let jobs = self
            .store
            .claim_due(now, self.batch_size)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to claim due jobs"))?;

        let processed = jobs.len();
        let outcomes: Vec<Outcome> = futures::stream::iter(jobs)
            .map(|job| self.process(job, now))
            .buffer_unordered(self.send_concurrency)
            .collect()
            .await;

        let summary = RunSummary {
            processed,
            sent: outcomes.iter().filter(|o| **o == Outcome::Sent).count(),
            failed: outcomes.iter().filter(|o| **o == Outcome::Failed).count(),
            skipped: outcomes.iter().filter(|o| **o == Outcome::Skipped).count(),
            reclaimed,
            timestamp: now,
        };

        tracing::info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            reclaimed = summary.reclaimed,
            "Dispatch pass finished"
        );
        Ok(summary)
    }

    /// Send one claimed job and record the outcome.
    async fn process(&self, job: Job, now: DateTime<Utc>) -> Outcome {
        if self.is_stopping() {
            tracing::debug!(job_id = %job.id, "Dispatcher stopping, leaving job to lease recovery");
            return Outcome::Skipped;
        }

        // The lease must cover the send itself, not the wait in the batch.
        let started = self.clock.now().max(now);
        match self.store.renew_lease(job.id, job.updated_at, started).await {
            Ok(()) => {}
            Err(e) if e.kind == ErrorKind::NotFound => {
                tracing::warn!(job_id = %job.id, "Lease lost before send, skipping job");
                return Outcome::Skipped;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to renew job lease");
                return Outcome::Skipped;
            }
        }

        let message = job.to_message();
        let result = match tokio::time::timeout(self.send_timeout, self.sender.send(&message)).await
        {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(self.send_timeout)),
        };

        // Never record a completion before the send started.
        let finished = self.clock.now().max(started);

        match result {
            Ok(()) => match self.store.mark_sent(job.id, finished).await {
                Ok(()) => {
                    tracing::debug!(job_id = %job.id, provider = self.sender.name(), "Message sent");
                    Outcome::Sent
                }
                Err(e) => {
                    log_unrecorded(&job, &e);
                    Outcome::Unrecorded
                }
            },
            Err(send_error) => {
                let error_info = send_error.to_string();
                tracing::warn!(
                    job_id = %job.id,
                    provider = self.sender.name(),
                    error = %error_info,
                    "Message send failed"
                );
                match self.store.mark_failed(job.id, &error_info, finished).await {
                    Ok(()) => Outcome::Failed,
                    Err(e) => {
                        log_unrecorded(&job, &e);
                        Outcome::Unrecorded
                    }
                }
            }
        }
    }
}

fn log_unrecorded(job: &Job, error: &AppError) {
    if error.kind == ErrorKind::NotFound {
        tracing::warn!(job_id = %job.id, "Lease lost before outcome was recorded");
    } else {
        tracing::error!(job_id = %job.id, error = %error, "Failed to record job outcome");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};

    use postdate_core::traits::{ManualClock, OutboundMessage};
    use postdate_core::types::OwnerId;
    use postdate_database::InMemoryJobStore;
    use postdate_entity::job::{JobStatus, NewJob};

    /// Records every message; fails for recipients in `reject`.
    #[derive(Debug, Default)]
    struct RecordingSender {
        sent: Mutex<Vec<OutboundMessage>>,
        reject: HashSet<String>,
        delay: Option<Duration>,
    }

    impl RecordingSender {
        fn rejecting(recipient: &str) -> Self {
            Self {
                reject: HashSet::from([recipient.to_string()]),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sent.lock().unwrap().push(message.clone());
            if self.reject.contains(&message.recipient) {
                return Err(SendError::Rejected("Inactive recipient".to_string()));
            }
            Ok(())
        }
    }

    /// Wall time that follows tokio's pausable clock.
    #[derive(Debug)]
    struct TokioClock {
        base: DateTime<Utc>,
        origin: tokio::time::Instant,
    }

    impl TokioClock {
        fn new(base: DateTime<Utc>) -> Self {
            Self {
                base,
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            self.base + TimeDelta::from_std(self.origin.elapsed()).unwrap()
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn new_job(owner_id: OwnerId, recipient: &str, scheduled_for: DateTime<Utc>) -> NewJob {
        NewJob {
            owner_id,
            recipient: recipient.to_string(),
            subject: "Invoice".to_string(),
            body: "Due Friday.".to_string(),
            scheduled_for,
        }
    }

    fn dispatcher(
        store: &InMemoryJobStore,
        sender: Arc<RecordingSender>,
        clock: &ManualClock,
    ) -> Dispatcher {
        Dispatcher::new(
            Arc::new(store.clone()),
            sender,
            Arc::new(clock.clone()),
            &DispatcherConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_future_job_is_sent_once_due() {
        let store = InMemoryJobStore::new();
        let clock = ManualClock::new(start());
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(&store, Arc::clone(&sender), &clock);
        let owner = OwnerId::new();
        let job = store
            .create(
                new_job(owner, "ada@example.com", start() + TimeDelta::hours(1)),
                start(),
            )
            .await
            .unwrap();

        let summary = dispatcher.run_once().await.unwrap();
        assert_eq!(summary.processed, 0);
        assert!(sender.sent().is_empty());

        clock.advance(TimeDelta::hours(1));
        let summary = dispatcher.run_once().await.unwrap();
        assert_eq!((summary.processed, summary.sent, summary.failed), (1, 1, 0));
        assert_eq!(summary.timestamp, start() + TimeDelta::hours(1));

        let stored = store.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Sent);
        assert_eq!(stored.sent_at, Some(start() + TimeDelta::hours(1)));
        assert_eq!(store.stats(owner).await.unwrap().sent, 1);
        assert_eq!(sender.sent()[0].recipient, "ada@example.com");
    }

    #[tokio::test]
    async fn test_send_failure_is_recorded_and_never_retried() {
        let store = InMemoryJobStore::new();
        let clock = ManualClock::new(start());
        let sender = Arc::new(RecordingSender::rejecting("bounce@example.com"));
        let dispatcher = dispatcher(&store, Arc::clone(&sender), &clock);
        let owner = OwnerId::new();
        let bad = store
            .create(new_job(owner, "bounce@example.com", start()), start())
            .await
            .unwrap();
        let good = store
            .create(new_job(owner, "ada@example.com", start()), start())
            .await
            .unwrap();

        let summary = dispatcher.run_once().await.unwrap();
        assert_eq!((summary.processed, summary.sent, summary.failed), (2, 1, 1));

        let failed = store.get(bad.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error_info.unwrap().contains("Inactive recipient"));
        assert_eq!(store.get(good.id).await.unwrap().status, JobStatus::Sent);

        clock.advance(TimeDelta::days(1));
        let summary = dispatcher.run_once().await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(sender.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_job_is_delivered_exactly_once_more() {
        let store = InMemoryJobStore::new();
        let clock = ManualClock::new(start());
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = dispatcher(&store, Arc::clone(&sender), &clock);
        let job = store
            .create(new_job(OwnerId::new(), "ada@example.com", start()), start())
            .await
            .unwrap();

        // A dispatcher claims and dies before sending.
        store.claim_due(start(), 10).await.unwrap();

        clock.advance(TimeDelta::minutes(10));
        let summary = dispatcher.run_once().await.unwrap();
        assert_eq!((summary.processed, summary.reclaimed), (0, 0));

        clock.advance(TimeDelta::minutes(6));
        let summary = dispatcher.run_once().await.unwrap();
        assert_eq!(summary.reclaimed, 1);
        assert_eq!((summary.processed, summary.sent), (1, 1));
        assert_eq!(store.get(job.id).await.unwrap().status, JobStatus::Sent);

        clock.advance(TimeDelta::hours(1));
        dispatcher.run_once().await.unwrap();
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_marks_job_failed() {
        let store = InMemoryJobStore::new();
        let clock = ManualClock::new(start());
        let sender = Arc::new(RecordingSender {
            delay: Some(Duration::from_secs(120)),
            ..Default::default()
        });
        let dispatcher = dispatcher(&store, Arc::clone(&sender), &clock);
        let job = store
            .create(new_job(OwnerId::new(), "slow@example.com", start()), start())
            .await
            .unwrap();

        let summary = dispatcher.run_once().await.unwrap();
        assert_eq!((summary.processed, summary.failed), (1, 1));

        let stored = store.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error_info.unwrap().contains("timed out"));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_limits_each_pass() {
        let store = InMemoryJobStore::new();
        let clock = ManualClock::new(start());
        let sender = Arc::new(RecordingSender::default());
        let config = DispatcherConfig {
            batch_size: 3,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(
            Arc::new(store.clone()),
            sender.clone(),
            Arc::new(clock.clone()),
            &config,
        )
        .unwrap();
        let owner = OwnerId::new();
        for minutes in 0..5 {
            store
                .create(
                    new_job(owner, "ada@example.com", start() - TimeDelta::minutes(minutes)),
                    start() - TimeDelta::hours(1),
                )
                .await
                .unwrap();
        }

        assert_eq!(dispatcher.run_once().await.unwrap().processed, 3);
        assert_eq!(dispatcher.run_once().await.unwrap().processed, 2);
        assert_eq!(dispatcher.run_once().await.unwrap().processed, 0);
        assert_eq!(store.stats(owner).await.unwrap().sent, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_passes_send_each_job_once() {
        let store = InMemoryJobStore::new();
        let clock = ManualClock::new(start());
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Arc::new(dispatcher(&store, Arc::clone(&sender), &clock));
        let owner = OwnerId::new();
        for seconds in 0..60 {
            store
                .create(
                    new_job(owner, "ada@example.com", start() - TimeDelta::seconds(seconds)),
                    start() - TimeDelta::hours(1),
                )
                .await
                .unwrap();
        }

        let passes = (0..5).map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.run_once().await.unwrap() })
        });
        let processed: usize = futures::future::join_all(passes)
            .await
            .into_iter()
            .map(|summary| summary.unwrap().processed)
            .sum();

        assert_eq!(processed, 60);
        assert_eq!(sender.sent().len(), 60);
        assert_eq!(store.stats(owner).await.unwrap().sent, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_waiting_past_its_lease_is_sent_once() {
        let store = InMemoryJobStore::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(start()));
        let sender = Arc::new(RecordingSender {
            delay: Some(Duration::from_secs(25)),
            ..Default::default()
        });
        // 60 sends of 25s each take far longer than the 900s lease.
        let config = DispatcherConfig {
            batch_size: 60,
            send_concurrency: 1,
            ..Default::default()
        };
        let owner = OwnerId::new();
        for i in 0..60i64 {
            store
                .create(
                    new_job(
                        owner,
                        &format!("user{i}@example.com"),
                        start() - TimeDelta::seconds(60 - i),
                    ),
                    start() - TimeDelta::hours(1),
                )
                .await
                .unwrap();
        }
        let build = || {
            Dispatcher::new(
                Arc::new(store.clone()),
                sender.clone(),
                Arc::clone(&clock),
                &config,
            )
            .unwrap()
        };
        let slow = build();
        let rescuer = build();

        let slow_pass = tokio::spawn(async move { slow.run_once().await.unwrap() });
        tokio::time::sleep(Duration::from_secs(910)).await;
        let rescue = rescuer.run_once().await.unwrap();
        let slow = slow_pass.await.unwrap();

        assert_eq!(slow.processed, 60);
        assert!(rescue.processed > 0);
        assert_eq!(rescue.reclaimed as usize, rescue.processed);
        assert_eq!(slow.skipped, rescue.processed);
        assert_eq!(slow.sent + rescue.sent, 60);

        let sent = sender.sent();
        let recipients: HashSet<String> = sent.iter().map(|m| m.recipient.clone()).collect();
        assert_eq!(sent.len(), 60);
        assert_eq!(recipients.len(), 60);
        assert_eq!(store.stats(owner).await.unwrap().sent, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_finishes_running_send_and_leaves_the_rest() {
        let store = InMemoryJobStore::new();
        let clock = ManualClock::new(start());
        let sender = Arc::new(RecordingSender {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let config = DispatcherConfig {
            send_concurrency: 1,
            ..Default::default()
        };
        let dispatcher = Arc::new(
            Dispatcher::new(
                Arc::new(store.clone()),
                sender.clone(),
                Arc::new(clock.clone()),
                &config,
            )
            .unwrap(),
        );
        let owner = OwnerId::new();
        for seconds in 0..3 {
            store
                .create(
                    new_job(owner, "ada@example.com", start() - TimeDelta::seconds(seconds)),
                    start() - TimeDelta::hours(1),
                )
                .await
                .unwrap();
        }

        let pass = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.run_once().await.unwrap() })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        dispatcher.stop();
        let summary = pass.await.unwrap();

        assert_eq!((summary.processed, summary.sent, summary.skipped), (3, 1, 2));
        let counts = store.stats(owner).await.unwrap();
        assert_eq!((counts.sent, counts.in_flight), (1, 2));
        assert_eq!(sender.sent().len(), 1);
        assert_eq!(dispatcher.run_once().await.unwrap().processed, 0);
    }
}
