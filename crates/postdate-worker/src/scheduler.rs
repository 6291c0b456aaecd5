//! Cron trigger for periodic dispatch passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use postdate_core::error::AppError;

use crate::dispatcher::Dispatcher;

/// Runs [`Dispatcher::run_once`] on a cron schedule.
///
/// Ticks never overlap within one process: a tick that fires while the
/// previous pass is still running is skipped. Passes from other processes
/// are coordinated by the store alone.
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Dispatcher invoked on each tick
    dispatcher: Arc<Dispatcher>,
    /// Set while a pass started by this scheduler is running
    busy: Arc<AtomicBool>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .finish()
    }
}

/// Clears the busy flag when a pass ends, even by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(dispatcher: Arc<Dispatcher>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            dispatcher,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register the dispatch pass under a six-field cron expression
    pub async fn register_dispatch(&self, schedule: &str) -> Result<(), AppError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let busy = Arc::clone(&self.busy);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let dispatcher = Arc::clone(&dispatcher);
            let busy = Arc::clone(&busy);
            Box::pin(async move {
                run_tick(&dispatcher, busy).await;
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid dispatch schedule '{}': {}", schedule, e))
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add dispatch schedule: {}", e)))?;

        tracing::info!("Registered: dispatch ({})", schedule);
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Whether a pass started by this scheduler is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// One tick: skip if busy, otherwise run a pass and log failures.
async fn run_tick(dispatcher: &Dispatcher, busy: Arc<AtomicBool>) {
    if busy.swap(true, Ordering::AcqRel) {
        tracing::debug!("Previous dispatch pass still running, skipping tick");
        return;
    }
    let _guard = BusyGuard(busy);

    match dispatcher.run_once().await {
        Ok(_) => {}
        Err(e) if e.is_retryable() => {
            tracing::warn!("Dispatch pass failed, retrying on next tick: {}", e);
        }
        Err(e) => tracing::error!("Dispatch pass failed: {}", e),
    }
}
