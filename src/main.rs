//! Postdate dispatcher daemon.
//!
//! Loads configuration, connects to the job store, and runs a dispatch
//! pass on the configured cron schedule until Ctrl+C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use postdate_core::config::AppConfig;
use postdate_core::error::AppError;
use postdate_core::traits::SystemClock;
use postdate_database::JobDatabase;
use postdate_worker::{CronScheduler, Dispatcher, build_sender};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Dispatcher error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("POSTDATE_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

    let env = std::env::var("POSTDATE_ENV").unwrap_or_else(|_| "production".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main daemon run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Postdate dispatcher v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let database = JobDatabase::connect(&config.database).await?;
    database.migrate().await?;

    // ── Step 2: Mail provider ────────────────────────────────────
    let sender = build_sender(&config.sender)?;

    // ── Step 3: Dispatcher ───────────────────────────────────────
    let store = Arc::new(database.job_store());
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        sender,
        Arc::new(SystemClock),
        &config.dispatcher,
    )?);

    if !config.dispatcher.enabled {
        tracing::warn!("Dispatcher disabled by configuration; waiting for shutdown");
        shutdown_signal().await;
        database.close().await;
        return Ok(());
    }

    // ── Step 4: Cron trigger ─────────────────────────────────────
    let mut scheduler = CronScheduler::new(Arc::clone(&dispatcher)).await?;
    scheduler
        .register_dispatch(&config.dispatcher.schedule)
        .await?;
    scheduler.start().await?;

    tracing::info!(
        batch_size = config.dispatcher.batch_size,
        lease_timeout_seconds = config.dispatcher.lease_timeout_seconds,
        send_timeout_seconds = config.dispatcher.send_timeout_seconds,
        "Dispatcher running"
    );

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    scheduler.shutdown().await?;
    dispatcher.stop();

    // A stopped pass starts no new sends, so only the sends already running
    // (each bounded by the send timeout) are left to record. Claimed jobs that
    // never started are reclaimed after their lease by the next dispatcher.
    let grace = config.dispatcher.send_timeout() + Duration::from_secs(5);
    let waited = tokio::time::timeout(grace, async {
        while scheduler.is_busy() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    if waited.is_err() {
        tracing::warn!("Dispatch pass still running at shutdown; its jobs will be reclaimed");
    }

    database.close().await;
    tracing::info!("Postdate dispatcher shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
