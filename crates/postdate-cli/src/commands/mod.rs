//! CLI command definitions and dispatch.

pub mod config;
pub mod dispatch;
pub mod email;
pub mod migrate;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use postdate_core::config::AppConfig;
use postdate_core::error::AppError;
use postdate_core::traits::SystemClock;
use postdate_database::{JobDatabase, PgJobStore};
use postdate_service::ScheduleService;

/// Postdate: schedule messages for later delivery
#[derive(Debug, Parser)]
#[command(name = "postdate", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay (`config/{env}.toml`)
    #[arg(short, long, default_value = "production")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Schedule a message
    Schedule(email::ScheduleArgs),
    /// List an owner's messages, newest scheduled time first
    List(email::ListArgs),
    /// Show one message
    Show(email::ShowArgs),
    /// Cancel a message that has not been dispatched
    Cancel(email::CancelArgs),
    /// Count an owner's messages by status
    Stats(email::StatsArgs),
    /// Dispatch management
    Dispatch(dispatch::DispatchArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let (path, env, format) = (self.config.as_str(), self.env.as_str(), self.format);
        match &self.command {
            Commands::Schedule(args) => email::schedule(args, path, env, format).await,
            Commands::List(args) => email::list(args, path, env, format).await,
            Commands::Show(args) => email::show(args, path, env, format).await,
            Commands::Cancel(args) => email::cancel(args, path, env, format).await,
            Commands::Stats(args) => email::stats(args, path, env, format).await,
            Commands::Dispatch(args) => dispatch::execute(args, path, env, format).await,
            Commands::Migrate(args) => migrate::execute(args, path, env).await,
            Commands::Config(args) => config::execute(args, path, env, format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str, env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path, env)
}

/// Helper: connect to the configured job database
pub async fn connect_database(config: &AppConfig) -> Result<JobDatabase, AppError> {
    JobDatabase::connect(&config.database).await
}

/// Helper: job store backed by the configured database
pub async fn create_job_store(config: &AppConfig) -> Result<Arc<PgJobStore>, AppError> {
    Ok(Arc::new(connect_database(config).await?.job_store()))
}

/// Helper: schedule service on the wall clock
pub async fn create_schedule_service(config: &AppConfig) -> Result<ScheduleService, AppError> {
    let store = create_job_store(config).await?;
    Ok(ScheduleService::new(store, Arc::new(SystemClock)))
}
