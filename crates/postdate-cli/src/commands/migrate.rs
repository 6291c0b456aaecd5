//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use postdate_core::error::AppError;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config_path: &str, env: &str) -> Result<(), AppError> {
    let config = super::load_config(config_path, env)?;
    let database = super::connect_database(&config).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            database.migrate().await?;
            output::print_success("All migrations applied successfully.");
        }
    }

    Ok(())
}
