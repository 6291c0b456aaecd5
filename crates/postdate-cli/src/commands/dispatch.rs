//! Dispatch management commands.

use std::sync::Arc;

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use postdate_core::error::AppError;
use postdate_core::traits::SystemClock;
use postdate_worker::{DispatchTrigger, Dispatcher, TriggerAuthorizer, build_sender};

/// Arguments for dispatch commands
#[derive(Debug, Args)]
pub struct DispatchArgs {
    /// Dispatch subcommand
    #[command(subcommand)]
    pub command: DispatchCommand,
}

/// Dispatch subcommands
#[derive(Debug, Subcommand)]
pub enum DispatchCommand {
    /// Run a single dispatch pass now
    RunOnce {
        /// Trigger secret, sent as `Bearer <token>`
        #[arg(long)]
        token: Option<String>,
    },
}

/// Execute dispatch commands
pub async fn execute(
    args: &DispatchArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        DispatchCommand::RunOnce { token } => {
            let config = super::load_config(config_path, env)?;
            let authorizer = TriggerAuthorizer::from_config(&config.trigger);
            let authorization = token.as_ref().map(|t| format!("Bearer {}", t));

            // Reject before connecting to anything.
            authorizer.authorize(authorization.as_deref())?;

            let store = super::create_job_store(&config).await?;
            let sender = build_sender(&config.sender)?;
            let dispatcher =
                Dispatcher::new(store, sender, Arc::new(SystemClock), &config.dispatcher)?;
            let trigger = DispatchTrigger::new(Arc::new(dispatcher), authorizer);

            let summary = trigger
                .invoke(authorization.as_deref())
                .await
                .inspect_err(|e| {
                    if e.is_retryable() {
                        output::print_warning(
                            "Job store unavailable; no job was claimed, run again later",
                        );
                    }
                })?;

            match format {
                OutputFormat::Json => output::print_json(&serde_json::json!({
                    "success": true,
                    "timestamp": summary.timestamp,
                    "results": summary,
                })),
                OutputFormat::Table => {
                    output::print_success("Dispatch pass complete");
                    output::print_kv("Timestamp", &summary.timestamp.to_rfc3339());
                    output::print_kv("Reclaimed", &summary.reclaimed.to_string());
                    output::print_kv("Processed", &summary.processed.to_string());
                    output::print_kv("Sent", &summary.sent.to_string());
                    output::print_kv("Failed", &summary.failed.to_string());
                    output::print_kv("Skipped", &summary.skipped.to_string());
                    let unrecorded =
                        summary.processed - summary.sent - summary.failed - summary.skipped;
                    if unrecorded > 0 {
                        output::print_warning(&format!(
                            "{} outcome(s) could not be recorded; see logs",
                            unrecorded
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}
