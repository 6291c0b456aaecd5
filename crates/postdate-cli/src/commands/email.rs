//! Owner-scoped message commands.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use postdate_core::error::AppError;
use postdate_core::types::{JobId, OwnerId};
use postdate_entity::job::{Job, JobStatus};
use postdate_service::{RequestContext, ScheduleRequest};

/// Arguments for `schedule`
#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Owner the message is scheduled for
    #[arg(long)]
    pub owner: OwnerId,
    /// Recipient address
    #[arg(long)]
    pub to: String,
    /// Subject line
    #[arg(long)]
    pub subject: String,
    /// Plain-text body
    #[arg(long, conflicts_with = "body_file", required_unless_present = "body_file")]
    pub body: Option<String>,
    /// Read the body from a file
    #[arg(long)]
    pub body_file: Option<PathBuf>,
    /// Delivery time, RFC 3339 (e.g. 2025-01-31T09:00:00Z)
    #[arg(long, conflicts_with = "in_minutes", required_unless_present = "in_minutes")]
    pub at: Option<DateTime<Utc>>,
    /// Deliver this many minutes from now
    #[arg(long)]
    pub in_minutes: Option<i64>,
}

/// Arguments for `list`
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Owner whose messages are listed
    #[arg(long)]
    pub owner: OwnerId,
    /// Page size (1-100)
    #[arg(short, long, default_value_t = 50)]
    pub limit: u32,
    /// Cursor returned by a previous page
    #[arg(long)]
    pub cursor: Option<JobId>,
}

/// Arguments for `show`
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Owner of the message
    #[arg(long)]
    pub owner: OwnerId,
    /// Message id
    pub id: JobId,
}

/// Arguments for `cancel`
#[derive(Debug, Args)]
pub struct CancelArgs {
    /// Owner of the message
    #[arg(long)]
    pub owner: OwnerId,
    /// Message id
    pub id: JobId,
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for `stats`
#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Owner whose messages are counted
    #[arg(long)]
    pub owner: OwnerId,
}

/// Message display row for table output
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    /// Message ID
    id: String,
    /// Recipient
    to: String,
    /// Subject
    subject: String,
    /// Scheduled for
    scheduled_for: String,
    /// Status
    status: String,
    /// Sent at
    sent_at: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            to: job.recipient.clone(),
            subject: truncate(&job.subject, 40),
            scheduled_for: job.scheduled_for.to_rfc3339(),
            status: job.status.to_string(),
            sent_at: job.sent_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        }
    }
}

/// Paged listing for JSON output
#[derive(Debug, Serialize)]
struct ListOutput<'a> {
    items: &'a [Job],
    next_cursor: Option<JobId>,
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars - 1).collect();
        cut.push('…');
        cut
    }
}

fn print_job(job: &Job, format: OutputFormat) {
    match format {
        OutputFormat::Json => output::print_json(job),
        OutputFormat::Table => {
            output::print_kv("ID", &job.id.to_string());
            output::print_kv("Owner", &job.owner_id.to_string());
            output::print_kv("To", &job.recipient);
            output::print_kv("Subject", &job.subject);
            output::print_kv("Scheduled For", &job.scheduled_for.to_rfc3339());
            output::print_kv("Status", job.status.as_str());
            output::print_kv("Created At", &job.created_at.to_rfc3339());
            output::print_kv("Updated At", &job.updated_at.to_rfc3339());
            if let Some(sent_at) = job.sent_at {
                output::print_kv("Sent At", &sent_at.to_rfc3339());
            }
            if let Some(error) = &job.error_info {
                output::print_kv("Error", error);
            }
            println!();
            println!("{}", job.body);
        }
    }
}

/// Execute `schedule`
pub async fn schedule(
    args: &ScheduleArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let body = match (&args.body, &args.body_file) {
        (Some(body), _) => body.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::validation(format!("Failed to read '{}': {}", path.display(), e))
        })?,
        (None, None) => return Err(AppError::validation("--body or --body-file is required")),
    };
    let scheduled_for = match (args.at, args.in_minutes) {
        (Some(at), _) => at,
        (None, Some(minutes)) => Utc::now() + Duration::minutes(minutes),
        (None, None) => return Err(AppError::validation("--at or --in-minutes is required")),
    };

    let config = super::load_config(config_path, env)?;
    let service = super::create_schedule_service(&config).await?;
    let job = service
        .schedule(
            &RequestContext::new(args.owner),
            ScheduleRequest {
                recipient: args.to.clone(),
                subject: args.subject.clone(),
                body,
                scheduled_for,
            },
        )
        .await?;

    match format {
        OutputFormat::Json => output::print_json(&job),
        OutputFormat::Table => output::print_success(&format!(
            "Scheduled {} for {}",
            job.id,
            job.scheduled_for.to_rfc3339()
        )),
    }
    Ok(())
}

/// Execute `list`
pub async fn list(
    args: &ListArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path, env)?;
    let service = super::create_schedule_service(&config).await?;
    let page = service
        .list(&RequestContext::new(args.owner), args.limit, args.cursor)
        .await?;

    match format {
        OutputFormat::Json => output::print_json(&ListOutput {
            items: &page.items,
            next_cursor: page.next_cursor,
        }),
        OutputFormat::Table => {
            let rows: Vec<JobRow> = page.items.iter().map(JobRow::from).collect();
            output::print_list(&rows, format);
            if let Some(cursor) = page.next_cursor {
                println!("Next page: --cursor {}", cursor);
            }
        }
    }
    Ok(())
}

/// Execute `show`
pub async fn show(
    args: &ShowArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path, env)?;
    let service = super::create_schedule_service(&config).await?;
    let job = service.get(&RequestContext::new(args.owner), args.id).await?;
    print_job(&job, format);
    Ok(())
}

/// Execute `cancel`
pub async fn cancel(
    args: &CancelArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    if !args.yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!("Cancel message {}?", args.id))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

        if !confirm {
            println!("Aborted.");
            return Ok(());
        }
    }

    let config = super::load_config(config_path, env)?;
    let service = super::create_schedule_service(&config).await?;
    let job = service.cancel(&RequestContext::new(args.owner), args.id).await?;

    match format {
        OutputFormat::Json => output::print_json(&job),
        OutputFormat::Table => output::print_success(&format!("Cancelled {}", job.id)),
    }
    Ok(())
}

/// Execute `stats`
pub async fn stats(
    args: &StatsArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path, env)?;
    let service = super::create_schedule_service(&config).await?;
    let counts = service.stats(&RequestContext::new(args.owner)).await?;

    match format {
        OutputFormat::Json => output::print_json(&counts),
        OutputFormat::Table => {
            println!("Messages for {}:", args.owner);
            for status in JobStatus::ALL {
                output::print_kv(status.as_str(), &counts.get(status).to_string());
            }
            output::print_kv("total", &counts.total().to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 40), "short");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }
}
