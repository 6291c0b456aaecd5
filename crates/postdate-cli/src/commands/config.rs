//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use postdate_core::config::AppConfig;
use postdate_core::error::AppError;
use postdate_database::connection::redact_url;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration with secrets masked
    Show,
    /// Validate configuration files and environment overrides
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = redacted(super::load_config(config_path, env)?);
            match format {
                OutputFormat::Json => output::print_json(&config),
                OutputFormat::Table => println!("{:#?}", config),
            }
        }
        ConfigCommand::Validate => match super::load_config(config_path, env) {
            Ok(config) => {
                output::print_success(&format!(
                    "Configuration '{}' (env: {}) is valid",
                    config_path, env
                ));
                output::print_kv("Database", &redact_url(&config.database.url));
                output::print_kv("Provider", &format!("{:?}", config.sender.provider));
                output::print_kv("Batch Size", &config.dispatcher.batch_size.to_string());
                output::print_kv(
                    "Lease Timeout",
                    &format!("{}s", config.dispatcher.lease_timeout_seconds),
                );
                output::print_kv("Schedule", &config.dispatcher.schedule);
                if config.trigger.enforce && config.trigger.secret.is_none() {
                    output::print_warning("trigger.secret is unset; external triggers will be rejected");
                }
                if !config.trigger.enforce {
                    output::print_warning("trigger.enforce is off; any caller may trigger dispatch");
                }
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}

/// Mask credentials before display.
fn redacted(mut config: AppConfig) -> AppConfig {
    config.database.url = redact_url(&config.database.url);
    if !config.sender.api_token.is_empty() {
        config.sender.api_token = "****".to_string();
    }
    if config.trigger.secret.is_some() {
        config.trigger.secret = Some("****".to_string());
    }
    config
}
