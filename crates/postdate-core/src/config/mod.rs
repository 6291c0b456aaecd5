//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod dispatcher;
pub mod logging;
pub mod sender;
pub mod trigger;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::database::DatabaseConfig;
pub use self::dispatcher::DispatcherConfig;
pub use self::logging::LoggingConfig;
pub use self::sender::{SenderConfig, SenderProvider};
pub use self::trigger::TriggerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Dispatch pass settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Outbound mail provider settings.
    #[serde(default)]
    pub sender: SenderConfig,
    /// Trigger authorization settings.
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config_path`, an environment-specific overlay
    /// `config/{env}.toml`, and environment variables prefixed with
    /// `POSTDATE__` (e.g. `POSTDATE__DISPATCHER__BATCH_SIZE=50`).
    pub fn load(config_path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("POSTDATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field rules that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        self.dispatcher.validate().map_err(|e| {
            AppError::with_source(
                crate::error::ErrorKind::Configuration,
                format!("Invalid dispatcher configuration: {e}"),
                e,
            )
        })?;

        let statement = self.database.statement_timeout_seconds;
        if statement == 0 || statement >= self.dispatcher.lease_timeout_seconds {
            return Err(AppError::configuration(
                "database.statement_timeout_seconds must be between 1 and \
                 dispatcher.lease_timeout_seconds",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let config = AppConfig::load("does/not/exist", "nowhere").expect("defaults load");
        assert_eq!(config.dispatcher.batch_size, 100);
        assert_eq!(config.sender.provider, SenderProvider::Log);
        assert!(config.trigger.enforce);
        assert!(config.trigger.secret.is_none());
    }

    #[test]
    fn test_statement_timeout_must_fit_inside_lease() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.database.statement_timeout_seconds = config.dispatcher.lease_timeout_seconds;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);

        config.database.statement_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_enforces_trigger_secret() {
        assert!(AppConfig::default().trigger.enforce);
    }

    #[test]
    fn test_invalid_dispatcher_section_is_rejected() {
        let mut config = AppConfig::default();
        config.dispatcher.send_timeout_seconds = config.dispatcher.lease_timeout_seconds + 1;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }
}
