//! Trigger authorization configuration.

use serde::{Deserialize, Serialize};

/// Shared-secret settings for on-demand dispatch triggers.
///
/// External callers must present `Bearer <secret>`. The in-process cron
/// trigger is trusted and never consults this section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// The shared secret. An unset secret rejects every external caller
    /// while `enforce` is on.
    #[serde(default)]
    pub secret: Option<String>,
    /// Set to `false` in development to accept any caller.
    #[serde(default = "default_enforce")]
    pub enforce: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            secret: None,
            enforce: default_enforce(),
        }
    }
}

fn default_enforce() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enforces_authorization() {
        let config = TriggerConfig::default();
        assert!(config.enforce);
        assert!(config.secret.is_none());
    }

    #[test]
    fn test_empty_section_enforces_authorization() {
        let config: TriggerConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enforce);
    }
}
