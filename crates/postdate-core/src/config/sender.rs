//! Outbound mail provider configuration.

use serde::{Deserialize, Serialize};

/// Which [`MessageSender`](crate::traits::MessageSender) the worker wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderProvider {
    /// Postmark HTTP API.
    Postmark,
    /// Log the message and report success. For development only.
    Log,
}

/// Mail provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Active provider.
    #[serde(default = "default_provider")]
    pub provider: SenderProvider,
    /// `From` address on every outbound message.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Provider API token.
    #[serde(default)]
    pub api_token: String,
    /// Provider API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Postmark message stream.
    #[serde(default = "default_message_stream")]
    pub message_stream: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            from_address: default_from_address(),
            api_token: String::new(),
            api_url: default_api_url(),
            message_stream: default_message_stream(),
        }
    }
}

fn default_provider() -> SenderProvider {
    SenderProvider::Log
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_api_url() -> String {
    "https://api.postmarkapp.com".to_string()
}

fn default_message_stream() -> String {
    "outbound".to_string()
}
