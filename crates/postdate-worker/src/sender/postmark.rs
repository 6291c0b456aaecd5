//! Postmark HTTP API sender.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use postdate_core::config::SenderConfig;
use postdate_core::error::AppError;
use postdate_core::traits::{MessageSender, OutboundMessage, SendError};

const TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// Request body of `POST /email`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

/// Response body of `POST /email`. Postmark reports rejections with a
/// non-zero `ErrorCode`, sometimes alongside a 2xx status.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EmailResponse {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
}

/// Sends plain-text messages through Postmark.
#[derive(Clone)]
pub struct PostmarkSender {
    client: Client,
    endpoint: String,
    api_token: String,
    from_address: String,
    message_stream: String,
}

impl std::fmt::Debug for PostmarkSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostmarkSender")
            .field("endpoint", &self.endpoint)
            .field("from_address", &self.from_address)
            .field("message_stream", &self.message_stream)
            .finish()
    }
}

impl PostmarkSender {
    /// Create a sender from the `sender` config section.
    pub fn from_config(config: &SenderConfig) -> Result<Self, AppError> {
        if config.api_token.trim().is_empty() {
            return Err(AppError::configuration(
                "sender.api_token is required for the postmark provider",
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("postdate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/email", config.api_url.trim_end_matches('/')),
            api_token: config.api_token.clone(),
            from_address: config.from_address.clone(),
            message_stream: config.message_stream.clone(),
        })
    }

    fn payload<'a>(&'a self, message: &'a OutboundMessage) -> EmailPayload<'a> {
        EmailPayload {
            from: &self.from_address,
            to: &message.recipient,
            subject: &message.subject,
            text_body: &message.body,
            message_stream: &self.message_stream,
        }
    }
}

#[async_trait]
impl MessageSender for PostmarkSender {
    fn name(&self) -> &str {
        "postmark"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(TOKEN_HEADER, &self.api_token)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;
        let body: EmailResponse = serde_json::from_str(&text).unwrap_or_default();

        if !status.is_success() {
            let detail = if body.message.is_empty() {
                text
            } else {
                body.message
            };
            return Err(SendError::Rejected(format!(
                "HTTP {status}: {detail} (code {})",
                body.error_code
            )));
        }
        if body.error_code != 0 {
            return Err(SendError::Rejected(format!(
                "{} (code {})",
                body.message, body.error_code
            )));
        }
        Ok(())
    }
}
