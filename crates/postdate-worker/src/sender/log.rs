//! Dry-run sender for development.

use async_trait::async_trait;

use postdate_core::traits::{MessageSender, OutboundMessage, SendError};

/// Logs every message at `info` and reports success. Nothing leaves the
/// process.
#[derive(Debug, Clone)]
pub struct LogSender {
    from_address: String,
}

impl LogSender {
    /// Create a log sender.
    pub fn new(from_address: String) -> Self {
        Self { from_address }
    }
}

#[async_trait]
impl MessageSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        tracing::info!(
            from = %self.from_address,
            to = %message.recipient,
            subject = %message.subject,
            body_chars = message.body.chars().count(),
            "Dry-run send"
        );
        Ok(())
    }
}
