//! Outbound delivery capability.
//!
//! The dispatcher treats the mail provider as an opaque
//! `send(recipient, subject, body)` call. Concrete providers live in
//! `postdate-worker`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Why a send did not succeed. Every variant ends the job as `Failed`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
    /// The provider answered and refused the message.
    #[error("Provider rejected message: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered garbage.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The provider did not answer within the send timeout.
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
}

/// The opaque mail-sending capability.
#[async_trait]
pub trait MessageSender: Send + Sync + std::fmt::Debug {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}
