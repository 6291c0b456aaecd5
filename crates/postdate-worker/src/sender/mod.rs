//! Concrete [`MessageSender`] implementations.

pub mod log;
pub mod postmark;

use std::sync::Arc;

use postdate_core::config::{SenderConfig, SenderProvider};
use postdate_core::error::AppError;
use postdate_core::traits::MessageSender;

pub use self::log::LogSender;
pub use self::postmark::PostmarkSender;

/// Build the sender selected by `sender.provider`.
pub fn build_sender(config: &SenderConfig) -> Result<Arc<dyn MessageSender>, AppError> {
    let sender: Arc<dyn MessageSender> = match config.provider {
        SenderProvider::Postmark => Arc::new(PostmarkSender::from_config(config)?),
        SenderProvider::Log => Arc::new(LogSender::new(config.from_address.clone())),
    };
    tracing::info!(provider = sender.name(), "Mail provider configured");
    Ok(sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use postdate_core::error::ErrorKind;

    #[test]
    fn test_build_log_sender_by_default() {
        let sender = build_sender(&SenderConfig::default()).unwrap();
        assert_eq!(sender.name(), "log");
    }

    #[test]
    fn test_postmark_requires_token() {
        let config = SenderConfig {
            provider: SenderProvider::Postmark,
            ..Default::default()
        };
        let err = build_sender(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
