//! Externally invoked dispatch triggers.
//!
//! The in-process cron trigger calls [`Dispatcher::run_once`] directly.
//! Anything arriving from outside the process (an operator, a platform
//! cron hitting an endpoint) goes through [`DispatchTrigger`], which
//! checks a shared secret before the store is touched.

use std::sync::Arc;

use tracing;

use postdate_core::config::TriggerConfig;
use postdate_core::error::AppError;

use crate::dispatcher::{Dispatcher, RunSummary};

const BEARER_PREFIX: &str = "Bearer ";

/// Checks `Authorization: Bearer <secret>` values.
#[derive(Clone)]
pub struct TriggerAuthorizer {
    secret: Option<String>,
    enforce: bool,
}

impl std::fmt::Debug for TriggerAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerAuthorizer")
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("enforce", &self.enforce)
            .finish()
    }
}

impl TriggerAuthorizer {
    /// Create an authorizer.
    pub fn new(secret: Option<String>, enforce: bool) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            enforce,
        }
    }

    /// Create an authorizer from the `trigger` config section.
    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(config.secret.clone(), config.enforce)
    }

    /// Accept or reject an `Authorization` header value.
    ///
    /// With enforcement off every caller is accepted. With enforcement on
    /// and no secret configured every caller is rejected.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<(), AppError> {
        if !self.enforce {
            return Ok(());
        }

        let Some(secret) = self.secret.as_deref() else {
            return Err(AppError::authentication("Trigger secret is not configured"));
        };

        let presented = authorization
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .ok_or_else(|| AppError::authentication("Missing bearer token"))?;

        if constant_time_eq(presented.as_bytes(), secret.as_bytes()) {
            Ok(())
        } else {
            Err(AppError::authentication("Invalid trigger token"))
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// An authorized entry point to [`Dispatcher::run_once`].
#[derive(Debug, Clone)]
pub struct DispatchTrigger {
    dispatcher: Arc<Dispatcher>,
    authorizer: TriggerAuthorizer,
}

impl DispatchTrigger {
    /// Create a trigger.
    pub fn new(dispatcher: Arc<Dispatcher>, authorizer: TriggerAuthorizer) -> Self {
        Self {
            dispatcher,
            authorizer,
        }
    }

    /// Authorize the caller, then run one pass.
    pub async fn invoke(&self, authorization: Option<&str>) -> Result<RunSummary, AppError> {
        if let Err(e) = self.authorizer.authorize(authorization) {
            tracing::warn!(reason = %e.message, "Rejected dispatch trigger");
            return Err(e);
        }
        self.dispatcher.run_once().await
    }
}
