//! Context identifying the principal behind a request.

use serde::{Deserialize, Serialize};

use postdate_core::types::OwnerId;

/// Context for the current caller.
///
/// Authentication happens upstream; by the time a context exists the
/// owner has been established and every operation is scoped to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RequestContext {
    /// The owner acting on its jobs.
    pub owner_id: OwnerId,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(owner_id: OwnerId) -> Self {
        Self { owner_id }
    }
}
