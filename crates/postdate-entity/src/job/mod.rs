//! Scheduled delivery job entities.

pub mod model;
pub mod stats;
pub mod status;

pub use model::{Job, NewJob};
pub use stats::StatusCounts;
pub use status::JobStatus;
