//! # postdate-service
//!
//! Owner-facing use cases on top of the job store: schedule, list, show,
//! cancel, and per-status counts.
//!
//! Services follow constructor injection. The store and the clock are
//! provided at construction time via `Arc` references.

pub mod context;
pub mod schedule;

pub use context::RequestContext;
pub use schedule::{ScheduleRequest, ScheduleService};
