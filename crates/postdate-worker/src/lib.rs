//! Dispatch machinery for Postdate.
//!
//! This crate provides:
//! - A dispatcher that claims due jobs, sends them, and records outcomes
//! - Lease recovery for jobs abandoned by a crashed dispatcher
//! - Authorization for externally invoked triggers
//! - A cron scheduler that runs the dispatcher periodically
//! - Concrete mail providers

pub mod dispatcher;
pub mod lease;
pub mod scheduler;
pub mod sender;
pub mod trigger;

pub use dispatcher::{Dispatcher, RunSummary};
pub use lease::LeaseRecovery;
pub use scheduler::CronScheduler;
pub use sender::build_sender;
pub use trigger::{DispatchTrigger, TriggerAuthorizer};
