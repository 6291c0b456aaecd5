//! Scheduling: submit, inspect, and cancel delayed messages.

pub mod service;

pub use service::{ScheduleRequest, ScheduleService};
