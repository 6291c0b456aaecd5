//! # postdate-database
//!
//! The [`JobStore`] contract and its two implementations: PostgreSQL via
//! `sqlx` for production, and an in-process store with identical
//! semantics for tests and local runs.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::JobDatabase;
pub use memory::InMemoryJobStore;
pub use repositories::PgJobStore;
pub use store::JobStore;
