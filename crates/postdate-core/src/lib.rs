//! # postdate-core
//!
//! Core crate for Postdate. Contains configuration schemas, typed
//! identifiers, cursor pagination, the `Clock` and `MessageSender`
//! capabilities, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Postdate crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
