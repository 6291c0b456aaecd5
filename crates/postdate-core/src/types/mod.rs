//! Core type definitions used across the Postdate workspace.

pub mod id;
pub mod pagination;

pub use id::*;
pub use pagination::{CursorPage, CursorRequest};
