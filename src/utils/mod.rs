//! Utilities
//!
//! Shared utility modules for error handling.

pub mod error;

pub use error::{AppError, AppResult};
