//! Utilities - common helpers and types
//!
//! - [`AppError`] - application error type
//! - [`AppResponse`] - API response envelope
//! - logging, validation, pagination helpers

pub mod error;
pub mod logger;
pub mod result;
pub mod types;
pub mod validation;

pub use error::{AppError, AppResponse};
pub use result::AppResult;
pub use types::{Paginated, PaginationParams};
