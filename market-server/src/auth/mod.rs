//! Authentication module
//!
//! JWT issuance/validation and the request-side plumbing:
//! - [`JwtService`] — token service
//! - [`CurrentUser`] — authenticated caller context (also an extractor)
//! - [`require_auth`] — middleware for protected sub-routers

pub mod extractor;
pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::require_auth;
