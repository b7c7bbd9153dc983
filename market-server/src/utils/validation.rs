//! Input validation helpers
//!
//! Centralized text length constants and validation functions.
//! Limits mirror the request validation the marketplace enforces at the
//! HTTP boundary, before anything reaches the workflow engine.

use crate::utils::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: product title, user name
pub const MAX_NAME_LEN: usize = 200;

/// Product descriptions, special instructions
pub const MAX_TEXT_LEN: usize = 2000;

/// Short identifiers: phone numbers
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Passwords (before hashing)
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Delivery addresses
pub const MAX_ADDRESS_LEN: usize = 500;
pub const MIN_ADDRESS_LEN: usize = 10;

/// Image URL references
pub const MAX_URL_LEN: usize = 2048;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate a delivery address (trimmed, bounded, at least 10 chars).
pub fn validate_delivery_address(value: &str) -> Result<(), AppError> {
    let trimmed = value.trim();
    if trimmed.len() < MIN_ADDRESS_LEN {
        return Err(AppError::validation(format!(
            "delivery_address must be at least {MIN_ADDRESS_LEN} characters"
        )));
    }
    if trimmed.len() > MAX_ADDRESS_LEN {
        return Err(AppError::validation(format!(
            "delivery_address is too long ({} chars, max {MAX_ADDRESS_LEN})",
            trimmed.len()
        )));
    }
    Ok(())
}

/// Minimal email shape check. Uniqueness is enforced by the database.
pub fn validate_email(value: &str) -> Result<(), AppError> {
    let trimmed = value.trim();
    if trimmed.len() > MAX_EMAIL_LEN {
        return Err(AppError::validation("email is too long".to_string()));
    }
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(AppError::validation("email is not valid".to_string()));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(AppError::validation("email is not valid".to_string()));
    }
    Ok(())
}
