//! Order Workflow Errors

use thiserror::Error;

use crate::db::models::OrderStatus;
use crate::db::repository::RepoError;
use crate::utils::AppError;

/// Business errors from the order workflow engine.
///
/// Business violations name the offending item; infrastructure failures
/// carry no business detail and are mapped to generic server errors.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity for product {product}: {reason}")]
    InvalidQuantity { product: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Product {0} not found")]
    ProductNotFound(String),

    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("All items in an order must come from the same farmer")]
    MixedFarmerCart,

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Illegal status transition from '{from}' to '{to}'")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Database error: {0}")]
    Database(String),
}

impl From<RepoError> for OrderError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => OrderError::OrderNotFound(msg),
            RepoError::Validation(msg) => OrderError::Validation(msg),
            RepoError::InsufficientStock(msg) => OrderError::InsufficientStock(msg),
            RepoError::Duplicate(msg) | RepoError::Conflict(msg) => OrderError::Validation(msg),
            RepoError::Timeout(msg) | RepoError::Database(msg) => OrderError::Database(msg),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart => AppError::EmptyCart,
            OrderError::InvalidQuantity { .. } => AppError::InvalidQuantity(err.to_string()),
            OrderError::Validation(msg) => AppError::Validation(msg),
            OrderError::Forbidden(msg) => AppError::Forbidden(msg),
            OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            OrderError::MixedFarmerCart => AppError::MixedFarmerCart(err.to_string()),
            OrderError::InsufficientStock(msg) => AppError::InsufficientStock(msg),
            OrderError::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            OrderError::Database(msg) => AppError::Database(msg),
        }
    }
}
