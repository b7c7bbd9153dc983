//! Order Workflow Module
//!
//! The placement protocol and fulfillment state machine. The transition
//! rules themselves live on [`crate::db::models::OrderStatus`]; this module
//! enforces them against live orders.

pub mod error;
pub mod workflow;

pub use error::OrderError;
pub use workflow::{CartItem, OrderWorkflow, PlaceOrderRequest, compute_subtotal};
