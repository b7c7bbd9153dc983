//! Order Model
//!
//! Orders are created atomically at checkout and only ever advance through
//! the fulfillment state machine after that. Line items are embedded snapshots:
//! title, unit price and measuring unit are copied from the product at order
//! time and never recomputed from live product data.

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;
use crate::db::models::MeasuringUnit;

/// Order ID type
pub type OrderId = RecordId;

// =============================================================================
// Order status state machine
// =============================================================================

/// Fulfillment status
///
/// ```text
/// placed → accepted → packed → dispatched → delivered
///    └────────┴──→ cancelled
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Accepted,
    Packed,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Packed => "packed",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "placed" => Some(OrderStatus::Placed),
            "accepted" => Some(OrderStatus::Accepted),
            "packed" => Some(OrderStatus::Packed),
            "dispatched" => Some(OrderStatus::Dispatched),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The single legal forward successor, if any
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Placed => Some(OrderStatus::Accepted),
            OrderStatus::Accepted => Some(OrderStatus::Packed),
            OrderStatus::Packed => Some(OrderStatus::Dispatched),
            OrderStatus::Dispatched => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// Whether a transition from `self` to `target` is legal.
    ///
    /// Forward transitions move exactly one step; `cancelled` is reachable
    /// from `placed` and `accepted` only.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if target == OrderStatus::Cancelled {
            return matches!(self, OrderStatus::Placed | OrderStatus::Accepted);
        }
        self.next() == Some(target)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// Embedded order line item (snapshot at order time)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(with = "serde_helpers::record_id")]
    pub product: RecordId,
    pub title: String,
    pub qty: i64,
    pub unit_price: f64,
    pub measuring_unit: MeasuringUnit,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<OrderId>,
    #[serde(with = "serde_helpers::record_id")]
    pub consumer: RecordId,
    /// Single farmer per order; all line items belong to this farmer
    #[serde(with = "serde_helpers::record_id")]
    pub farmer: RecordId,
    pub items: Vec<OrderItem>,
    /// Σ(qty × unit_price), computed once at creation
    pub subtotal: f64,
    pub delivery_address: String,
    pub phone: String,
    #[serde(default)]
    pub special_instructions: Option<String>,
    pub status: OrderStatus,
    /// Epoch millis
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}
