//! Order Workflow Engine
//!
//! Cart validation, atomic placement and the fulfillment state machine.
//! The engine holds no mutable state of its own; every stock or status
//! effect is a conditional write in the repositories, so any number of
//! stateless replicas can run this code concurrently.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use surrealdb::RecordId;

use super::error::OrderError;
use crate::db::models::{Order, OrderItem, OrderStatus, Product, Role};
use crate::db::repository::{NewOrder, OrderRepository, ProductRepository, RepoError};
use crate::utils::validation::validate_delivery_address;

// =============================================================================
// Request types
// =============================================================================

/// One cart line as submitted by the consumer
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub qty: i64,
}

/// Checkout request body
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<CartItem>,
    pub delivery_address: String,
    pub phone: String,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

// =============================================================================
// Workflow engine
// =============================================================================

pub struct OrderWorkflow {
    products: ProductRepository,
    orders: OrderRepository,
}

impl OrderWorkflow {
    pub fn new(products: ProductRepository, orders: OrderRepository) -> Self {
        Self { products, orders }
    }

    /// Place an order from a cart.
    ///
    /// Validation happens up front against a read snapshot (missing product,
    /// mixed farmers, quantity bounds); the stock reservation itself is a
    /// single all-or-nothing transaction in the repository, so a race that
    /// invalidates the snapshot surfaces as `InsufficientStock` and leaves
    /// no partial stock effect behind.
    pub async fn place_order(
        &self,
        consumer: RecordId,
        request: PlaceOrderRequest,
    ) -> Result<Order, OrderError> {
        if request.items.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        validate_delivery_address(&request.delivery_address)
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        if request.phone.trim().is_empty() {
            return Err(OrderError::Validation("phone is required".into()));
        }

        // Resolve every product; one missing rejects the whole cart.
        let mut resolved: Vec<(Product, i64)> = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if item.qty < 1 {
                return Err(OrderError::InvalidQuantity {
                    product: item.product_id.clone(),
                    reason: "qty must be at least 1".into(),
                });
            }
            let product = self
                .products
                .find_by_id(&item.product_id)
                .await
                .map_err(OrderError::from)?
                .ok_or_else(|| OrderError::ProductNotFound(item.product_id.clone()))?;
            resolved.push((product, item.qty));
        }

        // Single farmer per order; a mixed cart is rejected outright rather
        // than silently split into several orders.
        let farmer = resolved[0].0.farmer.clone();
        if resolved.iter().any(|(p, _)| p.farmer != farmer) {
            return Err(OrderError::MixedFarmerCart);
        }

        // Quantity bounds per line, then availability per product (the same
        // product may appear on several lines).
        let mut demanded: HashMap<String, i64> = HashMap::new();
        for (product, qty) in &resolved {
            if *qty < product.min_order_qty {
                return Err(OrderError::InvalidQuantity {
                    product: product.title.clone(),
                    reason: format!("minimum order quantity is {}", product.min_order_qty),
                });
            }
            let key = product
                .id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default();
            *demanded.entry(key).or_insert(0) += qty;
        }
        for (product, _) in &resolved {
            let key = product
                .id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default();
            if demanded.get(&key).copied().unwrap_or(0) > product.quantity_available {
                return Err(OrderError::InvalidQuantity {
                    product: product.title.clone(),
                    reason: format!("only {} available", product.quantity_available),
                });
            }
        }

        let items: Vec<OrderItem> = resolved
            .iter()
            .map(|(product, qty)| OrderItem {
                product: product
                    .id
                    .clone()
                    .unwrap_or_else(|| RecordId::from_table_key("product", "unknown")),
                title: product.title.clone(),
                qty: *qty,
                unit_price: product.price_per_unit,
                measuring_unit: product.measuring_unit,
            })
            .collect();
        let subtotal = compute_subtotal(&items)?;

        let order = self
            .orders
            .create_placed(NewOrder {
                consumer,
                farmer,
                items,
                subtotal,
                delivery_address: request.delivery_address,
                phone: request.phone,
                special_instructions: request.special_instructions,
            })
            .await
            .map_err(|err| match err {
                RepoError::InsufficientStock(msg) => OrderError::InsufficientStock(msg),
                other => OrderError::from(other),
            })?;

        tracing::info!(
            order = %order.id.as_ref().map(|id| id.to_string()).unwrap_or_default(),
            subtotal = order.subtotal,
            items = order.items.len(),
            "Order placed"
        );
        Ok(order)
    }

    /// Advance (or cancel) an order's fulfillment status.
    ///
    /// Only the order's own farmer may do this. The transition is checked
    /// against the current status, then applied as a compare-and-swap; if a
    /// concurrent update won the race, the re-read status is reported in
    /// the transition error.
    pub async fn update_status(
        &self,
        actor: &RecordId,
        actor_role: Role,
        order_id: &str,
        new_status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(OrderError::from)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;

        if actor_role != Role::Farmer {
            return Err(OrderError::Forbidden(
                "Only farmers can update order status".into(),
            ));
        }
        if &order.farmer != actor {
            return Err(OrderError::Forbidden(
                "Order belongs to another farmer".into(),
            ));
        }

        let current = order.status;
        if !current.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: current,
                to: new_status,
            });
        }

        let result = if new_status == OrderStatus::Cancelled {
            // Cancellation returns the reserved stock in the same transaction.
            self.orders
                .cancel_with_release(order_id, current, &order.items)
                .await
        } else {
            self.orders
                .update_status_checked(order_id, current, new_status)
                .await
        };

        match result {
            Ok(updated) => {
                tracing::info!(
                    order = %order_id,
                    from = %current,
                    to = %new_status,
                    "Order status updated"
                );
                Ok(updated)
            }
            Err(RepoError::Conflict(_)) => {
                // Lost the race: report the transition against what the
                // order's status actually is now.
                let now_current = self
                    .orders
                    .find_by_id(order_id)
                    .await
                    .map_err(OrderError::from)?
                    .map(|o| o.status)
                    .unwrap_or(current);
                Err(OrderError::InvalidTransition {
                    from: now_current,
                    to: new_status,
                })
            }
            Err(other) => Err(OrderError::from(other)),
        }
    }
}

// =============================================================================
// Money
// =============================================================================

/// Subtotal = Σ(qty × unit_price), computed in `Decimal` and rounded to two
/// places so float noise never reaches the stored amount.
pub fn compute_subtotal(items: &[OrderItem]) -> Result<f64, OrderError> {
    let mut total = Decimal::ZERO;
    for item in items {
        let price = Decimal::try_from(item.unit_price).map_err(|_| {
            OrderError::Validation(format!("Invalid unit price for {}", item.title))
        })?;
        total += price * Decimal::from(item.qty);
    }
    total
        .round_dp(2)
        .to_f64()
        .ok_or_else(|| OrderError::Validation("Subtotal out of range".into()))
}
