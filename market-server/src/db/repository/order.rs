//! Order Repository
//!
//! Order creation runs as a single database transaction: every line item's
//! stock is reserved with a conditional decrement, and one shortfall rolls
//! the whole checkout back. Status changes are compare-and-swap updates so
//! two concurrent writers can never both advance the same order.

use std::time::Duration;

use surrealdb::RecordId;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoError, RepoResult, make_record_id};
use crate::db::models::{Order, OrderItem, OrderStatus};

const ORDER_TABLE: &str = "order";

/// Fields captured at checkout, before the order record exists
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub consumer: RecordId,
    pub farmer: RecordId,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub delivery_address: String,
    pub phone: String,
    pub special_instructions: Option<String>,
}

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub fn with_timeout(db: Surreal<Db>, timeout: Duration) -> Self {
        Self {
            base: BaseRepository::with_timeout(db, timeout),
        }
    }

    /// Reserve stock for every line item and create the order, atomically.
    ///
    /// Each item gets a conditional decrement inside one transaction; a
    /// THROW on any shortfall aborts it, so either all reservations and the
    /// order record commit together or nothing does. The thrown message
    /// carries the offending product id, which we surface in the error.
    pub async fn create_placed(&self, new_order: NewOrder) -> RepoResult<Order> {
        if new_order.items.is_empty() {
            return Err(RepoError::Validation("Order has no items".into()));
        }

        // Pre-generated id: the order is re-read by id after commit instead
        // of relying on statement result positions inside the transaction.
        let order_key = uuid::Uuid::new_v4().simple().to_string();
        let order_id = RecordId::from_table_key(ORDER_TABLE, order_key.clone());

        let mut query_str = String::from("BEGIN TRANSACTION;\n");
        for (i, _) in new_order.items.iter().enumerate() {
            query_str.push_str(&format!(
                "LET $r{i} = (UPDATE $p{i} SET quantity_available -= $q{i}, updated_at = $now \
                     WHERE quantity_available >= $q{i} RETURN AFTER);\n\
                 IF array::len($r{i}) == 0 {{ THROW 'insufficient_stock:' + <string>$p{i} }};\n"
            ));
        }
        query_str.push_str(
            "CREATE $order_id SET \
                consumer = $consumer, \
                farmer = $farmer, \
                items = $items, \
                subtotal = $subtotal, \
                delivery_address = $delivery_address, \
                phone = $phone, \
                special_instructions = $special_instructions, \
                status = 'placed', \
                created_at = $now, \
                updated_at = $now;\n\
             COMMIT TRANSACTION;",
        );

        self.base
            .bounded("order.create_placed", async {
                let mut query = self
                    .base
                    .db()
                    .query(&query_str)
                    .bind(("order_id", order_id))
                    .bind(("consumer", new_order.consumer))
                    .bind(("farmer", new_order.farmer))
                    .bind(("items", new_order.items.clone()))
                    .bind(("subtotal", new_order.subtotal))
                    .bind(("delivery_address", new_order.delivery_address))
                    .bind(("phone", new_order.phone))
                    .bind(("special_instructions", new_order.special_instructions))
                    .bind(("now", chrono::Utc::now().timestamp_millis()));

                for (i, item) in new_order.items.iter().enumerate() {
                    query = query
                        .bind((format!("p{i}"), item.product.clone()))
                        .bind((format!("q{i}"), item.qty));
                }

                let result = query.await?;
                result.check().map_err(map_checkout_error)?;

                let created: Option<Order> = self
                    .base
                    .db()
                    .select((ORDER_TABLE, order_key.clone()))
                    .await?;
                created.ok_or_else(|| RepoError::Database("Order vanished after commit".into()))
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Order>> {
        let record = make_record_id(ORDER_TABLE, id);
        self.base
            .bounded("order.find_by_id", async {
                let order: Option<Order> = self
                    .base
                    .db()
                    .select((ORDER_TABLE, record.key().to_string()))
                    .await?;
                Ok(order)
            })
            .await
    }

    /// Consumer order history, newest first
    pub async fn find_by_consumer(&self, consumer: &RecordId) -> RepoResult<Vec<Order>> {
        self.base
            .bounded("order.find_by_consumer", async {
                let orders: Vec<Order> = self
                    .base
                    .db()
                    .query("SELECT * FROM order WHERE consumer = $consumer ORDER BY created_at DESC")
                    .bind(("consumer", consumer.clone()))
                    .await?
                    .take(0)?;
                Ok(orders)
            })
            .await
    }

    /// Incoming orders for a farmer, newest first
    pub async fn find_by_farmer(&self, farmer: &RecordId) -> RepoResult<Vec<Order>> {
        self.base
            .bounded("order.find_by_farmer", async {
                let orders: Vec<Order> = self
                    .base
                    .db()
                    .query("SELECT * FROM order WHERE farmer = $farmer ORDER BY created_at DESC")
                    .bind(("farmer", farmer.clone()))
                    .await?
                    .take(0)?;
                Ok(orders)
            })
            .await
    }

    /// Compare-and-swap status update: advance only if the stored status is
    /// still `expected`. An empty result means another writer got there
    /// first (or the order is gone), reported as a conflict.
    pub async fn update_status_checked(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepoResult<Order> {
        let record = make_record_id(ORDER_TABLE, order_id);
        self.base
            .bounded("order.update_status_checked", async {
                let mut result = self
                    .base
                    .db()
                    .query(
                        "UPDATE $order SET status = $next, updated_at = $now \
                         WHERE status = $expected RETURN AFTER",
                    )
                    .bind(("order", record))
                    .bind(("next", next.as_str()))
                    .bind(("expected", expected.as_str()))
                    .bind(("now", chrono::Utc::now().timestamp_millis()))
                    .await?;
                let orders: Vec<Order> = result.take(0)?;
                orders.into_iter().next().ok_or_else(|| {
                    RepoError::Conflict(format!(
                        "Order {order_id} is no longer in status '{expected}'"
                    ))
                })
            })
            .await
    }

    /// Cancel the order and return its reserved stock in one transaction.
    ///
    /// The cancellation itself is the same compare-and-swap as any other
    /// status change; the per-item increments only commit if it succeeds.
    pub async fn cancel_with_release(
        &self,
        order_id: &str,
        expected: OrderStatus,
        items: &[OrderItem],
    ) -> RepoResult<Order> {
        let record = make_record_id(ORDER_TABLE, order_id);
        self.base
            .bounded("order.cancel_with_release", async {
                let result = self
                    .base
                    .db()
                    .query(
                        "BEGIN TRANSACTION;\n\
                         LET $updated = (UPDATE $order SET status = 'cancelled', updated_at = $now \
                             WHERE status = $expected RETURN AFTER);\n\
                         IF array::len($updated) == 0 { THROW 'stale_status' };\n\
                         FOR $item IN $items {\n\
                             UPDATE type::record($item.product) \
                                 SET quantity_available += $item.qty, updated_at = $now;\n\
                         };\n\
                         COMMIT TRANSACTION;",
                    )
                    .bind(("order", record.clone()))
                    .bind(("expected", expected.as_str()))
                    .bind(("items", items.to_vec()))
                    .bind(("now", chrono::Utc::now().timestamp_millis()))
                    .await?;

                result.check().map_err(|err| {
                    let msg = err.to_string();
                    if msg.contains("stale_status") {
                        RepoError::Conflict(format!(
                            "Order {order_id} is no longer in status '{expected}'"
                        ))
                    } else {
                        RepoError::Database(msg)
                    }
                })?;

                let cancelled: Option<Order> = self
                    .base
                    .db()
                    .select((ORDER_TABLE, record.key().to_string()))
                    .await?;
                cancelled.ok_or_else(|| RepoError::NotFound(format!("Order {order_id} not found")))
            })
            .await
    }
}

/// Map a failed checkout transaction onto the repository error taxonomy.
fn map_checkout_error(err: surrealdb::Error) -> RepoError {
    let msg = err.to_string();
    if let Some(pos) = msg.find("insufficient_stock:") {
        let product = msg[pos + "insufficient_stock:".len()..]
            .split(|c: char| c.is_whitespace() || c == '\'' || c == '"')
            .next()
            .unwrap_or("")
            .to_string();
        return RepoError::InsufficientStock(format!(
            "Not enough stock for product {product}"
        ));
    }
    RepoError::Database(msg)
}
