//! Order API Handlers
//!
//! Checkout and fulfillment endpoints. All business rules live in
//! [`OrderWorkflow`]; handlers only shape requests and responses.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Order, OrderStatus, Role, UserContact};
use crate::orders::{OrderWorkflow, PlaceOrderRequest};
use crate::utils::{AppError, AppResult};

fn workflow(state: &ServerState) -> OrderWorkflow {
    OrderWorkflow::new(
        state.products(),
        state.orders(),
    )
}

/// POST /api/orders - consumer checkout
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    user.require_role(Role::Consumer)?;
    let order = workflow(&state)
        .place_order(user.record_id(), req)
        .await
        .map_err(AppError::from)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/consumer - consumer's order history
pub async fn consumer_orders(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Order>>> {
    user.require_role(Role::Consumer)?;
    let repo = state.orders();
    let orders = repo
        .find_by_consumer(&user.record_id())
        .await
        .map_err(AppError::from)?;
    Ok(Json(orders))
}

/// Order enriched with the consumer's contact details, for the farmer view
#[derive(Debug, Serialize)]
pub struct OrderWithConsumer {
    #[serde(flatten)]
    pub order: Order,
    pub consumer_contact: Option<UserContact>,
}

/// GET /api/orders/farmer - incoming orders with consumer contact resolved
pub async fn farmer_orders(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<OrderWithConsumer>>> {
    user.require_role(Role::Farmer)?;
    let order_repo = state.orders();
    let user_repo = state.users();

    let orders = order_repo
        .find_by_farmer(&user.record_id())
        .await
        .map_err(AppError::from)?;

    // Resolve all consumer contacts concurrently
    let contacts = futures::future::join_all(
        orders.iter().map(|o| user_repo.contact_by_id(&o.consumer)),
    )
    .await;

    let mut enriched = Vec::with_capacity(orders.len());
    for (order, contact) in orders.into_iter().zip(contacts) {
        enriched.push(OrderWithConsumer {
            order,
            consumer_contact: contact.map_err(AppError::from)?,
        });
    }
    Ok(Json(enriched))
}

/// GET /api/orders/:id - visible to the order's consumer or farmer only
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let repo = state.orders();
    let order = repo
        .find_by_id(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(format!("Order {id}")))?;

    let caller = user.record_id();
    if order.consumer != caller && order.farmer != caller && !user.is_admin() {
        tracing::warn!(target: "security", order = %id, user = %user.id, "Order access denied");
        return Err(AppError::forbidden("Not a party to this order"));
    }
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// PUT /api/orders/:id/status - owning farmer advances or cancels the order
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    let new_status = OrderStatus::parse(&req.status)
        .ok_or_else(|| AppError::validation(format!("Unknown status '{}'", req.status)))?;

    let order = workflow(&state)
        .update_status(&user.record_id(), user.role, &id, new_status)
        .await
        .map_err(AppError::from)?;
    Ok(Json(order))
}
