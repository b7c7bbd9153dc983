//! API route module
//!
//! # Structure
//!
//! - [`health`] — liveness probe (public)
//! - [`auth`] — register / login / profile
//! - [`products`] — catalog browse (public) and farmer product management
//! - [`orders`] — checkout, order history and fulfillment status

use std::time::Duration;

use axum::Router;
use axum::middleware as axum_middleware;
use http::{HeaderName, HeaderValue};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::core::ServerState;

pub mod auth;
pub mod health;
pub mod orders;
pub mod products;

pub mod router_ext;
pub use router_ext::{OneshotResult, OneshotRouter};

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(auth::router())
        .merge(products::router())
        .merge(orders::router())
        .merge(health::router())
}

/// Build a fully configured application with all middleware.
///
/// Used by both the HTTP server and in-process oneshot calls.
pub fn build_app(state: &ServerState) -> Router<ServerState> {
    build_router()
        // CORS - handle cross-origin requests
        .layer(CorsLayer::permissive())
        // Gzip compress responses
        .layer(CompressionLayer::new())
        // Request tracing (INFO level)
        .layer(TraceLayer::new_for_http())
        // Bound every request
        .layer(TimeoutLayer::new(Duration::from_millis(
            state.config.request_timeout_ms,
        )))
        // Unique ID per request, propagated to the response
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        // JWT authentication - injects CurrentUser before routing
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
}
