//! Auth middleware
//!
//! Applied globally; requests to public routes pass through untouched.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::utils::AppError;

/// Routes reachable without a token.
///
/// The catalog read endpoints are public; the farmer dashboard route under
/// the same prefix is not.
fn is_public_route(method: &http::Method, path: &str) -> bool {
    if path == "/health" {
        return true;
    }
    if path == "/api/auth/login" || path == "/api/auth/register" {
        return true;
    }
    if method == http::Method::GET
        && path.starts_with("/api/products")
        && path != "/api/products/farmer/my-products"
    {
        return true;
    }
    false
}

/// Require a valid JWT on the request.
///
/// Extracts the token from `Authorization: Bearer <token>`, validates it
/// and injects [`CurrentUser`] into the request extensions.
pub async fn require_auth(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // CORS preflight never carries credentials
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    // Non-API paths fall through to their own 404s
    let path = req.uri().path().to_string();
    if is_public_route(req.method(), &path) || !path.starts_with("/api/") {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
        None => {
            tracing::warn!(target: "security", uri = %req.uri(), "Missing authorization header");
            return Err(AppError::unauthorized());
        }
    };

    match state.jwt_service().validate_token(token) {
        Ok(claims) => {
            let user = CurrentUser::try_from(claims)
                .map_err(|e| AppError::invalid_token(format!("Malformed claims: {e}")))?;
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::warn!(target: "security", error = %e, uri = %req.uri(), "Token validation failed");
            match e {
                JwtError::ExpiredToken => Err(AppError::token_expired()),
                _ => Err(AppError::invalid_token("Invalid token")),
            }
        }
    }
}
