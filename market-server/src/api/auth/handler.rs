//! Authentication Handlers
//!
//! Registration, login and the current-user profile. Login failures use one
//! uniform message and a fixed delay, so neither the response body nor its
//! timing reveals whether the email exists.

use std::time::Duration;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Role, User};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN, validate_email, validate_required_text,
};
use crate::utils::{AppError, AppResult};

/// Fixed delay for authentication to blunt timing attacks
const AUTH_FIXED_DELAY_MS: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<ServerState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    validate_required_text(&req.name, "name", MAX_NAME_LEN)?;
    validate_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN || req.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    if req.role == Role::Admin {
        return Err(AppError::forbidden("Cannot self-register as admin"));
    }

    let password_hash = User::hash_password(&req.password)
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;

    let repo = state.users();
    let user = repo
        .create(
            req.name,
            req.email,
            password_hash,
            req.role,
            req.phone,
            req.address,
        )
        .await
        .map_err(AppError::from)?;

    let token = issue_token(&state, &user)?;
    tracing::info!(email = %user.email, role = %user.role, "User registered");
    Ok(Json(AuthResponse { token, user }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let repo = state.users();
    let user = repo.find_by_email(&req.email).await.map_err(AppError::from)?;

    // Fixed delay before inspecting the result
    tokio::time::sleep(Duration::from_millis(AUTH_FIXED_DELAY_MS)).await;

    let user = match user {
        Some(u) => {
            let valid = u
                .verify_password(&req.password)
                .map_err(|e| AppError::internal(format!("Password verification failed: {e}")))?;
            if !valid {
                tracing::warn!(target: "security", email = %req.email, "Login failed - invalid credentials");
                return Err(AppError::invalid_credentials());
            }
            u
        }
        None => {
            tracing::warn!(target: "security", email = %req.email, "Login failed - unknown email");
            return Err(AppError::invalid_credentials());
        }
    };

    let token = issue_token(&state, &user)?;
    tracing::info!(email = %user.email, "User logged in");
    Ok(Json(AuthResponse { token, user }))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<User>> {
    let repo = state.users();
    let profile = repo
        .find_by_id(&user.id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("User profile"))?;
    Ok(Json(profile))
}

fn issue_token(state: &ServerState, user: &User) -> Result<String, AppError> {
    let user_id = user.id.as_ref().map(|t| t.to_string()).unwrap_or_default();
    state
        .jwt_service()
        .generate_token(&user_id, &user.name, user.role)
        .map_err(|e| AppError::internal(format!("Token generation failed: {e}")))
}
