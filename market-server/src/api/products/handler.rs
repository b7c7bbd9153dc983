//! Product API Handlers
//!
//! Catalog reads are public; every mutation requires the farmer role and,
//! for existing products, ownership.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Category, Product, ProductCreate, ProductUpdate, Role};
use crate::db::repository::{ProductFilter, ProductRepository};
use crate::utils::{AppError, AppResult, Paginated, PaginationParams};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ListQuery {
    fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

/// GET /api/products - browse the catalog (public)
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Paginated<Product>>> {
    let repo = state.products();
    let page = query.pagination();
    let filter = ProductFilter {
        category: query.category,
        search: query.search,
    };
    let (products, total) = repo
        .find_available(&filter, &page)
        .await
        .map_err(AppError::from)?;
    Ok(Json(Paginated::new(products, total, &page)))
}

/// GET /api/products/:id (public)
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let repo = state.products();
    let product = repo
        .find_by_id(&id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(format!("Product {id}")))?;
    Ok(Json(product))
}

/// GET /api/products/farmer/my-products - farmer dashboard
pub async fn my_products(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    user.require_role(Role::Farmer)?;
    let repo = state.products();
    let products = repo
        .find_by_farmer(&user.record_id())
        .await
        .map_err(AppError::from)?;
    Ok(Json(products))
}

/// POST /api/products - farmer only
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<ProductCreate>,
) -> AppResult<Json<Product>> {
    user.require_role(Role::Farmer)?;
    req.validate()?;

    let repo = state.products();
    let product = repo
        .create(user.record_id(), req)
        .await
        .map_err(AppError::from)?;
    tracing::info!(
        product = %product.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        farmer = %user.id,
        "Product created"
    );
    Ok(Json(product))
}

/// PUT /api/products/:id - owning farmer only
pub async fn update(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    user.require_role(Role::Farmer)?;
    req.validate()?;

    let repo = state.products();
    require_ownership(&repo, &id, &user).await?;

    let product = repo.update(&id, req).await.map_err(AppError::from)?;
    Ok(Json(product))
}

/// DELETE /api/products/:id - owning farmer only
pub async fn delete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    user.require_role(Role::Farmer)?;

    let repo = state.products();
    require_ownership(&repo, &id, &user).await?;

    repo.delete(&id).await.map_err(AppError::from)?;
    tracing::info!(product = %id, farmer = %user.id, "Product deleted");
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Admins may manage any product; farmers only their own.
async fn require_ownership(
    repo: &ProductRepository,
    product_id: &str,
    user: &CurrentUser,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    let owned = repo
        .is_owned_by(product_id, &user.record_id())
        .await
        .map_err(AppError::from)?;
    if !owned {
        tracing::warn!(target: "security", product = %product_id, farmer = %user.id, "Ownership check failed");
        return Err(AppError::forbidden("Product belongs to another farmer"));
    }
    Ok(())
}
