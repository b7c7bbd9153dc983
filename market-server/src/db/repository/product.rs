//! Product Repository (Catalog Store)
//!
//! Stock adjustments are single conditional UPDATE statements, never
//! read-then-write, so concurrent checkouts cannot oversell a product.

use std::time::Duration;

use surrealdb::RecordId;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoError, RepoResult, make_record_id};
use crate::db::models::{Category, Product, ProductCreate, ProductUpdate};
use crate::utils::PaginationParams;

const PRODUCT_TABLE: &str = "product";

/// Catalog browse filter
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    /// Case-insensitive substring match over title and description
    pub search: Option<String>,
}

/// Count row shape for `SELECT count() ... GROUP ALL`
#[derive(Debug, serde::Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
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

    /// Browse the catalog: category/text filter, newest first, paginated.
    /// Returns the page plus the total number of matches.
    pub async fn find_available(
        &self,
        filter: &ProductFilter,
        page: &PaginationParams,
    ) -> RepoResult<(Vec<Product>, u64)> {
        let category = filter.category.map(|c| {
            serde_json::to_value(c)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default()
        });
        let search = filter
            .search
            .as_ref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let where_clause = "WHERE ($category IS NONE OR category = $category) \
             AND ($search IS NONE \
                  OR string::lowercase(title) CONTAINS $search \
                  OR string::lowercase(description) CONTAINS $search)";

        let query = format!(
            "SELECT * FROM product {where_clause} \
             ORDER BY created_at DESC LIMIT $limit START $start; \
             SELECT count() AS count FROM product {where_clause} GROUP ALL;"
        );

        self.base
            .bounded("product.find_available", async {
                let mut result = self
                    .base
                    .db()
                    .query(query)
                    .bind(("category", category))
                    .bind(("search", search))
                    .bind(("limit", page.limit() as i64))
                    .bind(("start", page.offset()))
                    .await?;

                let products: Vec<Product> = result.take(0)?;
                let counts: Vec<CountRow> = result.take(1)?;
                let total = counts.first().map(|c| c.count).unwrap_or(0);
                Ok((products, total))
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Product>> {
        let record = make_record_id(PRODUCT_TABLE, id);
        self.base
            .bounded("product.find_by_id", async {
                let product: Option<Product> = self
                    .base
                    .db()
                    .select((PRODUCT_TABLE, record.key().to_string()))
                    .await?;
                Ok(product)
            })
            .await
    }

    /// Farmer dashboard: all products owned by a farmer, newest first
    pub async fn find_by_farmer(&self, farmer: &RecordId) -> RepoResult<Vec<Product>> {
        self.base
            .bounded("product.find_by_farmer", async {
                let products: Vec<Product> = self
                    .base
                    .db()
                    .query("SELECT * FROM product WHERE farmer = $farmer ORDER BY created_at DESC")
                    .bind(("farmer", farmer.clone()))
                    .await?
                    .take(0)?;
                Ok(products)
            })
            .await
    }

    /// Ownership check preceding any farmer-initiated mutation
    pub async fn is_owned_by(&self, product_id: &str, farmer: &RecordId) -> RepoResult<bool> {
        let product = self.find_by_id(product_id).await?;
        match product {
            Some(p) => Ok(&p.farmer == farmer),
            None => Err(RepoError::NotFound(format!("Product {product_id} not found"))),
        }
    }

    pub async fn create(&self, farmer: RecordId, data: ProductCreate) -> RepoResult<Product> {
        // The farmer link is bound as a RecordId so the record<user> field
        // receives a native record, not its string form.
        self.base
            .bounded("product.create", async {
                let mut result = self
                    .base
                    .db()
                    .query(
                        "CREATE product SET \
                            farmer = $farmer, \
                            title = $title, \
                            description = $description, \
                            category = $category, \
                            price_per_unit = $price_per_unit, \
                            measuring_unit = $measuring_unit, \
                            min_order_qty = $min_order_qty, \
                            shelf_life_days = $shelf_life_days, \
                            quantity_available = $quantity_available, \
                            delivery_radius_km = $delivery_radius_km, \
                            location = $location, \
                            images = $images, \
                            created_at = $now, \
                            updated_at = $now \
                         RETURN AFTER",
                    )
                    .bind(("farmer", farmer))
                    .bind(("title", data.title))
                    .bind(("description", data.description))
                    .bind(("category", data.category))
                    .bind(("price_per_unit", data.price_per_unit))
                    .bind(("measuring_unit", data.measuring_unit))
                    .bind(("min_order_qty", data.min_order_qty))
                    .bind(("shelf_life_days", data.shelf_life_days))
                    .bind(("quantity_available", data.quantity_available))
                    .bind(("delivery_radius_km", data.delivery_radius_km))
                    .bind(("location", data.location.unwrap_or_default()))
                    .bind(("images", data.images))
                    .bind(("now", chrono::Utc::now().timestamp_millis()))
                    .await?;
                let products: Vec<Product> = result.take(0)?;
                products
                    .into_iter()
                    .next()
                    .ok_or_else(|| RepoError::Database("Failed to create product".to_string()))
            })
            .await
    }

    /// Partial update. Only the provided fields are touched.
    pub async fn update(&self, id: &str, data: ProductUpdate) -> RepoResult<Product> {
        let record = make_record_id(PRODUCT_TABLE, id);

        let mut set_parts: Vec<&str> = vec!["updated_at = $updated_at"];
        if data.title.is_some() { set_parts.push("title = $title"); }
        if data.description.is_some() { set_parts.push("description = $description"); }
        if data.category.is_some() { set_parts.push("category = $category"); }
        if data.price_per_unit.is_some() { set_parts.push("price_per_unit = $price_per_unit"); }
        if data.measuring_unit.is_some() { set_parts.push("measuring_unit = $measuring_unit"); }
        if data.min_order_qty.is_some() { set_parts.push("min_order_qty = $min_order_qty"); }
        if data.shelf_life_days.is_some() { set_parts.push("shelf_life_days = $shelf_life_days"); }
        if data.quantity_available.is_some() { set_parts.push("quantity_available = $quantity_available"); }
        if data.delivery_radius_km.is_some() { set_parts.push("delivery_radius_km = $delivery_radius_km"); }
        if data.location.is_some() { set_parts.push("location = $location"); }
        if data.images.is_some() { set_parts.push("images = $images"); }

        let query_str = format!("UPDATE $product SET {} RETURN AFTER", set_parts.join(", "));

        self.base
            .bounded("product.update", async {
                let mut query = self
                    .base
                    .db()
                    .query(&query_str)
                    .bind(("product", record))
                    .bind(("updated_at", chrono::Utc::now().timestamp_millis()));

                if let Some(v) = data.title { query = query.bind(("title", v)); }
                if let Some(v) = data.description { query = query.bind(("description", v)); }
                if let Some(v) = data.category { query = query.bind(("category", v)); }
                if let Some(v) = data.price_per_unit { query = query.bind(("price_per_unit", v)); }
                if let Some(v) = data.measuring_unit { query = query.bind(("measuring_unit", v)); }
                if let Some(v) = data.min_order_qty { query = query.bind(("min_order_qty", v)); }
                if let Some(v) = data.shelf_life_days { query = query.bind(("shelf_life_days", v)); }
                if let Some(v) = data.quantity_available { query = query.bind(("quantity_available", v)); }
                if let Some(v) = data.delivery_radius_km { query = query.bind(("delivery_radius_km", v)); }
                if let Some(v) = data.location { query = query.bind(("location", v)); }
                if let Some(v) = data.images { query = query.bind(("images", v)); }

                let mut result = query.await?;
                let products: Vec<Product> = result.take(0)?;
                products
                    .into_iter()
                    .next()
                    .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> RepoResult<()> {
        let record = make_record_id(PRODUCT_TABLE, id);
        self.base
            .bounded("product.delete", async {
                let deleted: Option<Product> = self
                    .base
                    .db()
                    .delete((PRODUCT_TABLE, record.key().to_string()))
                    .await?;
                if deleted.is_none() {
                    return Err(RepoError::NotFound(format!("Product {id} not found")));
                }
                Ok(())
            })
            .await
    }

    /// Atomic stock reservation: decrement only if enough stock remains.
    ///
    /// The availability check and the decrement are one conditional UPDATE;
    /// under concurrent checkouts, exactly the requests that fit into the
    /// remaining stock succeed and the rest fail here.
    pub async fn reserve_stock(&self, product_id: &str, qty: i64) -> RepoResult<Product> {
        if qty < 1 {
            return Err(RepoError::Validation("Reservation qty must be at least 1".into()));
        }
        let record = make_record_id(PRODUCT_TABLE, product_id);
        self.base
            .bounded("product.reserve_stock", async {
                let mut result = self
                    .base
                    .db()
                    .query(
                        "UPDATE $product SET quantity_available -= $qty, updated_at = $now \
                         WHERE quantity_available >= $qty RETURN AFTER",
                    )
                    .bind(("product", record))
                    .bind(("qty", qty))
                    .bind(("now", chrono::Utc::now().timestamp_millis()))
                    .await?;
                let products: Vec<Product> = result.take(0)?;
                products.into_iter().next().ok_or_else(|| {
                    RepoError::InsufficientStock(format!(
                        "Product {product_id} has fewer than {qty} units available"
                    ))
                })
            })
            .await
    }

    /// Compensating increment, used when an order is cancelled.
    pub async fn release_stock(&self, product_id: &str, qty: i64) -> RepoResult<Product> {
        if qty < 1 {
            return Err(RepoError::Validation("Release qty must be at least 1".into()));
        }
        let record = make_record_id(PRODUCT_TABLE, product_id);
        self.base
            .bounded("product.release_stock", async {
                let mut result = self
                    .base
                    .db()
                    .query(
                        "UPDATE $product SET quantity_available += $qty, updated_at = $now \
                         RETURN AFTER",
                    )
                    .bind(("product", record))
                    .bind(("qty", qty))
                    .bind(("now", chrono::Utc::now().timestamp_millis()))
                    .await?;
                let products: Vec<Product> = result.take(0)?;
                products
                    .into_iter()
                    .next()
                    .ok_or_else(|| RepoError::NotFound(format!("Product {product_id} not found")))
            })
            .await
    }
}
