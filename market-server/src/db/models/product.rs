//! Product Model

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_TEXT_LEN, MAX_URL_LEN, validate_optional_text, validate_required_text,
};
use crate::utils::AppError;

/// Product ID type
pub type ProductId = RecordId;

/// Produce category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Category {
    Rice,
    Vegetables,
    Fruits,
    Grains,
    Dairy,
    Spices,
    Other,
}

/// Measuring unit for pricing and quantities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MeasuringUnit {
    Kg,
    G,
    Packet,
    Bunch,
    Piece,
    Litre,
}

/// GeoJSON point (longitude, latitude)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [0.0, 0.0],
        }
    }
}

/// Product model matching the `product` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<ProductId>,
    /// Record link to the owning farmer
    #[serde(with = "serde_helpers::record_id")]
    pub farmer: RecordId,
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Price per measuring unit. Always finite and non-negative.
    pub price_per_unit: f64,
    pub measuring_unit: MeasuringUnit,
    pub min_order_qty: i64,
    pub shelf_life_days: i64,
    pub quantity_available: i64,
    pub delivery_radius_km: i64,
    #[serde(default)]
    pub location: GeoPoint,
    /// Image URL references (the Image Store itself is external)
    #[serde(default)]
    pub images: Vec<String>,
    /// Epoch millis
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub price_per_unit: f64,
    pub measuring_unit: MeasuringUnit,
    pub min_order_qty: i64,
    pub shelf_life_days: i64,
    pub quantity_available: i64,
    pub delivery_radius_km: i64,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductCreate {
    /// Boundary validation: all numeric invariants from the product schema.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_required_text(&self.title, "title", MAX_NAME_LEN)?;
        validate_required_text(&self.description, "description", MAX_TEXT_LEN)?;
        validate_price(self.price_per_unit)?;
        if self.min_order_qty < 1 {
            return Err(AppError::validation("min_order_qty must be at least 1"));
        }
        if self.shelf_life_days < 1 {
            return Err(AppError::validation("shelf_life_days must be at least 1"));
        }
        if self.quantity_available < 0 {
            return Err(AppError::validation("quantity_available cannot be negative"));
        }
        if self.delivery_radius_km < 1 {
            return Err(AppError::validation("delivery_radius_km must be at least 1"));
        }
        for url in &self.images {
            validate_required_text(url, "image url", MAX_URL_LEN)?;
        }
        Ok(())
    }
}

/// Update product payload (partial)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub price_per_unit: Option<f64>,
    pub measuring_unit: Option<MeasuringUnit>,
    pub min_order_qty: Option<i64>,
    pub shelf_life_days: Option<i64>,
    pub quantity_available: Option<i64>,
    pub delivery_radius_km: Option<i64>,
    pub location: Option<GeoPoint>,
    pub images: Option<Vec<String>>,
}

impl ProductUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_optional_text(&self.title, "title", MAX_NAME_LEN)?;
        validate_optional_text(&self.description, "description", MAX_TEXT_LEN)?;
        if let Some(price) = self.price_per_unit {
            validate_price(price)?;
        }
        if let Some(qty) = self.min_order_qty
            && qty < 1
        {
            return Err(AppError::validation("min_order_qty must be at least 1"));
        }
        if let Some(days) = self.shelf_life_days
            && days < 1
        {
            return Err(AppError::validation("shelf_life_days must be at least 1"));
        }
        if let Some(qty) = self.quantity_available
            && qty < 0
        {
            return Err(AppError::validation("quantity_available cannot be negative"));
        }
        if let Some(radius) = self.delivery_radius_km
            && radius < 1
        {
            return Err(AppError::validation("delivery_radius_km must be at least 1"));
        }
        Ok(())
    }
}

/// Validate a price value: finite (not NaN/Infinity) and non-negative.
fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() {
        return Err(AppError::validation(format!(
            "price_per_unit must be a finite number, got {price}"
        )));
    }
    if price < 0.0 {
        return Err(AppError::validation("price_per_unit cannot be negative"));
    }
    Ok(())
}
