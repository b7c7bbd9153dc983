//! Database Models
//!
//! Entity structs matching the SurrealDB tables, plus create/update payloads.

pub mod order;
pub mod product;
pub mod serde_helpers;
pub mod user;

pub use order::{Order, OrderId, OrderItem, OrderStatus};
pub use product::{Category, GeoPoint, MeasuringUnit, Product, ProductCreate, ProductId, ProductUpdate};
pub use user::{Role, User, UserContact, UserId};
