//! Database Module
//!
//! Embedded SurrealDB storage: connection setup and schema definition.

pub mod models;
pub mod repository;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

use crate::utils::AppError;

const NAMESPACE: &str = "market";
const DATABASE: &str = "market";

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone, Debug)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open (or create) the on-disk database at `db_path`
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;
        Self::setup(db).await
    }

    /// Open an in-memory database (tests)
    pub async fn memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::database(format!("Failed to open in-memory database: {e}")))?;
        Self::setup(db).await
    }

    async fn setup(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        define_schema(&db).await?;

        tracing::info!("Database ready (SurrealDB embedded)");
        Ok(Self { db })
    }
}

/// Define tables, fields and indexes.
///
/// Tables are SCHEMAFULL so the numeric invariants (stock never negative,
/// quantities at least 1) are enforced at the storage layer as well, and
/// record links are coerced from their "table:id" string form.
async fn define_schema(db: &Surreal<Db>) -> Result<(), AppError> {
    let ddl = r#"
        DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS name ON user TYPE string;
        DEFINE FIELD IF NOT EXISTS email ON user TYPE string;
        DEFINE FIELD IF NOT EXISTS password_hash ON user TYPE string;
        DEFINE FIELD IF NOT EXISTS role ON user TYPE string
            ASSERT $value IN ['consumer', 'farmer', 'admin'];
        DEFINE FIELD IF NOT EXISTS phone ON user TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS address ON user TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS created_at ON user TYPE number;
        DEFINE INDEX IF NOT EXISTS user_email ON user FIELDS email UNIQUE;

        DEFINE TABLE IF NOT EXISTS product SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS farmer ON product TYPE record<user>;
        DEFINE FIELD IF NOT EXISTS title ON product TYPE string;
        DEFINE FIELD IF NOT EXISTS description ON product TYPE string;
        DEFINE FIELD IF NOT EXISTS category ON product TYPE string
            ASSERT $value IN ['Rice', 'Vegetables', 'Fruits', 'Grains', 'Dairy', 'Spices', 'Other'];
        DEFINE FIELD IF NOT EXISTS price_per_unit ON product TYPE number
            ASSERT $value >= 0;
        DEFINE FIELD IF NOT EXISTS measuring_unit ON product TYPE string
            ASSERT $value IN ['kg', 'g', 'packet', 'bunch', 'piece', 'litre'];
        DEFINE FIELD IF NOT EXISTS min_order_qty ON product TYPE int
            ASSERT $value >= 1;
        DEFINE FIELD IF NOT EXISTS shelf_life_days ON product TYPE int
            ASSERT $value >= 1;
        DEFINE FIELD IF NOT EXISTS quantity_available ON product TYPE int
            ASSERT $value >= 0;
        DEFINE FIELD IF NOT EXISTS delivery_radius_km ON product TYPE int
            ASSERT $value >= 1;
        DEFINE FIELD IF NOT EXISTS location ON product FLEXIBLE TYPE object;
        DEFINE FIELD IF NOT EXISTS images ON product TYPE array<string>;
        DEFINE FIELD IF NOT EXISTS created_at ON product TYPE number;
        DEFINE FIELD IF NOT EXISTS updated_at ON product TYPE number;

        DEFINE TABLE IF NOT EXISTS order SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS consumer ON order TYPE record<user>;
        DEFINE FIELD IF NOT EXISTS farmer ON order TYPE record<user>;
        DEFINE FIELD IF NOT EXISTS items ON order FLEXIBLE TYPE array;
        DEFINE FIELD IF NOT EXISTS subtotal ON order TYPE number
            ASSERT $value >= 0;
        DEFINE FIELD IF NOT EXISTS delivery_address ON order TYPE string;
        DEFINE FIELD IF NOT EXISTS phone ON order TYPE string;
        DEFINE FIELD IF NOT EXISTS special_instructions ON order TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS status ON order TYPE string
            ASSERT $value IN ['placed', 'accepted', 'packed', 'dispatched', 'delivered', 'cancelled'];
        DEFINE FIELD IF NOT EXISTS created_at ON order TYPE number;
        DEFINE FIELD IF NOT EXISTS updated_at ON order TYPE number;
        DEFINE INDEX IF NOT EXISTS order_farmer ON order FIELDS farmer;
        DEFINE INDEX IF NOT EXISTS order_consumer ON order FIELDS consumer;
    "#;

    db.query(ddl)
        .await
        .map_err(|e| AppError::database(format!("Failed to define schema: {e}")))?
        .check()
        .map_err(|e| AppError::database(format!("Schema definition rejected: {e}")))?;

    Ok(())
}
