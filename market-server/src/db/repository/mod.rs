//! Repository Module
//!
//! CRUD and atomic stock/status operations on the SurrealDB tables.
//!
//! All stock and status mutations are conditional database updates
//! ("decrement only if enough stock", "set status only if it still has the
//! expected prior value") so the server can run as multiple stateless
//! replicas without application-level locks.

pub mod order;
pub mod product;
pub mod user;

pub use order::{NewOrder, OrderRepository};
pub use product::{ProductFilter, ProductRepository};
pub use user::UserRepository;

use std::future::Future;
use std::time::Duration;

use surrealdb::RecordId;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

use crate::utils::AppError;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::Duplicate(msg) => AppError::Conflict(msg),
            RepoError::Validation(msg) => AppError::Validation(msg),
            RepoError::InsufficientStock(msg) => AppError::InsufficientStock(msg),
            RepoError::Conflict(msg) => AppError::Conflict(msg),
            RepoError::Timeout(msg) => AppError::Timeout(msg),
            RepoError::Database(msg) => AppError::Database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Default bound on any single persistence call
const DEFAULT_DB_TIMEOUT: Duration = Duration::from_secs(5);

/// Base repository with database reference and bounded call timeout
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
    timeout: Duration,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            db,
            timeout: DEFAULT_DB_TIMEOUT,
        }
    }

    pub fn with_timeout(db: Surreal<Db>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }

    /// Run a database operation with the configured time bound.
    ///
    /// A timed-out operation fails; retrying is the caller's decision.
    pub async fn bounded<T, F>(&self, op: &str, fut: F) -> RepoResult<T>
    where
        F: Future<Output = RepoResult<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RepoError::Timeout(format!("{op} exceeded {:?}", self.timeout)))?
    }
}

/// Build a RecordId for `table` from either a bare key or a "table:key" string.
pub fn make_record_id(table: &str, id: &str) -> RecordId {
    if let Some((tb, key)) = id.split_once(':')
        && tb == table
    {
        return RecordId::from_table_key(table, key);
    }
    RecordId::from_table_key(table, id)
}
