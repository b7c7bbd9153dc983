//! Server state
//!
//! Shared handle to configuration, database and the JWT service. Cloning is
//! shallow (Arc everywhere), so handlers get their own copy per request.
//! There is no other process-wide mutable state: every concurrent concern
//! lives in the database as a conditional write.

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::db::repository::{OrderRepository, ProductRepository, UserRepository};
use crate::utils::AppError;

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    /// Embedded database handle
    pub db: Surreal<Db>,
    jwt_service: Arc<JwtService>,
}

impl ServerState {
    /// Initialize state against the on-disk database under `config.work_dir`.
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        std::fs::create_dir_all(config.db_path())
            .map_err(|e| AppError::internal(format!("Failed to create work dir: {e}")))?;
        let db_service = DbService::new(
            config
                .db_path()
                .to_str()
                .ok_or_else(|| AppError::internal("Non-UTF8 work dir path"))?,
        )
        .await?;
        Ok(Self::with_db(config, db_service))
    }

    /// Initialize against an in-memory database (tests).
    pub async fn initialize_in_memory(config: &Config) -> Result<Self, AppError> {
        let db_service = DbService::memory().await?;
        Ok(Self::with_db(config, db_service))
    }

    fn with_db(config: &Config, db_service: DbService) -> Self {
        Self {
            config: config.clone(),
            db: db_service.db,
            jwt_service: Arc::new(JwtService::with_config(config.jwt.clone())),
        }
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    // Repositories are cheap per-request constructions; building them here
    // keeps the configured database timeout on every call path.

    pub fn users(&self) -> UserRepository {
        UserRepository::with_timeout(self.db.clone(), self.config.db_timeout())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::with_timeout(self.db.clone(), self.config.db_timeout())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::with_timeout(self.db.clone(), self.config.db_timeout())
    }
}
