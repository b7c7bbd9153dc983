//! Market Server — farm-to-consumer marketplace backend
//!
//! Farmers list produce, consumers browse and order, farmers manage
//! inventory and fulfillment.
//!
//! # Module layout
//!
//! ```text
//! market-server/src/
//! ├── core/          # configuration, state, HTTP server
//! ├── auth/          # JWT authentication
//! ├── api/           # HTTP routes and handlers
//! ├── orders/        # order workflow engine
//! ├── db/            # embedded SurrealDB: models, schema, repositories
//! └── utils/         # errors, logging, validation, pagination
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod orders;
pub mod utils;

// Re-export common types
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::{OrderError, OrderWorkflow, PlaceOrderRequest};
pub use utils::{AppError, AppResponse, AppResult};

pub use utils::logger::init_logger_with_file;

/// Prepare the process environment: dotenv, working directory, logging.
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(config.log_dir())?;

    let log_level = std::env::var("LOG_LEVEL").ok();
    init_logger_with_file(
        log_level.as_deref(),
        config.log_dir().to_str(),
    );

    Ok(())
}
