//! Database integration for the booking engine.
//!
//! Provides a database-agnostic client built on SQLx's `Any` driver
//! (SQLite, PostgreSQL, or MySQL selected via feature flags), plus
//! repository traits and SQL implementations for the durable entities
//! of the booking engine (services, professionals, reservations).
//!
//! # Example
//!
//! ```rust,no_run
//! use pelu_config::AppConfig;
//! use pelu_db::DbClient;
//! use std::sync::Arc;
//!
//! async fn setup_db() -> Result<DbClient, Box<dyn std::error::Error>> {
//!     let config = Arc::new(AppConfig::default());
//!     let db_client = DbClient::new(&config).await?;
//!     Ok(db_client)
//! }
//! ```

pub mod client;
pub mod error;
pub mod factory;
pub mod models;
pub mod repositories;
pub mod repository;

// Register the SQLite driver when the crate is loaded
#[cfg(feature = "sqlite")]
mod sqlite_driver {
    #[allow(unused_imports)]
    use sqlx::sqlite::SqlitePoolOptions as _;
}

pub use client::{DbClient, DbTransaction};
pub use factory::DbClientFactory;
pub use models::{Professional, Reservation, ReservationStatus, Service};
pub use repositories::{SqlProfessionalRepository, SqlReservationRepository, SqlServiceRepository};
pub use repository::{Repository, RepositoryFactory};
