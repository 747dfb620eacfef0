//! Common library for the movie catalog services
//!
//! This crate provides shared functionality used across the workspace,
//! including database connectivity, the Redis client, the shared persistence
//! error type and pagination.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
pub mod pagination;

pub use error::{StoreError, StoreResult};
pub use pagination::PageRequest;
