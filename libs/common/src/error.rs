//! Custom error types for the common library
//!
//! `StoreError` is the single failure type reported by every persistence
//! backend (PostgreSQL, Redis, in-memory). Services wrap it rather than
//! inspecting backend-specific errors.

use sqlx::Error as SqlxError;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by stores and repositories
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error occurred while connecting to the database
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// The record changed under a conditional write
    #[error("Record changed concurrently: {0}")]
    Stale(String),

    /// A foreign key pointed at a row that does not exist
    #[error("Referenced record does not exist: {0}")]
    MissingReference(String),

    /// A stored row could not be mapped back into a model
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Redis failure
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Store configuration error: {0}")]
    Configuration(String),

    /// The call did not complete before its deadline
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Classify a query failure, surfacing constraint violations as their own kinds
    pub fn from_query(err: SqlxError) -> Self {
        if let SqlxError::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() {
                return StoreError::Conflict(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference(constraint);
            }
        }
        StoreError::Query(err)
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
