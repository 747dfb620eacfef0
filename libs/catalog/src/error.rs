//! Catalog error types

use common::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Unique constraint, named by the constraint that fired
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Foreign key to a missing row, named by the constraint that fired
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => CatalogError::AlreadyExists(constraint),
            StoreError::MissingReference(constraint) => CatalogError::UnknownReference(constraint),
            other => CatalogError::Store(other),
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from_query(err).into()
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
