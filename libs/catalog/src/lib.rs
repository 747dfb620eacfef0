//! Movie catalog persistence
//!
//! PostgreSQL repositories for languages, genres, countries and movies. Every
//! entity is soft-deleted and every read skips deleted rows. Listings take a
//! [`common::PageRequest`] and return the page together with the total count.

pub mod error;
pub mod models;
pub mod repositories;

pub use error::{CatalogError, CatalogResult};
