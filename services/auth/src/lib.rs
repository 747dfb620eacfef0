//! Authentication and session management for the movie catalog
//!
//! [`AuthService`] is the entry point. It is generic over a
//! [`CredentialStore`] and a [`SessionStore`]; this crate ships PostgreSQL
//! ([`repositories`]), Redis ([`session`]) and in-memory ([`memory`])
//! implementations.

pub mod config;
pub mod error;
pub mod jwt;
pub mod memory;
pub mod models;
pub mod password;
pub mod repositories;
pub mod service;
pub mod session;
pub mod store;

pub use config::{AdminBootstrap, AuthConfig, SessionBackend};
pub use error::{AuthError, AuthResult};
pub use jwt::{Claims, JwtConfig, TokenCodec, TokenError, TokenKind};
pub use password::PasswordHasher;
pub use service::AuthService;
pub use store::{CredentialStore, SessionStore};
