//! PostgreSQL implementations of the credential and session stores

pub mod session;
pub mod user;

pub use session::SessionRepository;
pub use user::UserRepository;
