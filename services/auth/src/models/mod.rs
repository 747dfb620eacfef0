//! Authentication service models

pub mod role;
pub mod session;
pub mod user;

// Re-export for convenience
pub use role::{Capability, Role, UnknownRole};
pub use session::{Session, SessionState};
pub use user::{NewUser, NewUserRecord, User};
