//! Persistence contracts the authentication service depends on
//!
//! Implementations must be `Send + Sync` and safe for concurrent access.
//! Uniqueness of usernames, emails and token strings is the store's job, so
//! concurrent registrations and logins stay race-free without service-level
//! locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{PageRequest, StoreError};
use uuid::Uuid;

use crate::models::{NewUserRecord, Role, Session, User};

/// User records. Every read excludes soft-deleted users.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a user. A username or email already held by a live user
    /// yields `StoreError::Conflict`.
    async fn create(&self, user: NewUserRecord) -> Result<User, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Set the active flag. Returns `true` if a live user matched.
    async fn update_status(&self, id: Uuid, active: bool) -> Result<bool, StoreError>;

    /// Returns `true` if a live user matched.
    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Tombstone the user. Returns `true` if a live user matched.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError>;

    /// One page of users, oldest first, plus the total count
    async fn list(&self, page: PageRequest) -> Result<(Vec<User>, i64), StoreError>;
}

/// Session records. Sessions are revoked, never removed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session. A reused access or refresh token yields
    /// `StoreError::Conflict`.
    async fn create(&self, session: Session) -> Result<Session, StoreError>;

    /// Look up by access token, revoked sessions included
    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError>;

    /// Look up by refresh token, revoked sessions included
    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError>;

    /// Returns `true` if the session exists.
    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Revoke every live session of a user, returning how many were revoked
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;

    /// Revoke `old` and store `replacement`. Only a live `old` may be
    /// rotated; one that is missing or already revoked yields
    /// `StoreError::Stale` and nothing is written.
    async fn rotate(&self, old: Uuid, replacement: Session) -> Result<Session, StoreError>;
}
