//! Authentication service
//!
//! Orchestrates registration, login, token validation, refresh rotation,
//! logout and account lifecycle on top of a credential store, a session store,
//! the token codec and the password hasher. The service holds no per-request
//! state; everything durable lives in the stores.

use chrono::Utc;
use common::{PageRequest, StoreError};
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::jwt::{Claims, TokenCodec, TokenError, TokenKind};
use crate::models::{Capability, NewUser, NewUserRecord, Role, Session, User};
use crate::password::{PasswordError, PasswordHasher};
use crate::store::{CredentialStore, SessionStore};

/// Deadline applied to each store call unless configured otherwise
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        codec: TokenCodec,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            sessions,
            codec,
            hasher,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Run a store call under the configured deadline
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }

    async fn hash_password(&self, password: SecretString) -> Result<String, PasswordError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(password.expose_secret()))
            .await
            .map_err(|e| PasswordError::Hash(e.to_string()))?
    }

    async fn verify_password(
        &self,
        password: SecretString,
        hash: String,
    ) -> Result<bool, PasswordError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(password.expose_secret(), &hash))
            .await
            .map_err(|e| PasswordError::Hash(e.to_string()))?
    }

    async fn verify_dummy(&self, password: SecretString) {
        let hasher = self.hasher.clone();
        let outcome =
            tokio::task::spawn_blocking(move || hasher.verify_dummy(password.expose_secret()))
                .await;
        if let Err(e) = outcome {
            debug!("Dummy password check did not complete: {}", e);
        }
    }

    fn issue_session(
        &self,
        user: &User,
        user_agent: &str,
        ip_address: &str,
    ) -> AuthResult<Session> {
        let (access, refresh) = self.codec.issue_pair(user).map_err(AuthError::TokenSigning)?;
        Ok(Session::new(user.id, access, refresh, user_agent, ip_address))
    }

    /// Revoke a freshly stored session whose owner was deleted meanwhile
    async fn confirm_owner(&self, session: &Session) -> AuthResult<()> {
        let owner = self.bounded(self.users.get_by_id(session.user_id)).await;
        if let Ok(Some(_)) = owner {
            return Ok(());
        }

        warn!("Owner of session {} is gone, revoking it", session.id);
        if let Err(e) = self.bounded(self.sessions.revoke_by_id(session.id)).await {
            error!("Failed to revoke orphaned session {}: {}", session.id, e);
        }
        match owner {
            Err(e) => Err(e.into()),
            _ => Err(AuthError::UserNotFound),
        }
    }

    /// Create an account. Username and email must both be unused by live users.
    pub async fn register(&self, candidate: NewUser) -> AuthResult<User> {
        info!("Registering user: {}", candidate.username);

        if self
            .bounded(self.users.get_by_email(&candidate.email))
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }
        if self
            .bounded(self.users.get_by_username(&candidate.username))
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = self.hash_password(candidate.password).await?;
        let record = NewUserRecord {
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            username: candidate.username,
            email: candidate.email,
            password_hash,
            role: candidate.role,
            active: true,
        };

        match self.bounded(self.users.create(record)).await {
            Ok(user) => Ok(user),
            // Lost a race with a concurrent registration.
            Err(StoreError::Conflict(_)) => Err(AuthError::UserAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Register the first administrator. Refused once any admin exists.
    pub async fn bootstrap_admin(&self, mut candidate: NewUser) -> AuthResult<User> {
        if self.admin_exists().await? {
            return Err(AuthError::AdminAlreadyExists);
        }
        candidate.role = Role::Admin;
        self.register(candidate).await
    }

    /// Verify credentials and open a new session
    pub async fn login(
        &self,
        username: &str,
        password: SecretString,
        user_agent: &str,
        ip_address: &str,
    ) -> AuthResult<(User, Session)> {
        info!("Login attempt for user: {}", username);

        let Some(mut user) = self.bounded(self.users.get_by_username(username)).await? else {
            self.verify_dummy(password).await;
            warn!("Login failed for user: {}", username);
            return Err(AuthError::InvalidCredentials);
        };

        if !user.active {
            warn!("Login refused for inactive user: {}", username);
            return Err(AuthError::UserInactive);
        }

        if !self.verify_password(password, user.password_hash.clone()).await? {
            warn!("Login failed for user: {}", username);
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        if !self.bounded(self.users.update_last_login(user.id, now)).await? {
            return Err(AuthError::UserNotFound);
        }
        user.last_login_at = Some(now);

        let session = self.issue_session(&user, user_agent, ip_address)?;
        let session = self.bounded(self.sessions.create(session)).await?;
        self.confirm_owner(&session).await?;

        info!("User {} logged in, session {}", user.id, session.id);
        Ok((user, session))
    }

    /// Check an access token against its signature and its stored session
    pub async fn validate_access_token(&self, access_token: &str) -> AuthResult<Claims> {
        let claims = self.codec.decode(access_token).map_err(|e| {
            debug!("Access token rejected: {}", e);
            AuthError::InvalidToken
        })?;

        if claims.token_type != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }

        let session = self
            .bounded(self.sessions.get_by_access_token(access_token))
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        if session.user_id != claims.user_id {
            return Err(AuthError::InvalidToken);
        }
        if !session.is_access_token_valid(Utc::now()) {
            return Err(AuthError::SessionInvalid);
        }

        Ok(claims)
    }

    /// Validate an access token and require `capability` of its role
    pub async fn authorize(
        &self,
        access_token: &str,
        capability: Capability,
    ) -> AuthResult<Claims> {
        let claims = self.validate_access_token(access_token).await?;
        if !claims.role.allows(capability) {
            warn!("User {} lacks {:?}", claims.user_id, capability);
            return Err(AuthError::Forbidden);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a brand-new session, revoking the old one
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
        user_agent: &str,
        ip_address: &str,
    ) -> AuthResult<Session> {
        info!("Token refresh request");

        let claims = match self.codec.decode(refresh_token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return Err(AuthError::RefreshTokenExpired),
            Err(e) => {
                debug!("Refresh token rejected: {}", e);
                return Err(AuthError::InvalidToken);
            }
        };

        if claims.token_type != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let old = self
            .bounded(self.sessions.get_by_refresh_token(refresh_token))
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        if old.user_id != claims.user_id {
            return Err(AuthError::InvalidToken);
        }
        // Revoked and expired sessions both report an expired refresh token.
        if !old.is_refresh_token_valid(Utc::now()) {
            if old.revoked {
                warn!("Refresh token of revoked session {} presented", old.id);
            }
            return Err(AuthError::RefreshTokenExpired);
        }

        let user = self
            .bounded(self.users.get_by_id(claims.user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let replacement = self.issue_session(&user, user_agent, ip_address)?;

        let session = match self.bounded(self.sessions.rotate(old.id, replacement)).await {
            Ok(session) => session,
            // Another refresh consumed the token first.
            Err(StoreError::Stale(_)) => {
                warn!("Refresh token of session {} was already rotated", old.id);
                return Err(AuthError::RefreshTokenExpired);
            }
            Err(e) => {
                error!("Session rotation failed for user {}: {}", user.id, e);
                if let Err(revoke_err) = self.bounded(self.sessions.revoke_by_id(old.id)).await {
                    error!(
                        "Failed to revoke session {} after rotation failure: {}",
                        old.id, revoke_err
                    );
                }
                return Err(AuthError::RotationFailed(e));
            }
        };
        self.confirm_owner(&session).await?;

        info!("Rotated session {} into {} for user {}", old.id, session.id, user.id);
        Ok(session)
    }

    /// Revoke the session the access token belongs to. Repeating it is harmless.
    pub async fn logout(&self, access_token: &str) -> AuthResult<()> {
        let session = self
            .bounded(self.sessions.get_by_access_token(access_token))
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        self.bounded(self.sessions.revoke_by_id(session.id)).await?;
        info!("Session {} of user {} logged out", session.id, session.user_id);
        Ok(())
    }

    /// Set the active flag. Existing sessions are left alone.
    pub async fn update_user_status(&self, user_id: Uuid, active: bool) -> AuthResult<()> {
        info!("Setting active={} for user {}", active, user_id);

        if !self.bounded(self.users.update_status(user_id, active)).await? {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    /// Revoke every session of a user, returning how many were live
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> AuthResult<u64> {
        let revoked = self.bounded(self.sessions.revoke_all_for_user(user_id)).await?;
        info!("Revoked {} sessions of user {}", revoked, user_id);
        Ok(revoked)
    }

    /// Revoke every session of the user, then tombstone the account
    pub async fn delete_user(&self, user_id: Uuid) -> AuthResult<()> {
        info!("Deleting user {}", user_id);

        self.bounded(self.sessions.revoke_all_for_user(user_id)).await?;

        if !self.bounded(self.users.soft_delete(user_id)).await? {
            return Err(AuthError::UserNotFound);
        }

        // Sessions stored while the delete was in flight. Any stored later
        // are caught by `confirm_owner`.
        let stragglers = self.bounded(self.sessions.revoke_all_for_user(user_id)).await?;
        if stragglers > 0 {
            warn!("Revoked {} sessions opened during deletion of user {}", stragglers, user_id);
        }
        Ok(())
    }

    pub async fn admin_exists(&self) -> AuthResult<bool> {
        Ok(self.bounded(self.users.count_by_role(Role::Admin)).await? > 0)
    }

    /// One page of live users and the total count
    pub async fn list_users(&self, page: PageRequest) -> AuthResult<(Vec<User>, i64)> {
        Ok(self.bounded(self.users.list(page)).await?)
    }
}
