//! Authentication error taxonomy
//!
//! Kinds, not transport codes: a caller maps each variant to whatever its
//! transport needs. Bad usernames and bad passwords share `InvalidCredentials`.

use common::StoreError;
use thiserror::Error;

use crate::jwt::TokenError;
use crate::password::PasswordError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user account is inactive")]
    UserInactive,

    #[error("user with this email or username already exists")]
    UserAlreadyExists,

    #[error("an administrator account already exists")]
    AdminAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("session is invalid or expired")]
    SessionInvalid,

    #[error("invalid token")]
    InvalidToken,

    #[error("refresh token has expired")]
    RefreshTokenExpired,

    #[error("insufficient permissions")]
    Forbidden,

    /// The old session is revoked but its replacement was not stored.
    /// The presented refresh token is dead; the user has to log in again.
    #[error("refresh token was consumed but no replacement session was stored: {0}")]
    RotationFailed(#[source] StoreError),

    #[error(transparent)]
    TokenSigning(TokenError),

    #[error(transparent)]
    PasswordHash(#[from] PasswordError),

    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),
}

pub type AuthResult<T> = Result<T, AuthError>;
