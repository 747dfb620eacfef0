//! JWT codec for token issuance and verification
//!
//! Tokens are HS256-signed with a symmetric secret handed in at construction.
//! Verification is pinned to HS256, so a token presenting any other algorithm
//! is rejected before its claims are looked at.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Role, User};

/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 900;
const DEFAULT_REFRESH_TOKEN_EXPIRY: i64 = 604_800;
const DEFAULT_ISSUER: &str = "movie-catalog";
const DEFAULT_SUBJECT: &str = "movie-catalog-users";

/// Token codec errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature was fine but `exp` has passed
    #[error("token has expired")]
    Expired,

    /// Any other verification failure
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("signing secret must be at least {} bytes", MIN_SECRET_LEN)]
    WeakSecret,

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),
}

/// JWT configuration
#[derive(Debug)]
pub struct JwtConfig {
    /// Symmetric signing secret
    pub secret: SecretString,
    /// Access token lifetime (default: 15 minutes)
    pub access_token_ttl: TimeDelta,
    /// Refresh token lifetime (default: 7 days)
    pub refresh_token_ttl: TimeDelta,
    /// `iss` claim stamped on and required of every token
    pub issuer: String,
    /// `sub` claim stamped on and required of every token
    pub subject: String,
}

impl JwtConfig {
    /// Configuration with default lifetimes and identifiers
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            access_token_ttl: TimeDelta::seconds(DEFAULT_ACCESS_TOKEN_EXPIRY),
            refresh_token_ttl: TimeDelta::seconds(DEFAULT_REFRESH_TOKEN_EXPIRY),
            issuer: DEFAULT_ISSUER.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }

    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HMAC signing secret (required)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    /// - `JWT_ISSUER`: Issuer claim (default: "movie-catalog")
    /// - `JWT_SUBJECT`: Subject claim (default: "movie-catalog-users")
    pub fn from_env() -> Result<Self, TokenError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| TokenError::MissingEnv("JWT_SECRET"))?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ACCESS_TOKEN_EXPIRY);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_TOKEN_EXPIRY);

        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());
        let subject = std::env::var("JWT_SUBJECT").unwrap_or_else(|_| DEFAULT_SUBJECT.to_string());

        Ok(JwtConfig {
            secret: SecretString::from(secret),
            access_token_ttl: TimeDelta::seconds(access_token_expiry),
            refresh_token_ttl: TimeDelta::seconds(refresh_token_expiry),
            issuer,
            subject,
        })
    }
}

/// Token kind, embedded so one kind cannot be replayed as the other
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token_type: TokenKind,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// Unique token id
    pub jti: Uuid,
}

/// A signed token and the instant it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: TimeDelta,
    refresh_token_ttl: TimeDelta,
    issuer: String,
    subject: String,
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Result<Self, TokenError> {
        let secret = config.secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.sub = Some(config.subject.clone());
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Ok(TokenCodec {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            issuer: config.issuer,
            subject: config.subject,
        })
    }

    /// Sign a token of `kind` for `user`, valid for `ttl` from now
    pub fn issue(
        &self,
        user: &User,
        kind: TokenKind,
        ttl: TimeDelta,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let exp = (now + ttl).timestamp();
        // Stored expiry matches the whole-second `exp` claim exactly.
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0).unwrap_or(now + ttl);

        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            token_type: kind,
            iss: self.issuer.clone(),
            sub: self.subject.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp,
            jti: Uuid::new_v4(),
        };

        let token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
                .map_err(TokenError::Signing)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Issue an access token and a refresh token with the configured lifetimes
    pub fn issue_pair(&self, user: &User) -> Result<(IssuedToken, IssuedToken), TokenError> {
        let access = self.issue(user, TokenKind::Access, self.access_token_ttl)?;
        let refresh = self.issue(user, TokenKind::Refresh, self.refresh_token_ttl)?;
        Ok((access, refresh))
    }

    /// Verify signature, algorithm, issuer, subject and time bounds
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            })
    }
}
