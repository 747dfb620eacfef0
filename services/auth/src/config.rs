//! Service configuration read from the environment

use secrecy::SecretString;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::models::{NewUser, Role};
use crate::service::DEFAULT_STORE_TIMEOUT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown session backend: {0} (expected \"postgres\" or \"redis\")")]
    UnknownBackend(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Where sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionBackend {
    #[default]
    Postgres,
    Redis,
}

impl FromStr for SessionBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(SessionBackend::Postgres),
            "redis" => Ok(SessionBackend::Redis),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Authentication service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_backend: SessionBackend,
    /// Deadline for every individual store call
    pub store_timeout: Duration,
}

impl AuthConfig {
    /// Create a new AuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_BACKEND`: `postgres` or `redis` (default: postgres)
    /// - `AUTH_STORE_TIMEOUT_SECS`: Per-call store deadline in seconds (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_backend = match env::var("SESSION_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => SessionBackend::default(),
        };

        let store_timeout = match env::var("AUTH_STORE_TIMEOUT_SECS") {
            Ok(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "AUTH_STORE_TIMEOUT_SECS",
                        value,
                    });
                }
            },
            Err(_) => DEFAULT_STORE_TIMEOUT,
        };

        Ok(Self {
            session_backend,
            store_timeout,
        })
    }
}

/// First administrator account, created at startup when none exists
#[derive(Debug)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
}

impl AdminBootstrap {
    /// Read the bootstrap admin from the environment
    ///
    /// Returns `None` unless `BOOTSTRAP_ADMIN_USERNAME`, `BOOTSTRAP_ADMIN_EMAIL`
    /// and `BOOTSTRAP_ADMIN_PASSWORD` are all set. `BOOTSTRAP_ADMIN_FIRST_NAME`
    /// and `BOOTSTRAP_ADMIN_LAST_NAME` are optional.
    pub fn from_env() -> Option<Self> {
        let username = env::var("BOOTSTRAP_ADMIN_USERNAME").ok()?;
        let email = env::var("BOOTSTRAP_ADMIN_EMAIL").ok()?;
        let password = env::var("BOOTSTRAP_ADMIN_PASSWORD").ok()?;

        Some(Self {
            username,
            email,
            password: SecretString::from(password),
            first_name: env::var("BOOTSTRAP_ADMIN_FIRST_NAME")
                .unwrap_or_else(|_| "Admin".to_string()),
            last_name: env::var("BOOTSTRAP_ADMIN_LAST_NAME").unwrap_or_default(),
        })
    }

    pub fn into_new_user(self) -> NewUser {
        NewUser {
            first_name: self.first_name,
            last_name: self.last_name,
            username: self.username,
            email: self.email,
            password: self.password,
            role: Role::Admin,
        }
    }
}
