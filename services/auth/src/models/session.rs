//! Session model and lifecycle rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jwt::IssuedToken;

/// A persisted login: one access/refresh token pair and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub user_agent: String,
    pub ip_address: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a session sits in its lifecycle at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Both tokens usable
    Active,
    /// Access token expired; the refresh token can still mint a new session
    AccessExpired,
    /// Refresh token expired
    Expired,
    /// Explicitly revoked
    Revoked,
}

impl Session {
    /// Build a fresh, unrevoked session around a newly issued token pair
    pub fn new(
        user_id: Uuid,
        access: IssuedToken,
        refresh: IssuedToken,
        user_agent: &str,
        ip_address: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
            user_agent: user_agent.to_string(),
            ip_address: ip_address.to_string(),
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.revoked
    }

    pub fn is_access_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now < self.access_expires_at
    }

    pub fn is_refresh_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now < self.refresh_expires_at
    }

    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        if self.revoked {
            SessionState::Revoked
        } else if now >= self.refresh_expires_at {
            SessionState::Expired
        } else if now >= self.access_expires_at {
            SessionState::AccessExpired
        } else {
            SessionState::Active
        }
    }
}
