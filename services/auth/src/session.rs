//! Session storage in Redis
//!
//! Layout:
//! - `session:{id}` holds the session as JSON
//! - `session:access:{token}` and `session:refresh:{token}` map tokens to ids
//! - `user_sessions:{user_id}` is the set of a user's session ids
//!
//! Every key lives until the session's refresh expiry plus a day of
//! retention, so revoked and expired sessions stay inspectable for a while.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use common::{StoreError, cache::RedisPool};
use redis::{AsyncCommands, Pipeline, Script, aio::MultiplexedConnection};
use tracing::info;
use uuid::Uuid;

use crate::models::Session;
use crate::store::SessionStore;

const RETENTION_SECS: i64 = 86_400;

/// Overwrite KEYS[1] with ARGV[2] (TTL ARGV[3]) only while it still holds ARGV[1]
const REVOKE_IF_UNCHANGED: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
    return 1
end
return 0
";

fn session_key(id: Uuid) -> String {
    format!("session:{}", id)
}

fn access_key(token: &str) -> String {
    format!("session:access:{}", token)
}

fn refresh_key(token: &str) -> String {
    format!("session:refresh:{}", token)
}

fn user_key(user_id: Uuid) -> String {
    format!("user_sessions:{}", user_id)
}

/// Seconds a session's keys should live, never less than one
fn ttl_seconds(session: &Session) -> u64 {
    let remaining =
        session.refresh_expires_at + TimeDelta::seconds(RETENTION_SECS) - Utc::now();
    remaining.num_seconds().max(1) as u64
}

/// Queue the writes for `session` and all of its index keys
fn queue_session(pipe: &mut Pipeline, session: &Session) -> Result<(), StoreError> {
    let payload = serde_json::to_string(session)?;
    let ttl = ttl_seconds(session);
    let id = session.id.to_string();
    let members_key = user_key(session.user_id);

    pipe.set_ex(session_key(session.id), payload, ttl)
        .ignore()
        .set_ex(access_key(&session.access_token), &id, ttl)
        .ignore()
        .set_ex(refresh_key(&session.refresh_token), &id, ttl)
        .ignore()
        .sadd(&members_key, &id)
        .ignore()
        .expire(&members_key, ttl as i64)
        .ignore();
    Ok(())
}

/// Redis-backed session store
#[derive(Clone)]
pub struct RedisSessionStore {
    redis_pool: RedisPool,
}

impl RedisSessionStore {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    async fn load(
        &self,
        conn: &mut MultiplexedConnection,
        id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let payload: Option<String> = conn.get(session_key(id)).await?;
        payload
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    async fn load_by_index(&self, index_key: String) -> Result<Option<Session>, StoreError> {
        let mut conn = self.redis_pool.connection().await?;
        let id: Option<String> = conn.get(index_key).await?;
        let Some(id) = id else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.load(&mut conn, id).await
    }

    async fn ensure_tokens_unused(
        &self,
        conn: &mut MultiplexedConnection,
        session: &Session,
    ) -> Result<(), StoreError> {
        let (access_taken, refresh_taken): (bool, bool) = redis::pipe()
            .exists(access_key(&session.access_token))
            .exists(refresh_key(&session.refresh_token))
            .query_async(conn)
            .await?;

        if access_taken {
            return Err(StoreError::Conflict("session access token".to_string()));
        }
        if refresh_taken {
            return Err(StoreError::Conflict("session refresh token".to_string()));
        }
        Ok(())
    }

    async fn revoke_with(
        &self,
        conn: &mut MultiplexedConnection,
        id: Uuid,
    ) -> Result<Option<bool>, StoreError> {
        let Some(mut session) = self.load(conn, id).await? else {
            return Ok(None);
        };
        if session.revoked {
            return Ok(Some(false));
        }

        session.revoked = true;
        session.updated_at = Utc::now();
        let payload = serde_json::to_string(&session)?;
        let _: () = conn.set_ex(session_key(id), payload, ttl_seconds(&session)).await?;
        Ok(Some(true))
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        self.redis_pool.health_check().await
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        info!("Creating session for user: {}", session.user_id);

        let mut conn = self.redis_pool.connection().await?;
        self.ensure_tokens_unused(&mut conn, &session).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        queue_session(&mut pipe, &session)?;
        let _: () = pipe.query_async(&mut conn).await?;

        Ok(session)
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.load_by_index(access_key(token)).await
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.load_by_index(refresh_key(token)).await
    }

    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.redis_pool.connection().await?;
        Ok(self.revoke_with(&mut conn, id).await?.is_some())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        info!("Revoking all sessions for user: {}", user_id);

        let mut conn = self.redis_pool.connection().await?;
        let ids: Vec<String> = conn.smembers(user_key(user_id)).await?;

        let mut revoked = 0;
        for id in ids {
            let id = Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            if let Some(true) = self.revoke_with(&mut conn, id).await? {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    /// Revoke the old session with a compare-and-set, then write the
    /// replacement in one MULTI/EXEC
    async fn rotate(&self, old: Uuid, replacement: Session) -> Result<Session, StoreError> {
        let mut conn = self.redis_pool.connection().await?;
        self.ensure_tokens_unused(&mut conn, &replacement).await?;

        let current: Option<String> = conn.get(session_key(old)).await?;
        let Some(current) = current else {
            return Err(StoreError::Stale(format!("session {} is gone", old)));
        };
        let mut previous: Session = serde_json::from_str(&current)?;
        if previous.revoked {
            return Err(StoreError::Stale(format!("session {} is not live", old)));
        }

        previous.revoked = true;
        previous.updated_at = Utc::now();
        let payload = serde_json::to_string(&previous)?;
        let swapped: i64 = Script::new(REVOKE_IF_UNCHANGED)
            .key(session_key(old))
            .arg(&current)
            .arg(&payload)
            .arg(ttl_seconds(&previous))
            .invoke_async(&mut conn)
            .await?;
        if swapped != 1 {
            return Err(StoreError::Stale(format!("session {} changed during rotation", old)));
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        queue_session(&mut pipe, &replacement)?;
        let _: () = pipe.query_async(&mut conn).await?;

        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::IssuedToken;

    #[test]
    fn test_key_layout() {
        let id = Uuid::nil();
        assert_eq!(session_key(id), "session:00000000-0000-0000-0000-000000000000");
        assert_eq!(access_key("abc"), "session:access:abc");
        assert_eq!(refresh_key("def"), "session:refresh:def");
        assert_eq!(user_key(id), "user_sessions:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_ttl_covers_refresh_window_plus_retention() {
        let now = Utc::now();
        let session = Session::new(
            Uuid::new_v4(),
            IssuedToken {
                token: "a".to_string(),
                expires_at: now + TimeDelta::minutes(15),
            },
            IssuedToken {
                token: "r".to_string(),
                expires_at: now + TimeDelta::hours(1),
            },
            "agent",
            "127.0.0.1",
        );

        let ttl = ttl_seconds(&session);
        assert!(ttl > 3600 + 86_000);
        assert!(ttl <= 3600 + 86_400);
    }

    #[test]
    fn test_ttl_never_zero() {
        let now = Utc::now();
        let session = Session::new(
            Uuid::new_v4(),
            IssuedToken {
                token: "a".to_string(),
                expires_at: now - TimeDelta::days(3),
            },
            IssuedToken {
                token: "r".to_string(),
                expires_at: now - TimeDelta::days(2),
            },
            "agent",
            "127.0.0.1",
        );

        assert_eq!(ttl_seconds(&session), 1);
    }
}
