//! In-memory credential and session stores
//!
//! Suitable for development and testing. They enforce the same uniqueness
//! rules as the PostgreSQL schema, and `rotate` checks and swaps under a
//! single lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{PageRequest, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{NewUserRecord, Role, Session, User};
use crate::store::{CredentialStore, SessionStore};

/// In-memory user records keyed by id
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn live(user: &User) -> bool {
    user.deleted_at.is_none()
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, record: NewUserRecord) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;

        if users.values().any(|u| live(u) && u.username == record.username) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }
        if users.values().any(|u| live(u) && u.email == record.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: record.first_name,
            last_name: record.last_name,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
            role: record.role,
            active: record.active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.get(&id).filter(|u| live(u)).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| live(u) && u.username == username)
            .cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| live(u) && u.email == email).cloned())
    }

    async fn update_status(&self, id: Uuid, active: bool) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        match users.get_mut(&id).filter(|u| live(u)) {
            Some(user) => {
                user.active = active;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        match users.get_mut(&id).filter(|u| live(u)) {
            Some(user) => {
                user.last_login_at = Some(at);
                user.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        match users.get_mut(&id).filter(|u| live(u)) {
            Some(user) => {
                let now = Utc::now();
                user.deleted_at = Some(now);
                user.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError> {
        let users = self.users.lock().await;
        Ok(users.values().filter(|u| live(u) && u.role == role).count() as i64)
    }

    async fn list(&self, page: PageRequest) -> Result<(Vec<User>, i64), StoreError> {
        let users = self.users.lock().await;
        let mut matching: Vec<User> = users.values().filter(|u| live(u)).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((items, total))
    }
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<Uuid, Session>,
    by_access: HashMap<String, Uuid>,
    by_refresh: HashMap<String, Uuid>,
}

impl SessionTable {
    fn insert(&mut self, session: Session) -> Result<Session, StoreError> {
        if self.by_access.contains_key(&session.access_token) {
            return Err(StoreError::Conflict("sessions_access_token_key".to_string()));
        }
        if self.by_refresh.contains_key(&session.refresh_token) {
            return Err(StoreError::Conflict("sessions_refresh_token_key".to_string()));
        }

        self.by_access.insert(session.access_token.clone(), session.id);
        self.by_refresh.insert(session.refresh_token.clone(), session.id);
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn revoke(&mut self, id: Uuid) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                if !session.revoked {
                    session.revoked = true;
                    session.updated_at = Utc::now();
                }
                true
            }
            None => false,
        }
    }
}

/// In-memory sessions with access and refresh token indexes
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    table: Arc<Mutex<SessionTable>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        self.table.lock().await.insert(session)
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .by_access
            .get(token)
            .and_then(|id| table.sessions.get(id))
            .cloned())
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .by_refresh
            .get(token)
            .and_then(|id| table.sessions.get(id))
            .cloned())
    }

    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.table.lock().await.revoke(id))
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut table = self.table.lock().await;
        let now = Utc::now();
        let mut revoked = 0;
        for session in table.sessions.values_mut() {
            if session.user_id == user_id && !session.revoked {
                session.revoked = true;
                session.updated_at = now;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn rotate(&self, old: Uuid, replacement: Session) -> Result<Session, StoreError> {
        let mut table = self.table.lock().await;
        match table.sessions.get(&old) {
            Some(session) if !session.revoked => {}
            _ => return Err(StoreError::Stale(format!("session {} is not live", old))),
        }
        let stored = table.insert(replacement)?;
        table.revoke(old);
        Ok(stored)
    }
}
