//! Session repository for database operations

use async_trait::async_trait;
use common::StoreError;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::models::Session;
use crate::store::SessionStore;

const SESSION_COLUMNS: &str = "id, user_id, access_token, refresh_token, \
                               access_expires_at, refresh_expires_at, user_agent, ip_address, \
                               revoked, created_at, updated_at";

/// PostgreSQL-backed session store
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_token(
        &self,
        column: &str,
        token: &str,
    ) -> Result<Option<Session>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_query)?;

        row.as_ref().map(session_from_row).transpose()
    }
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    Ok(Session {
        id: row.try_get("id").map_err(StoreError::Query)?,
        user_id: row.try_get("user_id").map_err(StoreError::Query)?,
        access_token: row.try_get("access_token").map_err(StoreError::Query)?,
        refresh_token: row.try_get("refresh_token").map_err(StoreError::Query)?,
        access_expires_at: row.try_get("access_expires_at").map_err(StoreError::Query)?,
        refresh_expires_at: row.try_get("refresh_expires_at").map_err(StoreError::Query)?,
        user_agent: row.try_get("user_agent").map_err(StoreError::Query)?,
        ip_address: row.try_get("ip_address").map_err(StoreError::Query)?,
        revoked: row.try_get("revoked").map_err(StoreError::Query)?,
        created_at: row.try_get("created_at").map_err(StoreError::Query)?,
        updated_at: row.try_get("updated_at").map_err(StoreError::Query)?,
    })
}

async fn insert_session(
    tx: &mut Transaction<'_, Postgres>,
    session: &Session,
) -> Result<Session, StoreError> {
    let sql = format!(
        r#"
        INSERT INTO sessions (id, user_id, access_token, refresh_token,
                              access_expires_at, refresh_expires_at, user_agent,
                              ip_address, revoked, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {SESSION_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(session.access_expires_at)
        .bind(session.refresh_expires_at)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.revoked)
        .bind(session.created_at)
        .bind(session.updated_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(StoreError::from_query)?;

    session_from_row(&row)
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn create(&self, session: Session) -> Result<Session, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Connection)?;
        let stored = insert_session(&mut tx, &session).await?;
        tx.commit().await.map_err(StoreError::from_query)?;
        Ok(stored)
    }

    async fn get_by_access_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.fetch_by_token("access_token", token).await
    }

    async fn get_by_refresh_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.fetch_by_token("refresh_token", token).await
    }

    async fn revoke_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE sessions SET revoked = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        info!("Revoking all sessions for user: {}", user_id);

        let result = sqlx::query(
            "UPDATE sessions SET revoked = TRUE, updated_at = NOW() \
             WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_query)?;

        Ok(result.rows_affected())
    }

    /// Revoke and insert in one transaction. Dropping the future rolls both back.
    async fn rotate(&self, old: Uuid, replacement: Session) -> Result<Session, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Connection)?;

        // A concurrent rotation blocks on the row lock, then matches nothing.
        let result = sqlx::query(
            "UPDATE sessions SET revoked = TRUE, updated_at = NOW() \
             WHERE id = $1 AND revoked = FALSE",
        )
        .bind(old)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from_query)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Stale(format!("session {} is not live", old)));
        }

        let stored = insert_session(&mut tx, &replacement).await?;
        tx.commit().await.map_err(StoreError::from_query)?;
        Ok(stored)
    }
}
