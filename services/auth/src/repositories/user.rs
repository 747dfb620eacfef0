//! User repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{PageRequest, StoreError};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::models::{NewUserRecord, Role, User};
use crate::store::CredentialStore;

const USER_COLUMNS: &str = "id, first_name, last_name, username, email, password_hash, role, \
                            active, last_login_at, created_at, updated_at, deleted_at";

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        predicate: &str,
        value: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {predicate} = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_query)?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role").map_err(StoreError::Query)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(User {
        id: row.try_get("id").map_err(StoreError::Query)?,
        first_name: row.try_get("first_name").map_err(StoreError::Query)?,
        last_name: row.try_get("last_name").map_err(StoreError::Query)?,
        username: row.try_get("username").map_err(StoreError::Query)?,
        email: row.try_get("email").map_err(StoreError::Query)?,
        password_hash: row.try_get("password_hash").map_err(StoreError::Query)?,
        role,
        active: row.try_get("active").map_err(StoreError::Query)?,
        last_login_at: row.try_get("last_login_at").map_err(StoreError::Query)?,
        created_at: row.try_get("created_at").map_err(StoreError::Query)?,
        updated_at: row.try_get("updated_at").map_err(StoreError::Query)?,
        deleted_at: row.try_get("deleted_at").map_err(StoreError::Query)?,
    })
}

#[async_trait]
impl CredentialStore for UserRepository {
    async fn create(&self, new_user: NewUserRecord) -> Result<User, StoreError> {
        info!("Creating new user: {}", new_user.username);

        let sql = format!(
            r#"
            INSERT INTO users (id, first_name, last_name, username, email,
                               password_hash, role, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .bind(new_user.active)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_query)?;

        user_from_row(&row)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_where("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_where("email", email).await
    }

    async fn update_status(&self, id: Uuid, active: bool) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET active = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = $2, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        info!("Soft-deleting user: {}", id);

        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1 AND deleted_at IS NULL")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_query)
    }

    async fn list(&self, page: PageRequest) -> Result<(Vec<User>, i64), StoreError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit() as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_query)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_query)?;

        let users = rows.iter().map(user_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }
}
