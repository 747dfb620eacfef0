//! Language repository for database operations

use common::PageRequest;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Language, NewLanguage};

pub(crate) const LANGUAGE_COLUMNS: &str = "id, name, code, created_at, updated_at";

pub(crate) fn language_from_row(row: &PgRow) -> Result<Language, sqlx::Error> {
    Ok(Language {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn not_found(id: Uuid) -> CatalogError {
    CatalogError::NotFound {
        entity: "language",
        id,
    }
}

#[derive(Clone)]
pub struct LanguageRepository {
    pool: PgPool,
}

impl LanguageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, language: NewLanguage) -> CatalogResult<Language> {
        info!("Creating language: {}", language.code);

        let sql = format!(
            "INSERT INTO languages (id, name, code) VALUES ($1, $2, $3) \
             RETURNING {LANGUAGE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&language.name)
            .bind(&language.code)
            .fetch_one(&self.pool)
            .await?;

        Ok(language_from_row(&row)?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Language>> {
        let sql = format!(
            "SELECT {LANGUAGE_COLUMNS} FROM languages WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(language_from_row).transpose()?)
    }

    pub async fn list(&self, page: PageRequest) -> CatalogResult<(Vec<Language>, i64)> {
        let sql = format!(
            r#"
            SELECT {LANGUAGE_COLUMNS}
            FROM languages
            WHERE deleted_at IS NULL
            ORDER BY name ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit() as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let languages = rows.iter().map(language_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((languages, self.count().await?))
    }

    pub async fn update(&self, id: Uuid, language: NewLanguage) -> CatalogResult<Language> {
        info!("Updating language: {}", id);

        let sql = format!(
            r#"
            UPDATE languages SET name = $2, code = $3, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {LANGUAGE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&language.name)
            .bind(&language.code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?;

        Ok(language_from_row(&row)?)
    }

    /// Soft-delete a language
    pub async fn delete(&self, id: Uuid) -> CatalogResult<()> {
        info!("Deleting language: {}", id);

        let result = sqlx::query(
            "UPDATE languages SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    pub async fn count(&self) -> CatalogResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM languages WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?)
    }
}
