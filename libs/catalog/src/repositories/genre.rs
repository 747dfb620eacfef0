//! Genre repository for database operations

use common::PageRequest;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Genre, NewGenre};

pub(crate) const GENRE_COLUMNS: &str = "id, name, description, created_at, updated_at";

pub(crate) fn genre_from_row(row: &PgRow) -> Result<Genre, sqlx::Error> {
    Ok(Genre {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct GenreRepository {
    pool: PgPool,
}

impl GenreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, genre: NewGenre) -> CatalogResult<Genre> {
        info!("Creating genre: {}", genre.name);

        let sql = format!(
            "INSERT INTO genres (id, name, description) VALUES ($1, $2, $3) \
             RETURNING {GENRE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&genre.name)
            .bind(&genre.description)
            .fetch_one(&self.pool)
            .await?;

        Ok(genre_from_row(&row)?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Genre>> {
        let sql =
            format!("SELECT {GENRE_COLUMNS} FROM genres WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(genre_from_row).transpose()?)
    }

    pub async fn list(&self, page: PageRequest) -> CatalogResult<(Vec<Genre>, i64)> {
        let sql = format!(
            r#"
            SELECT {GENRE_COLUMNS}
            FROM genres
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

        let genres = rows.iter().map(genre_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((genres, self.count().await?))
    }

    pub async fn update(&self, id: Uuid, genre: NewGenre) -> CatalogResult<Genre> {
        info!("Updating genre: {}", id);

        let sql = format!(
            r#"
            UPDATE genres SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {GENRE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&genre.name)
            .bind(&genre.description)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CatalogError::NotFound { entity: "genre", id })?;

        Ok(genre_from_row(&row)?)
    }

    /// Soft-delete a genre. Existing movie links are kept but no longer listed.
    pub async fn delete(&self, id: Uuid) -> CatalogResult<()> {
        info!("Deleting genre: {}", id);

        let result = sqlx::query(
            "UPDATE genres SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound { entity: "genre", id });
        }
        Ok(())
    }

    pub async fn count(&self) -> CatalogResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM genres WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?)
    }
}
