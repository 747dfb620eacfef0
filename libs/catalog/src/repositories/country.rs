//! Country repository for database operations

use common::PageRequest;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Country, NewCountry};

pub(crate) const COUNTRY_COLUMNS: &str = "id, name, code, continent, created_at, updated_at";

pub(crate) fn country_from_row(row: &PgRow) -> Result<Country, sqlx::Error> {
    Ok(Country {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        continent: row.try_get("continent")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Country codes are stored upper-case
fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[derive(Clone)]
pub struct CountryRepository {
    pool: PgPool,
}

impl CountryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, country: NewCountry) -> CatalogResult<Country> {
        info!("Creating country: {}", country.name);

        let sql = format!(
            "INSERT INTO countries (id, name, code, continent) VALUES ($1, $2, $3, $4) \
             RETURNING {COUNTRY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&country.name)
            .bind(normalize_code(&country.code))
            .bind(&country.continent)
            .fetch_one(&self.pool)
            .await?;

        Ok(country_from_row(&row)?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Country>> {
        let sql =
            format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(country_from_row).transpose()?)
    }

    pub async fn list(&self, page: PageRequest) -> CatalogResult<(Vec<Country>, i64)> {
        let sql = format!(
            r#"
            SELECT {COUNTRY_COLUMNS}
            FROM countries
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

        let countries = rows.iter().map(country_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((countries, self.count().await?))
    }

    pub async fn update(&self, id: Uuid, country: NewCountry) -> CatalogResult<Country> {
        info!("Updating country: {}", id);

        let sql = format!(
            r#"
            UPDATE countries SET name = $2, code = $3, continent = $4, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {COUNTRY_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&country.name)
            .bind(normalize_code(&country.code))
            .bind(&country.continent)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CatalogError::NotFound { entity: "country", id })?;

        Ok(country_from_row(&row)?)
    }

    pub async fn delete(&self, id: Uuid) -> CatalogResult<()> {
        info!("Deleting country: {}", id);

        let result = sqlx::query(
            "UPDATE countries SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound { entity: "country", id });
        }
        Ok(())
    }

    pub async fn count(&self) -> CatalogResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM countries WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?)
    }
}
