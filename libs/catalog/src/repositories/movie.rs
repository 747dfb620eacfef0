//! Movie repository for database operations
//!
//! A movie row references its language directly and its genres and countries
//! through the `movie_genres` and `movie_countries` link tables. Reads load a
//! page of movie rows first, then the links for the whole page in one query
//! per relation.

use common::PageRequest;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Country, Genre, Language, Movie, MovieInput};

const MOVIE_SELECT: &str = r#"
    SELECT m.id, m.title, m.director, m.year, m.plot, m.runtime, m.rating,
           m.poster_url, m.trailer_url, m.release_date, m.created_at, m.updated_at,
           l.id AS language_id, l.name AS language_name, l.code AS language_code,
           l.created_at AS language_created_at, l.updated_at AS language_updated_at
    FROM movies m
    JOIN languages l ON l.id = m.language_id
"#;

const SEARCH_PREDICATE: &str = r#"
    (m.title ILIKE $1 ESCAPE '\' OR m.plot ILIKE $1 ESCAPE '\' OR m.director ILIKE $1 ESCAPE '\')
"#;

/// Escape LIKE metacharacters so user input matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn search_pattern(query: &str) -> String {
    format!("%{}%", escape_like(query.trim()))
}

fn not_found(id: Uuid) -> CatalogError {
    CatalogError::NotFound { entity: "movie", id }
}

fn movie_from_row(
    row: &PgRow,
    genres: Vec<Genre>,
    countries: Vec<Country>,
) -> Result<Movie, sqlx::Error> {
    Ok(Movie {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        director: row.try_get("director")?,
        year: row.try_get("year")?,
        plot: row.try_get("plot")?,
        runtime: row.try_get("runtime")?,
        rating: row.try_get("rating")?,
        poster_url: row.try_get("poster_url")?,
        trailer_url: row.try_get("trailer_url")?,
        release_date: row.try_get("release_date")?,
        language: Language {
            id: row.try_get("language_id")?,
            name: row.try_get("language_name")?,
            code: row.try_get("language_code")?,
            created_at: row.try_get("language_created_at")?,
            updated_at: row.try_get("language_updated_at")?,
        },
        genres,
        countries,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Write the genre and country links of `movie_id`
async fn insert_links(
    tx: &mut Transaction<'_, Postgres>,
    movie_id: Uuid,
    input: &MovieInput,
) -> CatalogResult<()> {
    if !input.genre_ids.is_empty() {
        sqlx::query(
            "INSERT INTO movie_genres (movie_id, genre_id) \
             SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(movie_id)
        .bind(&input.genre_ids)
        .execute(&mut **tx)
        .await?;
    }

    if !input.country_ids.is_empty() {
        sqlx::query(
            "INSERT INTO movie_countries (movie_id, country_id) \
             SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(movie_id)
        .bind(&input.country_ids)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[derive(Clone)]
pub struct MovieRepository {
    pool: PgPool,
}

impl MovieRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_genres(&self, movie_ids: &[Uuid]) -> CatalogResult<HashMap<Uuid, Vec<Genre>>> {
        let rows = sqlx::query(
            r#"
            SELECT mg.movie_id, g.id, g.name, g.description, g.created_at, g.updated_at
            FROM movie_genres mg
            JOIN genres g ON g.id = mg.genre_id
            WHERE mg.movie_id = ANY($1) AND g.deleted_at IS NULL
            ORDER BY g.name ASC
            "#,
        )
        .bind(movie_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_movie: HashMap<Uuid, Vec<Genre>> = HashMap::new();
        for row in &rows {
            let movie_id: Uuid = row.try_get("movie_id")?;
            by_movie
                .entry(movie_id)
                .or_default()
                .push(super::genre::genre_from_row(row)?);
        }
        Ok(by_movie)
    }

    async fn load_countries(
        &self,
        movie_ids: &[Uuid],
    ) -> CatalogResult<HashMap<Uuid, Vec<Country>>> {
        let rows = sqlx::query(
            r#"
            SELECT mc.movie_id, c.id, c.name, c.code, c.continent, c.created_at, c.updated_at
            FROM movie_countries mc
            JOIN countries c ON c.id = mc.country_id
            WHERE mc.movie_id = ANY($1) AND c.deleted_at IS NULL
            ORDER BY c.name ASC
            "#,
        )
        .bind(movie_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_movie: HashMap<Uuid, Vec<Country>> = HashMap::new();
        for row in &rows {
            let movie_id: Uuid = row.try_get("movie_id")?;
            by_movie
                .entry(movie_id)
                .or_default()
                .push(super::country::country_from_row(row)?);
        }
        Ok(by_movie)
    }

    /// Attach genres and countries to a page of movie rows, keeping row order
    async fn hydrate(&self, rows: Vec<PgRow>) -> CatalogResult<Vec<Movie>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut genres = self.load_genres(&ids).await?;
        let mut countries = self.load_countries(&ids).await?;

        let mut movies = Vec::with_capacity(rows.len());
        for (row, id) in rows.iter().zip(ids) {
            movies.push(movie_from_row(
                row,
                genres.remove(&id).unwrap_or_default(),
                countries.remove(&id).unwrap_or_default(),
            )?);
        }
        Ok(movies)
    }

    /// Create a movie and its links in one transaction
    pub async fn create(&self, input: MovieInput) -> CatalogResult<Movie> {
        info!("Creating movie: {}", input.title);

        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO movies (id, title, director, year, plot, runtime, rating,
                                poster_url, trailer_url, release_date, language_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.director)
        .bind(input.year)
        .bind(&input.plot)
        .bind(input.runtime)
        .bind(input.rating)
        .bind(&input.poster_url)
        .bind(&input.trailer_url)
        .bind(input.release_date)
        .bind(input.language_id)
        .execute(&mut *tx)
        .await?;

        insert_links(&mut tx, id, &input).await?;
        tx.commit().await?;

        self.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Movie>> {
        let sql = format!("{MOVIE_SELECT} WHERE m.id = $1 AND m.deleted_at IS NULL");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Newest movies first
    pub async fn list(&self, page: PageRequest) -> CatalogResult<(Vec<Movie>, i64)> {
        let sql = format!(
            "{MOVIE_SELECT} WHERE m.deleted_at IS NULL \
             ORDER BY m.created_at DESC, m.id ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit() as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let movies = self.hydrate(rows).await?;
        Ok((movies, self.count().await?))
    }

    /// Case-insensitive substring search over title, plot and director.
    /// The total counts every match, not just the returned page.
    pub async fn search(&self, query: &str, page: PageRequest) -> CatalogResult<(Vec<Movie>, i64)> {
        let pattern = search_pattern(query);

        let sql = format!(
            "{MOVIE_SELECT} WHERE m.deleted_at IS NULL AND {SEARCH_PREDICATE} \
             ORDER BY m.title ASC, m.id ASC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(page.limit() as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM movies m WHERE m.deleted_at IS NULL AND {SEARCH_PREDICATE}"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok((self.hydrate(rows).await?, total))
    }

    /// Replace a movie's fields and its genre and country sets
    pub async fn update(&self, id: Uuid, input: MovieInput) -> CatalogResult<Movie> {
        info!("Updating movie: {}", id);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE movies
            SET title = $2, director = $3, year = $4, plot = $5, runtime = $6, rating = $7,
                poster_url = $8, trailer_url = $9, release_date = $10, language_id = $11,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.director)
        .bind(input.year)
        .bind(&input.plot)
        .bind(input.runtime)
        .bind(input.rating)
        .bind(&input.poster_url)
        .bind(&input.trailer_url)
        .bind(input.release_date)
        .bind(input.language_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }

        sqlx::query("DELETE FROM movie_genres WHERE movie_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM movie_countries WHERE movie_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        insert_links(&mut tx, id, &input).await?;
        tx.commit().await?;

        self.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    /// Soft-delete a movie
    pub async fn delete(&self, id: Uuid) -> CatalogResult<()> {
        info!("Deleting movie: {}", id);

        let result = sqlx::query(
            "UPDATE movies SET deleted_at = NOW(), updated_at = NOW() \
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
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM movies WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?)
    }
}
