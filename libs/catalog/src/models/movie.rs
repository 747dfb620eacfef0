//! Movie model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Country, Genre, Language};

/// A movie with its language, genres and countries resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub director: String,
    pub year: i32,
    pub plot: String,
    /// Duration in minutes
    pub runtime: i32,
    pub rating: f64,
    pub poster_url: String,
    pub trailer_url: String,
    pub release_date: Option<NaiveDate>,
    pub language: Language,
    pub genres: Vec<Genre>,
    pub countries: Vec<Country>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Movie fields as written by create and update. Related rows are referenced
/// by id; update replaces the genre and country sets wholesale.
#[derive(Debug, Clone, Deserialize)]
pub struct MovieInput {
    pub title: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub plot: String,
    #[serde(default)]
    pub runtime: i32,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub poster_url: String,
    #[serde(default)]
    pub trailer_url: String,
    pub release_date: Option<NaiveDate>,
    pub language_id: Uuid,
    #[serde(default)]
    pub genre_ids: Vec<Uuid>,
    #[serde(default)]
    pub country_ids: Vec<Uuid>,
}
