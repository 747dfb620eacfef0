use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    /// ISO 3166-1 alpha-2 code
    pub code: String,
    pub continent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCountry {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub continent: String,
}
