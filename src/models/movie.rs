use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of entry in the movie catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "media_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
    Documentary,
}

/// A movie, series or documentary that can be rated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub media_type: MediaType,
}

impl Movie {
    pub fn new(id: impl Into<String>, title: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            media_type,
        }
    }
}

/// A single user's rating of a movie. A score of 0 means "not rated".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct MovieRating {
    pub user_id: String,
    pub movie_id: String,
    pub score: f64,
}

impl MovieRating {
    pub fn is_rated(&self) -> bool {
        self.score > 0.0
    }
}

/// Personalized, friend-weighted score of a movie for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct MovieAggregateScore {
    pub user_id: String,
    pub movie_id: String,
    pub score: f64,
    pub calculated_at: DateTime<Utc>,
}
