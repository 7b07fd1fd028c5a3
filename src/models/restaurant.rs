use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A restaurant that can be rated on its vegetarian and non-vegetarian food
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
}

impl Restaurant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Dietary track a restaurant rating belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "rating_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RatingType {
    Veg,
    NonVeg,
}

/// Whether the restaurant serves food on a given track at all
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "availability", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    #[default]
    Available,
    NotAvailable,
}

/// One user's rating of one dietary track of a restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct RestaurantRating {
    pub user_id: String,
    pub restaurant_id: String,
    pub rating_type: RatingType,
    pub score: Option<f64>,
    pub availability: Availability,
}

impl RestaurantRating {
    /// Score this rating contributes to aggregation, if any.
    ///
    /// Tracks marked NOT_AVAILABLE never contribute, whatever score they carry.
    pub fn usable_score(&self) -> Option<f64> {
        match self.availability {
            Availability::Available => self.score,
            Availability::NotAvailable => None,
        }
    }
}

/// Personalized veg / non-veg scores of a restaurant for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct RestaurantAggregateScore {
    pub user_id: String,
    pub restaurant_id: String,
    pub veg_score: Option<f64>,
    pub non_veg_score: Option<f64>,
    pub veg_count: i32,
    pub non_veg_count: i32,
    /// Volume based confidence in 0..=1
    pub confidence: f64,
    pub calculated_at: DateTime<Utc>,
}
