use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::UserStatus;

/// Weight given to a friend who is included without an explicit weight
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Which aggregation pipeline a preference or score belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScoringDomain {
    Movies,
    Restaurants,
}

impl Display for ScoringDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringDomain::Movies => write!(f, "movies"),
            ScoringDomain::Restaurants => write!(f, "restaurants"),
        }
    }
}

impl FromStr for ScoringDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movies" => Ok(ScoringDomain::Movies),
            "restaurants" => Ok(ScoringDomain::Restaurants),
            other => Err(format!("unknown scoring domain '{}'", other)),
        }
    }
}

/// How much one friend's ratings count towards a user's aggregate scores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct WeightPreference {
    pub user_id: String,
    pub friend_id: String,
    pub weight: f64,
    pub friend_status: UserStatus,
}
