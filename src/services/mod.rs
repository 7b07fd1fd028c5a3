pub mod movie_scoring;
pub mod ratings;
pub mod recompute_lock;
pub mod restaurant_scoring;
pub mod weight_preferences;
pub mod weighting;

pub use movie_scoring::{MovieRecalculation, MovieScoringEngine};
pub use recompute_lock::RecomputeLocks;
pub use restaurant_scoring::{RestaurantRecalculation, RestaurantScoringEngine};

use crate::error::{AppError, AppResult};

/// Rejects a missing user id before any data access
pub fn validate_user_id(user_id: &str) -> AppResult<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("userId is required".to_string()));
    }
    Ok(())
}
