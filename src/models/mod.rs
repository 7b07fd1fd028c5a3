pub mod movie;
pub mod preference;
pub mod restaurant;
pub mod user;

pub use movie::{MediaType, Movie, MovieAggregateScore, MovieRating};
pub use preference::{ScoringDomain, WeightPreference, DEFAULT_WEIGHT};
pub use restaurant::{
    Availability, RatingType, Restaurant, RestaurantAggregateScore, RestaurantRating,
};
pub use user::{User, UserStatus};

/// Highest score on the rating scale
pub const MAX_SCORE: f64 = 10.0;
