//! Storage seams used by the scoring engines and the HTTP layer.
//!
//! Every trait is implemented by [`PgStore`](super::PgStore) for production and by
//! [`MemoryStore`](super::MemoryStore) for local runs and tests.

use crate::{
    error::AppResult,
    models::{
        Movie, MovieAggregateScore, MovieRating, RatingType, Restaurant,
        RestaurantAggregateScore, RestaurantRating, ScoringDomain, User, WeightPreference,
    },
};

/// Read access to user accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>>;

    /// Ids of every user whose status is ACTIVE
    async fn list_active_user_ids(&self) -> AppResult<Vec<String>>;
}

/// Which friends a user includes in their aggregate scores, and how strongly
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WeightPreferenceStore: Send + Sync {
    /// Lists a user's preferences joined with each friend's account status
    async fn list_preferences(
        &self,
        domain: ScoringDomain,
        user_id: &str,
    ) -> AppResult<Vec<WeightPreference>>;

    async fn upsert_preference(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_id: &str,
        weight: f64,
    ) -> AppResult<()>;

    /// Returns false when no preference existed for the pair
    async fn delete_preference(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_id: &str,
    ) -> AppResult<bool>;

    /// Inserts `weight` for every listed friend that has no preference yet.
    /// Existing weights are left alone. Returns the number of rows inserted.
    async fn include_friends(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_ids: &[String],
        weight: f64,
    ) -> AppResult<u64>;

    /// Removes the preferences for every listed friend. Returns the number of rows removed.
    async fn exclude_friends(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_ids: &[String],
    ) -> AppResult<u64>;
}

/// Movie catalog, movie ratings and per-user movie aggregate scores
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieStore: Send + Sync {
    async fn list_movies(&self) -> AppResult<Vec<Movie>>;

    async fn get_movie(&self, movie_id: &str) -> AppResult<Option<Movie>>;

    /// All movie ratings made by any of `user_ids`, in one read
    async fn list_movie_ratings(&self, user_ids: &[String]) -> AppResult<Vec<MovieRating>>;

    async fn upsert_movie_rating(&self, rating: &MovieRating) -> AppResult<()>;

    async fn delete_movie_rating(&self, user_id: &str, movie_id: &str) -> AppResult<bool>;

    async fn list_movie_aggregate_scores(&self, user_id: &str)
        -> AppResult<Vec<MovieAggregateScore>>;

    /// Atomically swaps the user's stored scores for `scores`.
    /// Readers observe either the old set or the new one, never a mix.
    async fn replace_movie_aggregate_scores(
        &self,
        user_id: &str,
        scores: &[MovieAggregateScore],
    ) -> AppResult<()>;
}

/// Restaurant catalog, per-track ratings and per-user restaurant aggregate scores
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RestaurantStore: Send + Sync {
    async fn list_restaurants(&self) -> AppResult<Vec<Restaurant>>;

    async fn get_restaurant(&self, restaurant_id: &str) -> AppResult<Option<Restaurant>>;

    /// All restaurant ratings made by any of `user_ids`, in one read
    async fn list_restaurant_ratings(
        &self,
        user_ids: &[String],
    ) -> AppResult<Vec<RestaurantRating>>;

    async fn upsert_restaurant_rating(&self, rating: &RestaurantRating) -> AppResult<()>;

    async fn delete_restaurant_rating(
        &self,
        user_id: &str,
        restaurant_id: &str,
        rating_type: RatingType,
    ) -> AppResult<bool>;

    async fn list_restaurant_aggregate_scores(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<RestaurantAggregateScore>>;

    /// Upserts every row in `scores` and removes the user's rows for restaurants
    /// not present in `scores`, as one transaction.
    async fn replace_restaurant_aggregate_scores(
        &self,
        user_id: &str,
        scores: &[RestaurantAggregateScore],
    ) -> AppResult<()>;
}
