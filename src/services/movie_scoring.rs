use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    db::{MovieStore, WeightPreferenceStore},
    error::AppResult,
    models::{Movie, MovieAggregateScore, MovieRating, ScoringDomain},
    services::{
        recompute_lock::RecomputeLocks,
        validate_user_id,
        weighting::{ContributorWeights, WeightedAverage},
    },
};

pub const NO_FRIENDS_MESSAGE: &str = "No friends selected";

/// Outcome of one movie recomputation, surfaced to the user as a notification
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieRecalculation {
    pub message: String,
    /// Number of movies that received a score
    pub scored: usize,
}

/// Recomputes a user's friend-weighted movie scores
pub struct MovieScoringEngine {
    preferences: Arc<dyn WeightPreferenceStore>,
    movies: Arc<dyn MovieStore>,
    locks: RecomputeLocks,
}

impl MovieScoringEngine {
    pub fn new(
        preferences: Arc<dyn WeightPreferenceStore>,
        movies: Arc<dyn MovieStore>,
        locks: RecomputeLocks,
    ) -> Self {
        Self {
            preferences,
            movies,
            locks,
        }
    }

    /// Recomputes and persists the user's aggregate score for every movie.
    ///
    /// The user's own rating counts at weight 1.0 next to their selected friends.
    /// With no friends selected, any stored scores are cleared instead: a score is
    /// only meaningful once at least one friend is configured.
    ///
    /// The stored set is replaced in one transaction; on error the previous set stays.
    pub async fn recalculate(&self, user_id: &str) -> AppResult<MovieRecalculation> {
        validate_user_id(user_id)?;

        let _guard = self.locks.acquire(ScoringDomain::Movies, user_id).await;
        let start = Instant::now();

        let preferences = self
            .preferences
            .list_preferences(ScoringDomain::Movies, user_id)
            .await?;

        if preferences.is_empty() {
            self.movies
                .replace_movie_aggregate_scores(user_id, &[])
                .await?;

            tracing::info!(user_id = %user_id, "No friends selected, cleared movie scores");

            return Ok(MovieRecalculation {
                message: NO_FRIENDS_MESSAGE.to_string(),
                scored: 0,
            });
        }

        let weights = ContributorWeights::new(user_id, &preferences);

        // One batch read for every contributor, then one catalog read
        let ratings = self
            .movies
            .list_movie_ratings(&weights.user_ids())
            .await?;
        let catalog = self.movies.list_movies().await?;

        tracing::debug!(
            user_id = %user_id,
            friends = weights.friend_count(),
            ratings = ratings.len(),
            movies = catalog.len(),
            "Loaded movie scoring inputs"
        );

        let scores = compute_movie_scores(&weights, &ratings, &catalog, Utc::now());

        self.movies
            .replace_movie_aggregate_scores(user_id, &scores)
            .await?;

        tracing::info!(
            user_id = %user_id,
            scored = scores.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Movie aggregate scores recalculated"
        );

        Ok(MovieRecalculation {
            message: format!("Calculated aggregate scores for {} movies", scores.len()),
            scored: scores.len(),
        })
    }
}

/// Computes one weighted-average score per catalog movie.
///
/// Ratings of 0 count as "not rated". Movies whose contributing ratings carry no
/// positive weight get no row at all.
pub fn compute_movie_scores(
    weights: &ContributorWeights,
    ratings: &[MovieRating],
    catalog: &[Movie],
    calculated_at: DateTime<Utc>,
) -> Vec<MovieAggregateScore> {
    let mut by_movie: HashMap<&str, Vec<&MovieRating>> = HashMap::new();
    for rating in ratings.iter().filter(|r| r.is_rated()) {
        by_movie
            .entry(rating.movie_id.as_str())
            .or_default()
            .push(rating);
    }

    catalog
        .iter()
        .filter_map(|movie| {
            let movie_ratings = by_movie.get(movie.id.as_str())?;

            let mut average = WeightedAverage::new();
            for rating in movie_ratings {
                if let Some(weight) = weights.weight_of(&rating.user_id) {
                    average.add(rating.score, weight);
                }
            }

            average.value().map(|score| MovieAggregateScore {
                user_id: weights.owner_id().to_string(),
                movie_id: movie.id.clone(),
                score,
                calculated_at,
            })
        })
        .collect()
}
