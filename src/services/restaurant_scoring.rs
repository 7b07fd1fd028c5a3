use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    db::{RestaurantStore, UserDirectory, WeightPreferenceStore},
    error::{AppError, AppResult},
    models::{
        RatingType, Restaurant, RestaurantAggregateScore, RestaurantRating, ScoringDomain,
        UserStatus, DEFAULT_WEIGHT,
    },
    services::{
        recompute_lock::RecomputeLocks,
        validate_user_id,
        weighting::{round2, ContributorWeights, WeightedAverage},
    },
};

/// Combined rating count at which confidence reaches 1.0
pub const FULL_CONFIDENCE_RATINGS: f64 = 5.0;

/// Outcome of one restaurant recomputation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RestaurantRecalculation {
    pub success: bool,
    pub message: String,
    pub results: Vec<RestaurantAggregateScore>,
}

/// Score and rating count of one dietary track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackScore {
    pub score: f64,
    pub count: i32,
}

/// Recomputes a user's friend-weighted veg / non-veg restaurant scores
pub struct RestaurantScoringEngine {
    users: Arc<dyn UserDirectory>,
    preferences: Arc<dyn WeightPreferenceStore>,
    restaurants: Arc<dyn RestaurantStore>,
    locks: RecomputeLocks,
}

impl RestaurantScoringEngine {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        preferences: Arc<dyn WeightPreferenceStore>,
        restaurants: Arc<dyn RestaurantStore>,
        locks: RecomputeLocks,
    ) -> Self {
        Self {
            users,
            preferences,
            restaurants,
            locks,
        }
    }

    /// Recomputes and persists the user's veg and non-veg score for every restaurant.
    ///
    /// Unlike movies, the user's own ratings always count, so a user with no friends
    /// still gets scores for the restaurants they rated themself. Only ACTIVE friends
    /// contribute.
    pub async fn recalculate(&self, user_id: &str) -> AppResult<RestaurantRecalculation> {
        validate_user_id(user_id)?;
        if self.users.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        let _guard = self
            .locks
            .acquire(ScoringDomain::Restaurants, user_id)
            .await;
        let start = Instant::now();

        self.ensure_default_preferences(user_id).await?;

        let preferences = self
            .preferences
            .list_preferences(ScoringDomain::Restaurants, user_id)
            .await?;
        let active_friends: Vec<_> = preferences
            .iter()
            .filter(|p| p.friend_status == UserStatus::Active)
            .collect();
        let skipped_inactive = preferences.len() - active_friends.len();
        let weights = ContributorWeights::new(user_id, active_friends);

        let ratings = self
            .restaurants
            .list_restaurant_ratings(&weights.user_ids())
            .await?;
        let catalog = self.restaurants.list_restaurants().await?;

        tracing::debug!(
            user_id = %user_id,
            friends = weights.friend_count(),
            skipped_inactive,
            ratings = ratings.len(),
            restaurants = catalog.len(),
            "Loaded restaurant scoring inputs"
        );

        let results = compute_restaurant_scores(&weights, &ratings, &catalog, Utc::now());

        self.restaurants
            .replace_restaurant_aggregate_scores(user_id, &results)
            .await?;

        tracing::info!(
            user_id = %user_id,
            scored = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Restaurant aggregate scores recalculated"
        );

        Ok(RestaurantRecalculation {
            success: true,
            message: format!(
                "Calculated aggregate scores for {} restaurants",
                results.len()
            ),
            results,
        })
    }

    /// First run: a user with no restaurant preferences starts out including every
    /// other active user at the default weight.
    async fn ensure_default_preferences(&self, user_id: &str) -> AppResult<()> {
        let existing = self
            .preferences
            .list_preferences(ScoringDomain::Restaurants, user_id)
            .await?;
        if !existing.is_empty() {
            return Ok(());
        }

        let others: Vec<String> = self
            .users
            .list_active_user_ids()
            .await?
            .into_iter()
            .filter(|id| id != user_id)
            .collect();
        if others.is_empty() {
            return Ok(());
        }

        let inserted = self
            .preferences
            .include_friends(ScoringDomain::Restaurants, user_id, &others, DEFAULT_WEIGHT)
            .await?;

        tracing::info!(
            user_id = %user_id,
            friends = inserted,
            "Initialized default restaurant weight preferences"
        );

        Ok(())
    }
}

/// Computes veg / non-veg scores, counts and confidence for every catalog restaurant.
///
/// Restaurants without a score on either track get no row.
pub fn compute_restaurant_scores(
    weights: &ContributorWeights,
    ratings: &[RestaurantRating],
    catalog: &[Restaurant],
    calculated_at: DateTime<Utc>,
) -> Vec<RestaurantAggregateScore> {
    let mut by_restaurant: HashMap<&str, Vec<&RestaurantRating>> = HashMap::new();
    for rating in ratings {
        by_restaurant
            .entry(rating.restaurant_id.as_str())
            .or_default()
            .push(rating);
    }

    catalog
        .iter()
        .filter_map(|restaurant| {
            let restaurant_ratings = by_restaurant.get(restaurant.id.as_str())?;

            let veg = score_track(weights, restaurant_ratings, RatingType::Veg);
            let non_veg = score_track(weights, restaurant_ratings, RatingType::NonVeg);
            if veg.is_none() && non_veg.is_none() {
                return None;
            }

            let veg_count = veg.map_or(0, |t| t.count);
            let non_veg_count = non_veg.map_or(0, |t| t.count);

            Some(RestaurantAggregateScore {
                user_id: weights.owner_id().to_string(),
                restaurant_id: restaurant.id.clone(),
                veg_score: veg.map(|t| round2(t.score)),
                non_veg_score: non_veg.map(|t| round2(t.score)),
                veg_count,
                non_veg_count,
                confidence: confidence(veg_count, non_veg_count),
                calculated_at,
            })
        })
        .collect()
}

/// Aggregates one dietary track of one restaurant.
///
/// Only AVAILABLE ratings with a score from a contributor take part. When the owner
/// is the only one who rated the track, their score is used as is with a count of 1.
pub fn score_track(
    weights: &ContributorWeights,
    ratings: &[&RestaurantRating],
    rating_type: RatingType,
) -> Option<TrackScore> {
    let usable: Vec<(&str, f64)> = ratings
        .iter()
        .filter(|r| r.rating_type == rating_type)
        .filter(|r| weights.weight_of(&r.user_id).is_some())
        .filter_map(|r| r.usable_score().map(|score| (r.user_id.as_str(), score)))
        .collect();

    if usable.is_empty() {
        return None;
    }

    let own = usable.iter().find(|(id, _)| weights.is_owner(id));
    let has_friend_rating = usable.iter().any(|(id, _)| !weights.is_owner(id));

    if let (Some((_, own_score)), false) = (own, has_friend_rating) {
        return Some(TrackScore {
            score: *own_score,
            count: 1,
        });
    }

    let mut average = WeightedAverage::new();
    for (user_id, score) in &usable {
        if let Some(weight) = weights.weight_of(user_id) {
            average.add(*score, weight);
        }
    }

    average.value().map(|score| TrackScore {
        score,
        count: average.contributions() as i32,
    })
}

/// Volume based confidence: `min(total / 5, 1)`, rounded to two decimals
pub fn confidence(veg_count: i32, non_veg_count: i32) -> f64 {
    let total = (veg_count + non_veg_count) as f64;
    round2((total / FULL_CONFIDENCE_RATINGS).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            store::{MockRestaurantStore, MockUserDirectory, MockWeightPreferenceStore},
            MemoryStore,
        },
        models::{Availability, User, WeightPreference},
    };

    fn pref(friend_id: &str, weight: f64, friend_status: UserStatus) -> WeightPreference {
        WeightPreference {
            user_id: "u".to_string(),
            friend_id: friend_id.to_string(),
            weight,
            friend_status,
        }
    }

    fn rated(user_id: &str, rating_type: RatingType, score: f64) -> RestaurantRating {
        RestaurantRating {
            user_id: user_id.to_string(),
            restaurant_id: "r".to_string(),
            rating_type,
            score: Some(score),
            availability: Availability::Available,
        }
    }

    fn compute(
        weights: &ContributorWeights,
        ratings: &[RestaurantRating],
    ) -> Vec<RestaurantAggregateScore> {
        let catalog = [Restaurant::new("r", "Dosa Hut")];
        compute_restaurant_scores(weights, ratings, &catalog, Utc::now())
    }

    #[test]
    fn test_own_rating_alone_uses_bootstrap_rule() {
        let weights = ContributorWeights::new("u", &[pref("f", 1.0, UserStatus::Active)]);
        let scores = compute(&weights, &[rated("u", RatingType::Veg, 7.0)]);

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].veg_score, Some(7.0));
        assert_eq!(scores[0].veg_count, 1);
        assert_eq!(scores[0].non_veg_score, None);
        assert_eq!(scores[0].non_veg_count, 0);
    }

    #[test]
    fn test_bootstrap_rule_without_any_friends() {
        let weights = ContributorWeights::new("u", &Vec::<WeightPreference>::new());
        let scores = compute(&weights, &[rated("u", RatingType::Veg, 8.0)]);

        assert_eq!(scores[0].veg_score, Some(8.0));
        assert_eq!(scores[0].veg_count, 1);
    }

    #[test]
    fn test_tracks_are_aggregated_independently() {
        let weights = ContributorWeights::new(
            "u",
            &[
                pref("f1", 0.5, UserStatus::Active),
                pref("f2", 2.0, UserStatus::Active),
            ],
        );
        let ratings = vec![
            rated("u", RatingType::Veg, 6.0),
            rated("f1", RatingType::Veg, 9.0),
            rated("f2", RatingType::NonVeg, 4.0),
        ];

        let scores = compute(&weights, &ratings);

        // (6·1 + 9·0.5) / 1.5 = 7.0
        assert_eq!(scores[0].veg_score, Some(7.0));
        assert_eq!(scores[0].veg_count, 2);
        assert_eq!(scores[0].non_veg_score, Some(4.0));
        assert_eq!(scores[0].non_veg_count, 1);
        assert_eq!(scores[0].confidence, 0.6);
    }

    #[test]
    fn test_scores_are_rounded_to_two_decimals() {
        let weights = ContributorWeights::new("u", &[pref("f", 2.0, UserStatus::Active)]);
        let ratings = vec![
            rated("u", RatingType::NonVeg, 5.0),
            rated("f", RatingType::NonVeg, 6.0),
        ];

        let scores = compute(&weights, &ratings);
        assert_eq!(scores[0].non_veg_score, Some(5.67));
    }

    #[test]
    fn test_not_available_rating_is_ignored() {
        let weights = ContributorWeights::new("u", &[pref("f", 1.0, UserStatus::Active)]);
        let mut unavailable = rated("f", RatingType::Veg, 1.0);
        unavailable.availability = Availability::NotAvailable;

        let scores = compute(&weights, &[rated("u", RatingType::Veg, 9.0), unavailable]);

        assert_eq!(scores[0].veg_score, Some(9.0));
        assert_eq!(scores[0].veg_count, 1);
    }

    #[test]
    fn test_null_score_is_ignored() {
        let weights = ContributorWeights::new("u", &[pref("f", 1.0, UserStatus::Active)]);
        let mut unscored = rated("f", RatingType::Veg, 0.0);
        unscored.score = None;

        let scores = compute(&weights, &[unscored]);
        assert!(scores.is_empty());
    }

    #[test]
    fn test_zero_weight_friends_give_no_score() {
        let weights = ContributorWeights::new("u", &[pref("f", 0.0, UserStatus::Active)]);
        let scores = compute(&weights, &[rated("f", RatingType::NonVeg, 9.0)]);
        assert!(scores.is_empty());
    }

    #[test]
    fn test_confidence_formula() {
        assert_eq!(confidence(2, 1), 0.6);
        assert_eq!(confidence(6, 2), 1.0);
        assert_eq!(confidence(0, 1), 0.2);
    }

    #[tokio::test]
    async fn test_pending_friend_is_excluded() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(User::new("u", "Uma", UserStatus::Active))
            .await;
        store
            .insert_user(User::new("f", "Faiz", UserStatus::Pending))
            .await;
        store.insert_restaurant(Restaurant::new("r", "Grill")).await;
        store
            .upsert_preference(ScoringDomain::Restaurants, "u", "f", 1.0)
            .await
            .unwrap();
        store
            .upsert_restaurant_rating(&rated("f", RatingType::NonVeg, 9.0))
            .await
            .unwrap();

        let engine = RestaurantScoringEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            RecomputeLocks::new(),
        );
        let outcome = engine.recalculate("u").await.unwrap();

        assert!(outcome.success);
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn test_first_run_includes_other_active_users() {
        let store = Arc::new(MemoryStore::new());
        for (id, status) in [
            ("u", UserStatus::Active),
            ("a", UserStatus::Active),
            ("p", UserStatus::Pending),
        ] {
            store.insert_user(User::new(id, id, status)).await;
        }
        store.insert_restaurant(Restaurant::new("r", "Grill")).await;
        store
            .upsert_restaurant_rating(&rated("a", RatingType::Veg, 6.0))
            .await
            .unwrap();

        let engine = RestaurantScoringEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            RecomputeLocks::new(),
        );
        let outcome = engine.recalculate("u").await.unwrap();

        let prefs = store
            .list_preferences(ScoringDomain::Restaurants, "u")
            .await
            .unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].friend_id, "a");
        assert_eq!(prefs[0].weight, DEFAULT_WEIGHT);

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].veg_score, Some(6.0));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found_and_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(User::new("a", "Asha", UserStatus::Active))
            .await;

        let engine = RestaurantScoringEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            RecomputeLocks::new(),
        );
        let result = engine.recalculate("ghost").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let prefs = store
            .list_preferences(ScoringDomain::Restaurants, "ghost")
            .await
            .unwrap();
        assert!(prefs.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_propagated() {
        let mut users = MockUserDirectory::new();
        users
            .expect_get_user()
            .returning(|id| Ok(Some(User::new(id, id, UserStatus::Active))));
        users.expect_list_active_user_ids().never();

        let mut preferences = MockWeightPreferenceStore::new();
        preferences
            .expect_list_preferences()
            .returning(|_, _| Ok(vec![pref("f", 1.0, UserStatus::Active)]));

        let mut restaurants = MockRestaurantStore::new();
        restaurants
            .expect_list_restaurant_ratings()
            .returning(|_| Ok(vec![rated("f", RatingType::Veg, 5.0)]));
        restaurants
            .expect_list_restaurants()
            .returning(|| Ok(vec![Restaurant::new("r", "Grill")]));
        restaurants
            .expect_replace_restaurant_aggregate_scores()
            .returning(|_, _| Err(AppError::Internal("write failed".to_string())));

        let engine = RestaurantScoringEngine::new(
            Arc::new(users),
            Arc::new(preferences),
            Arc::new(restaurants),
            RecomputeLocks::new(),
        );

        let result = engine.recalculate("u").await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
