use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    db::store::{MovieStore, RestaurantStore, UserDirectory, WeightPreferenceStore},
    error::{AppError, AppResult},
    models::{
        Movie, MovieAggregateScore, MovieRating, RatingType, Restaurant,
        RestaurantAggregateScore, RestaurantRating, ScoringDomain, User, WeightPreference,
    },
};

type PairKey = (String, String);

/// Process-local store with the same semantics as the PostgreSQL one.
///
/// Preference and rating writes reject unknown users, movies and restaurants the
/// way the schema's foreign keys do, as `NotFound`. Aggregate score rows are not
/// checked. Each operation takes the lock once, so the replace operations are
/// atomic for concurrent readers.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: BTreeMap<String, User>,
    movies: BTreeMap<String, Movie>,
    restaurants: BTreeMap<String, Restaurant>,
    preferences: HashMap<ScoringDomain, BTreeMap<PairKey, f64>>,
    movie_ratings: HashMap<PairKey, f64>,
    restaurant_ratings: HashMap<(String, String, RatingType), RestaurantRating>,
    movie_scores: HashMap<String, Vec<MovieAggregateScore>>,
    restaurant_scores: BTreeMap<PairKey, RestaurantAggregateScore>,
}

impl MemoryStoreInner {
    fn require_user(&self, user_id: &str) -> AppResult<()> {
        if self.users.contains_key(user_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("User {} not found", user_id)))
        }
    }

    fn require_movie(&self, movie_id: &str) -> AppResult<()> {
        if self.movies.contains_key(movie_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Movie {} not found", movie_id)))
        }
    }

    fn require_restaurant(&self, restaurant_id: &str) -> AppResult<()> {
        if self.restaurants.contains_key(restaurant_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Restaurant {} not found",
                restaurant_id
            )))
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id.clone(), user);
    }

    pub async fn insert_movie(&self, movie: Movie) {
        let mut inner = self.inner.write().await;
        inner.movies.insert(movie.id.clone(), movie);
    }

    pub async fn insert_restaurant(&self, restaurant: Restaurant) {
        let mut inner = self.inner.write().await;
        inner.restaurants.insert(restaurant.id.clone(), restaurant);
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryStore {
    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(user_id).cloned())
    }

    async fn list_active_user_ids(&self) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| u.is_active())
            .map(|u| u.id.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl WeightPreferenceStore for MemoryStore {
    async fn list_preferences(
        &self,
        domain: ScoringDomain,
        user_id: &str,
    ) -> AppResult<Vec<WeightPreference>> {
        let inner = self.inner.read().await;
        let Some(table) = inner.preferences.get(&domain) else {
            return Ok(Vec::new());
        };

        // Inner join on users, like the SQL query
        Ok(table
            .iter()
            .filter(|((owner, _), _)| owner == user_id)
            .filter_map(|((owner, friend), weight)| {
                inner.users.get(friend).map(|f| WeightPreference {
                    user_id: owner.clone(),
                    friend_id: friend.clone(),
                    weight: *weight,
                    friend_status: f.status,
                })
            })
            .collect())
    }

    async fn upsert_preference(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_id: &str,
        weight: f64,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_user(user_id)?;
        inner.require_user(friend_id)?;
        inner
            .preferences
            .entry(domain)
            .or_default()
            .insert((user_id.to_string(), friend_id.to_string()), weight);
        Ok(())
    }

    async fn delete_preference(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_id: &str,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner
            .preferences
            .get_mut(&domain)
            .and_then(|table| table.remove(&(user_id.to_string(), friend_id.to_string())));
        Ok(removed.is_some())
    }

    async fn include_friends(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_ids: &[String],
        weight: f64,
    ) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        inner.require_user(user_id)?;
        for friend_id in friend_ids {
            inner.require_user(friend_id)?;
        }
        let table = inner.preferences.entry(domain).or_default();

        let mut inserted = 0;
        for friend_id in friend_ids {
            let key = (user_id.to_string(), friend_id.clone());
            if !table.contains_key(&key) {
                table.insert(key, weight);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn exclude_friends(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_ids: &[String],
    ) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let Some(table) = inner.preferences.get_mut(&domain) else {
            return Ok(0);
        };

        let mut removed = 0;
        for friend_id in friend_ids {
            if table
                .remove(&(user_id.to_string(), friend_id.clone()))
                .is_some()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl MovieStore for MemoryStore {
    async fn list_movies(&self) -> AppResult<Vec<Movie>> {
        let inner = self.inner.read().await;
        Ok(inner.movies.values().cloned().collect())
    }

    async fn get_movie(&self, movie_id: &str) -> AppResult<Option<Movie>> {
        let inner = self.inner.read().await;
        Ok(inner.movies.get(movie_id).cloned())
    }

    async fn list_movie_ratings(&self, user_ids: &[String]) -> AppResult<Vec<MovieRating>> {
        let wanted: HashSet<&str> = user_ids.iter().map(String::as_str).collect();
        let inner = self.inner.read().await;
        Ok(inner
            .movie_ratings
            .iter()
            .filter(|((user_id, _), _)| wanted.contains(user_id.as_str()))
            .map(|((user_id, movie_id), score)| MovieRating {
                user_id: user_id.clone(),
                movie_id: movie_id.clone(),
                score: *score,
            })
            .collect())
    }

    async fn upsert_movie_rating(&self, rating: &MovieRating) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_user(&rating.user_id)?;
        inner.require_movie(&rating.movie_id)?;
        inner.movie_ratings.insert(
            (rating.user_id.clone(), rating.movie_id.clone()),
            rating.score,
        );
        Ok(())
    }

    async fn delete_movie_rating(&self, user_id: &str, movie_id: &str) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .movie_ratings
            .remove(&(user_id.to_string(), movie_id.to_string()))
            .is_some())
    }

    async fn list_movie_aggregate_scores(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<MovieAggregateScore>> {
        let inner = self.inner.read().await;
        let mut scores = inner.movie_scores.get(user_id).cloned().unwrap_or_default();
        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });
        Ok(scores)
    }

    async fn replace_movie_aggregate_scores(
        &self,
        user_id: &str,
        scores: &[MovieAggregateScore],
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if scores.is_empty() {
            inner.movie_scores.remove(user_id);
        } else {
            inner
                .movie_scores
                .insert(user_id.to_string(), scores.to_vec());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RestaurantStore for MemoryStore {
    async fn list_restaurants(&self) -> AppResult<Vec<Restaurant>> {
        let inner = self.inner.read().await;
        Ok(inner.restaurants.values().cloned().collect())
    }

    async fn get_restaurant(&self, restaurant_id: &str) -> AppResult<Option<Restaurant>> {
        let inner = self.inner.read().await;
        Ok(inner.restaurants.get(restaurant_id).cloned())
    }

    async fn list_restaurant_ratings(
        &self,
        user_ids: &[String],
    ) -> AppResult<Vec<RestaurantRating>> {
        let wanted: HashSet<&str> = user_ids.iter().map(String::as_str).collect();
        let inner = self.inner.read().await;
        Ok(inner
            .restaurant_ratings
            .values()
            .filter(|r| wanted.contains(r.user_id.as_str()))
            .cloned()
            .collect())
    }

    async fn upsert_restaurant_rating(&self, rating: &RestaurantRating) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_user(&rating.user_id)?;
        inner.require_restaurant(&rating.restaurant_id)?;
        inner.restaurant_ratings.insert(
            (
                rating.user_id.clone(),
                rating.restaurant_id.clone(),
                rating.rating_type,
            ),
            rating.clone(),
        );
        Ok(())
    }

    async fn delete_restaurant_rating(
        &self,
        user_id: &str,
        restaurant_id: &str,
        rating_type: RatingType,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .restaurant_ratings
            .remove(&(user_id.to_string(), restaurant_id.to_string(), rating_type))
            .is_some())
    }

    async fn list_restaurant_aggregate_scores(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<RestaurantAggregateScore>> {
        let inner = self.inner.read().await;
        Ok(inner
            .restaurant_scores
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn replace_restaurant_aggregate_scores(
        &self,
        user_id: &str,
        scores: &[RestaurantAggregateScore],
    ) -> AppResult<()> {
        let keep: HashSet<&str> = scores.iter().map(|s| s.restaurant_id.as_str()).collect();
        let mut inner = self.inner.write().await;

        inner
            .restaurant_scores
            .retain(|(owner, restaurant_id), _| {
                owner != user_id || keep.contains(restaurant_id.as_str())
            });

        for score in scores {
            inner.restaurant_scores.insert(
                (user_id.to_string(), score.restaurant_id.clone()),
                score.clone(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, UserStatus};
    use chrono::Utc;

    async fn store_with_users() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_user(User::new("alice", "Alice", UserStatus::Active))
            .await;
        store
            .insert_user(User::new("bob", "Bob", UserStatus::Active))
            .await;
        store
            .insert_user(User::new("carol", "Carol", UserStatus::Pending))
            .await;
        store
    }

    #[tokio::test]
    async fn test_list_active_user_ids_skips_pending() {
        let store = store_with_users().await;
        let ids = store.list_active_user_ids().await.unwrap();
        assert_eq!(ids, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn test_preferences_are_scoped_by_domain() {
        let store = store_with_users().await;
        store
            .upsert_preference(ScoringDomain::Movies, "alice", "bob", 0.5)
            .await
            .unwrap();

        let movies = store
            .list_preferences(ScoringDomain::Movies, "alice")
            .await
            .unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].weight, 0.5);
        assert_eq!(movies[0].friend_status, UserStatus::Active);

        let restaurants = store
            .list_preferences(ScoringDomain::Restaurants, "alice")
            .await
            .unwrap();
        assert!(restaurants.is_empty());
    }

    #[tokio::test]
    async fn test_include_friends_keeps_existing_weights() {
        let store = store_with_users().await;
        store
            .upsert_preference(ScoringDomain::Movies, "alice", "bob", 1.7)
            .await
            .unwrap();

        let inserted = store
            .include_friends(
                ScoringDomain::Movies,
                "alice",
                &["bob".to_string(), "carol".to_string()],
                1.0,
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let prefs = store
            .list_preferences(ScoringDomain::Movies, "alice")
            .await
            .unwrap();
        let bob = prefs.iter().find(|p| p.friend_id == "bob").unwrap();
        assert_eq!(bob.weight, 1.7);
    }

    #[tokio::test]
    async fn test_preference_writes_reject_unknown_users() {
        let store = store_with_users().await;

        let result = store
            .upsert_preference(ScoringDomain::Restaurants, "ghost", "alice", 1.0)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = store
            .include_friends(
                ScoringDomain::Movies,
                "alice",
                &["bob".to_string(), "ghost".to_string()],
                1.0,
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Nothing from the rejected batch is kept
        let prefs = store
            .list_preferences(ScoringDomain::Movies, "alice")
            .await
            .unwrap();
        assert!(prefs.is_empty());
    }

    #[tokio::test]
    async fn test_rating_writes_reject_unknown_items() {
        let store = store_with_users().await;

        let result = store
            .upsert_movie_rating(&MovieRating {
                user_id: "alice".to_string(),
                movie_id: "missing".to_string(),
                score: 7.0,
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        store.insert_restaurant(Restaurant::new("r1", "Udupi")).await;
        let result = store
            .upsert_restaurant_rating(&RestaurantRating {
                user_id: "ghost".to_string(),
                restaurant_id: "r1".to_string(),
                rating_type: RatingType::Veg,
                score: Some(8.0),
                availability: Default::default(),
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_replace_movie_scores_drops_previous_rows() {
        let store = store_with_users().await;
        store
            .insert_movie(Movie::new("m1", "Heat", MediaType::Movie))
            .await;
        let row = |movie_id: &str, score: f64| MovieAggregateScore {
            user_id: "alice".to_string(),
            movie_id: movie_id.to_string(),
            score,
            calculated_at: Utc::now(),
        };

        store
            .replace_movie_aggregate_scores("alice", &[row("m1", 7.0), row("m2", 9.0)])
            .await
            .unwrap();
        store
            .replace_movie_aggregate_scores("alice", &[row("m1", 6.0)])
            .await
            .unwrap();

        let scores = store.list_movie_aggregate_scores("alice").await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 6.0);
    }

    #[tokio::test]
    async fn test_replace_restaurant_scores_leaves_other_users_alone() {
        let store = store_with_users().await;
        let row = |user_id: &str, restaurant_id: &str| RestaurantAggregateScore {
            user_id: user_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            veg_score: Some(8.0),
            non_veg_score: None,
            veg_count: 1,
            non_veg_count: 0,
            confidence: 0.2,
            calculated_at: Utc::now(),
        };

        store
            .replace_restaurant_aggregate_scores("bob", &[row("bob", "r1")])
            .await
            .unwrap();
        store
            .replace_restaurant_aggregate_scores("alice", &[row("alice", "r1"), row("alice", "r2")])
            .await
            .unwrap();
        store
            .replace_restaurant_aggregate_scores("alice", &[row("alice", "r2")])
            .await
            .unwrap();

        let alice = store.list_restaurant_aggregate_scores("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].restaurant_id, "r2");

        let bob = store.list_restaurant_aggregate_scores("bob").await.unwrap();
        assert_eq!(bob.len(), 1);
    }
}
