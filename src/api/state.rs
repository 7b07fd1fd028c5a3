use std::sync::Arc;

use crate::{
    db::{MovieStore, RestaurantStore, UserDirectory, WeightPreferenceStore},
    services::{MovieScoringEngine, RecomputeLocks, RestaurantScoringEngine},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub preferences: Arc<dyn WeightPreferenceStore>,
    pub movies: Arc<dyn MovieStore>,
    pub restaurants: Arc<dyn RestaurantStore>,
    pub movie_scoring: Arc<MovieScoringEngine>,
    pub restaurant_scoring: Arc<RestaurantScoringEngine>,
}

impl AppState {
    /// Wires both scoring engines to a store implementing every storage trait
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: UserDirectory + WeightPreferenceStore + MovieStore + RestaurantStore + 'static,
    {
        let users: Arc<dyn UserDirectory> = store.clone();
        let preferences: Arc<dyn WeightPreferenceStore> = store.clone();
        let movies: Arc<dyn MovieStore> = store.clone();
        let restaurants: Arc<dyn RestaurantStore> = store;

        // Keyed by (domain, user): a user's movie and restaurant runs never wait on each other
        let locks = RecomputeLocks::new();

        Self {
            movie_scoring: Arc::new(MovieScoringEngine::new(
                preferences.clone(),
                movies.clone(),
                locks.clone(),
            )),
            restaurant_scoring: Arc::new(RestaurantScoringEngine::new(
                users.clone(),
                preferences.clone(),
                restaurants.clone(),
                locks,
            )),
            users,
            preferences,
            movies,
            restaurants,
        }
    }
}
