use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{
        Availability, MovieAggregateScore, RatingType, RestaurantAggregateScore,
        RestaurantRating, ScoringDomain, WeightPreference,
    },
    services::{ratings, weight_preferences, MovieRecalculation, RestaurantRecalculation},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct SetWeightRequest {
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct FriendInclusionRequest {
    pub friend_ids: Vec<String>,
    pub included: bool,
}

#[derive(Debug, Serialize)]
pub struct FriendInclusionResponse {
    pub changed: u64,
}

#[derive(Debug, Deserialize)]
pub struct RateMovieRequest {
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct RateRestaurantRequest {
    pub rating_type: RatingType,
    pub score: Option<f64>,
    #[serde(default)]
    pub availability: Availability,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Recompute the user's movie scores from their current friends and ratings
pub async fn recalculate_movie_scores(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> AppResult<Json<MovieRecalculation>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        "Processing movie score recalculation"
    );

    let outcome = state.movie_scoring.recalculate(&user_id).await?;
    Ok(Json(outcome))
}

/// Get the user's stored movie scores, best first
pub async fn get_movie_scores(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<MovieAggregateScore>>> {
    let scores = state.movies.list_movie_aggregate_scores(&user_id).await?;
    Ok(Json(scores))
}

/// Recompute the user's veg / non-veg restaurant scores
pub async fn recalculate_restaurant_scores(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> AppResult<Json<RestaurantRecalculation>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        "Processing restaurant score recalculation"
    );

    let outcome = state.restaurant_scoring.recalculate(&user_id).await?;
    Ok(Json(outcome))
}

/// Get the user's stored restaurant scores
pub async fn get_restaurant_scores(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<RestaurantAggregateScore>>> {
    let scores = state
        .restaurants
        .list_restaurant_aggregate_scores(&user_id)
        .await?;
    Ok(Json(scores))
}

/// List the friends the user includes in one domain
pub async fn list_preferences(
    State(state): State<AppState>,
    Path((user_id, domain)): Path<(String, ScoringDomain)>,
) -> AppResult<Json<Vec<WeightPreference>>> {
    let preferences =
        weight_preferences::list_preferences(state.preferences.as_ref(), domain, &user_id)
            .await?;
    Ok(Json(preferences))
}

/// Include or exclude several friends at once
pub async fn set_friend_inclusion(
    State(state): State<AppState>,
    Path((user_id, domain)): Path<(String, ScoringDomain)>,
    Json(request): Json<FriendInclusionRequest>,
) -> AppResult<Json<FriendInclusionResponse>> {
    let changed = weight_preferences::set_inclusion(
        state.users.as_ref(),
        state.preferences.as_ref(),
        domain,
        &user_id,
        &request.friend_ids,
        request.included,
    )
    .await?;

    Ok(Json(FriendInclusionResponse { changed }))
}

/// Set the weight of one friend, including them if needed
pub async fn set_preference_weight(
    State(state): State<AppState>,
    Path((user_id, domain, friend_id)): Path<(String, ScoringDomain, String)>,
    Json(request): Json<SetWeightRequest>,
) -> AppResult<StatusCode> {
    weight_preferences::set_weight(
        state.users.as_ref(),
        state.preferences.as_ref(),
        domain,
        &user_id,
        &friend_id,
        request.weight,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Stop including one friend
pub async fn remove_preference(
    State(state): State<AppState>,
    Path((user_id, domain, friend_id)): Path<(String, ScoringDomain, String)>,
) -> AppResult<StatusCode> {
    weight_preferences::remove_friend(state.preferences.as_ref(), domain, &user_id, &friend_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rate a movie; a score of 0 clears the rating
pub async fn rate_movie(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(String, String)>,
    Json(request): Json<RateMovieRequest>,
) -> AppResult<StatusCode> {
    ratings::rate_movie(
        state.users.as_ref(),
        state.movies.as_ref(),
        &user_id,
        &movie_id,
        request.score,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Clear a movie rating
pub async fn clear_movie_rating(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    if !ratings::clear_movie_rating(state.movies.as_ref(), &user_id, &movie_id).await? {
        return Err(AppError::NotFound(format!(
            "{} has not rated movie {}",
            user_id, movie_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Rate one dietary track of a restaurant
pub async fn rate_restaurant(
    State(state): State<AppState>,
    Path((user_id, restaurant_id)): Path<(String, String)>,
    Json(request): Json<RateRestaurantRequest>,
) -> AppResult<Json<RestaurantRating>> {
    let rating = ratings::rate_restaurant(
        state.users.as_ref(),
        state.restaurants.as_ref(),
        &user_id,
        &restaurant_id,
        request.rating_type,
        request.score,
        request.availability,
    )
    .await?;
    Ok(Json(rating))
}

/// Clear the rating of one dietary track
pub async fn clear_restaurant_rating(
    State(state): State<AppState>,
    Path((user_id, restaurant_id, rating_type)): Path<(String, String, RatingType)>,
) -> AppResult<StatusCode> {
    let removed = ratings::clear_restaurant_rating(
        state.restaurants.as_ref(),
        &user_id,
        &restaurant_id,
        rating_type,
    )
    .await?;

    if !removed {
        return Err(AppError::NotFound(format!(
            "{} has not rated restaurant {}",
            user_id, restaurant_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
