use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Aggregate scores
        .route(
            "/users/:user_id/scores/movies",
            get(handlers::get_movie_scores),
        )
        .route(
            "/users/:user_id/scores/movies/recalculate",
            post(handlers::recalculate_movie_scores),
        )
        .route(
            "/users/:user_id/scores/restaurants",
            get(handlers::get_restaurant_scores),
        )
        .route(
            "/users/:user_id/scores/restaurants/recalculate",
            post(handlers::recalculate_restaurant_scores),
        )
        // Weight preferences
        .route(
            "/users/:user_id/preferences/:domain",
            get(handlers::list_preferences).post(handlers::set_friend_inclusion),
        )
        .route(
            "/users/:user_id/preferences/:domain/:friend_id",
            put(handlers::set_preference_weight).delete(handlers::remove_preference),
        )
        // Ratings
        .route(
            "/users/:user_id/ratings/movies/:movie_id",
            put(handlers::rate_movie).delete(handlers::clear_movie_rating),
        )
        .route(
            "/users/:user_id/ratings/restaurants/:restaurant_id",
            put(handlers::rate_restaurant),
        )
        .route(
            "/users/:user_id/ratings/restaurants/:restaurant_id/:rating_type",
            delete(handlers::clear_restaurant_rating),
        )
}
