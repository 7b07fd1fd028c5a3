use crate::{
    db::{MovieStore, RestaurantStore, UserDirectory},
    error::{AppError, AppResult},
    models::{Availability, MovieRating, RatingType, RestaurantRating, MAX_SCORE},
    services::validate_user_id,
};

/// Rates a movie. A score of 0 clears the rating.
pub async fn rate_movie(
    users: &dyn UserDirectory,
    movies: &dyn MovieStore,
    user_id: &str,
    movie_id: &str,
    score: f64,
) -> AppResult<()> {
    validate_user_id(user_id)?;
    validate_score(score)?;
    ensure_user(users, user_id).await?;
    if movies.get_movie(movie_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Movie {} not found", movie_id)));
    }

    if score == 0.0 {
        movies.delete_movie_rating(user_id, movie_id).await?;
        return Ok(());
    }

    movies
        .upsert_movie_rating(&MovieRating {
            user_id: user_id.to_string(),
            movie_id: movie_id.to_string(),
            score,
        })
        .await
}

/// Removes a movie rating. Returns false when there was none.
pub async fn clear_movie_rating(
    movies: &dyn MovieStore,
    user_id: &str,
    movie_id: &str,
) -> AppResult<bool> {
    validate_user_id(user_id)?;
    movies.delete_movie_rating(user_id, movie_id).await
}

/// Rates one dietary track of a restaurant.
///
/// A NOT_AVAILABLE track is stored without a score, whatever was submitted.
pub async fn rate_restaurant(
    users: &dyn UserDirectory,
    restaurants: &dyn RestaurantStore,
    user_id: &str,
    restaurant_id: &str,
    rating_type: RatingType,
    score: Option<f64>,
    availability: Availability,
) -> AppResult<RestaurantRating> {
    validate_user_id(user_id)?;
    if let Some(score) = score {
        validate_score(score)?;
    }
    ensure_user(users, user_id).await?;
    if restaurants.get_restaurant(restaurant_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Restaurant {} not found",
            restaurant_id
        )));
    }

    let rating = RestaurantRating {
        user_id: user_id.to_string(),
        restaurant_id: restaurant_id.to_string(),
        rating_type,
        score: match availability {
            Availability::Available => score,
            Availability::NotAvailable => None,
        },
        availability,
    };
    restaurants.upsert_restaurant_rating(&rating).await?;

    Ok(rating)
}

/// Removes the rating of one dietary track. Returns false when there was none.
pub async fn clear_restaurant_rating(
    restaurants: &dyn RestaurantStore,
    user_id: &str,
    restaurant_id: &str,
    rating_type: RatingType,
) -> AppResult<bool> {
    validate_user_id(user_id)?;
    restaurants
        .delete_restaurant_rating(user_id, restaurant_id, rating_type)
        .await
}

fn validate_score(score: f64) -> AppResult<()> {
    if !score.is_finite() || !(0.0..=MAX_SCORE).contains(&score) {
        return Err(AppError::InvalidInput(format!(
            "Score must be between 0 and {}, got {}",
            MAX_SCORE, score
        )));
    }
    Ok(())
}

async fn ensure_user(users: &dyn UserDirectory, user_id: &str) -> AppResult<()> {
    match users.get_user(user_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("User {} not found", user_id))),
    }
}
