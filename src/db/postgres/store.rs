use sqlx::PgPool;

use crate::{
    db::store::{MovieStore, RestaurantStore, UserDirectory, WeightPreferenceStore},
    error::AppResult,
    models::{
        Movie, MovieAggregateScore, MovieRating, RatingType, Restaurant,
        RestaurantAggregateScore, RestaurantRating, ScoringDomain, User, UserStatus,
        WeightPreference,
    },
};

/// PostgreSQL-backed implementation of every storage trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Each scoring domain keeps its preferences in its own table
fn preference_table(domain: ScoringDomain) -> &'static str {
    match domain {
        ScoringDomain::Movies => "weight_preferences",
        ScoringDomain::Restaurants => "restaurant_weight_preferences",
    }
}

#[async_trait::async_trait]
impl UserDirectory for PgStore {
    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, status FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn list_active_user_ids(&self) -> AppResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM users WHERE status = $1 ORDER BY id",
        )
        .bind(UserStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait::async_trait]
impl WeightPreferenceStore for PgStore {
    async fn list_preferences(
        &self,
        domain: ScoringDomain,
        user_id: &str,
    ) -> AppResult<Vec<WeightPreference>> {
        let sql = format!(
            r#"
            SELECT wp.user_id, wp.friend_id, wp.weight, u.status AS friend_status
            FROM {} wp
            JOIN users u ON u.id = wp.friend_id
            WHERE wp.user_id = $1
            ORDER BY wp.friend_id
            "#,
            preference_table(domain)
        );

        let preferences = sqlx::query_as::<_, WeightPreference>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(preferences)
    }

    async fn upsert_preference(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_id: &str,
        weight: f64,
    ) -> AppResult<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (user_id, friend_id, weight)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, friend_id) DO UPDATE SET weight = EXCLUDED.weight
            "#,
            preference_table(domain)
        );

        sqlx::query(&sql)
            .bind(user_id)
            .bind(friend_id)
            .bind(weight)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_preference(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_id: &str,
    ) -> AppResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND friend_id = $2",
            preference_table(domain)
        );

        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(friend_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn include_friends(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_ids: &[String],
        weight: f64,
    ) -> AppResult<u64> {
        let sql = format!(
            r#"
            INSERT INTO {} (user_id, friend_id, weight)
            SELECT $1, f.friend_id, $3
            FROM UNNEST($2::text[]) AS f(friend_id)
            ON CONFLICT (user_id, friend_id) DO NOTHING
            "#,
            preference_table(domain)
        );

        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(friend_ids)
            .bind(weight)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn exclude_friends(
        &self,
        domain: ScoringDomain,
        user_id: &str,
        friend_ids: &[String],
    ) -> AppResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND friend_id = ANY($2)",
            preference_table(domain)
        );

        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(friend_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl MovieStore for PgStore {
    async fn list_movies(&self) -> AppResult<Vec<Movie>> {
        let movies =
            sqlx::query_as::<_, Movie>("SELECT id, title, media_type FROM movies ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(movies)
    }

    async fn get_movie(&self, movie_id: &str) -> AppResult<Option<Movie>> {
        let movie =
            sqlx::query_as::<_, Movie>("SELECT id, title, media_type FROM movies WHERE id = $1")
                .bind(movie_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(movie)
    }

    async fn list_movie_ratings(&self, user_ids: &[String]) -> AppResult<Vec<MovieRating>> {
        let ratings = sqlx::query_as::<_, MovieRating>(
            r#"
            SELECT user_id, movie_id, score
            FROM movie_ratings
            WHERE user_id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ratings)
    }

    async fn upsert_movie_rating(&self, rating: &MovieRating) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO movie_ratings (user_id, movie_id, score)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, movie_id) DO UPDATE SET score = EXCLUDED.score
            "#,
        )
        .bind(&rating.user_id)
        .bind(&rating.movie_id)
        .bind(rating.score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_movie_rating(&self, user_id: &str, movie_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM movie_ratings WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_movie_aggregate_scores(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<MovieAggregateScore>> {
        let scores = sqlx::query_as::<_, MovieAggregateScore>(
            r#"
            SELECT user_id, movie_id, score, calculated_at
            FROM aggregate_scores
            WHERE user_id = $1
            ORDER BY score DESC, movie_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(scores)
    }

    async fn replace_movie_aggregate_scores(
        &self,
        user_id: &str,
        scores: &[MovieAggregateScore],
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM aggregate_scores WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if !scores.is_empty() {
            let movie_ids: Vec<String> = scores.iter().map(|s| s.movie_id.clone()).collect();
            let values: Vec<f64> = scores.iter().map(|s| s.score).collect();
            let calculated_at: Vec<_> = scores.iter().map(|s| s.calculated_at).collect();

            sqlx::query(
                r#"
                INSERT INTO aggregate_scores (user_id, movie_id, score, calculated_at)
                SELECT $1, s.movie_id, s.score, s.calculated_at
                FROM UNNEST($2::text[], $3::float8[], $4::timestamptz[])
                    AS s(movie_id, score, calculated_at)
                "#,
            )
            .bind(user_id)
            .bind(&movie_ids)
            .bind(&values)
            .bind(&calculated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl RestaurantStore for PgStore {
    async fn list_restaurants(&self) -> AppResult<Vec<Restaurant>> {
        let restaurants =
            sqlx::query_as::<_, Restaurant>("SELECT id, name FROM restaurants ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(restaurants)
    }

    async fn get_restaurant(&self, restaurant_id: &str) -> AppResult<Option<Restaurant>> {
        let restaurant =
            sqlx::query_as::<_, Restaurant>("SELECT id, name FROM restaurants WHERE id = $1")
                .bind(restaurant_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(restaurant)
    }

    async fn list_restaurant_ratings(
        &self,
        user_ids: &[String],
    ) -> AppResult<Vec<RestaurantRating>> {
        let ratings = sqlx::query_as::<_, RestaurantRating>(
            r#"
            SELECT user_id, restaurant_id, rating_type, score, availability
            FROM restaurant_ratings
            WHERE user_id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ratings)
    }

    async fn upsert_restaurant_rating(&self, rating: &RestaurantRating) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO restaurant_ratings (user_id, restaurant_id, rating_type, score, availability)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, restaurant_id, rating_type)
            DO UPDATE SET score = EXCLUDED.score, availability = EXCLUDED.availability
            "#,
        )
        .bind(&rating.user_id)
        .bind(&rating.restaurant_id)
        .bind(rating.rating_type)
        .bind(rating.score)
        .bind(rating.availability)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_restaurant_rating(
        &self,
        user_id: &str,
        restaurant_id: &str,
        rating_type: RatingType,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM restaurant_ratings
            WHERE user_id = $1 AND restaurant_id = $2 AND rating_type = $3
            "#,
        )
        .bind(user_id)
        .bind(restaurant_id)
        .bind(rating_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_restaurant_aggregate_scores(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<RestaurantAggregateScore>> {
        let scores = sqlx::query_as::<_, RestaurantAggregateScore>(
            r#"
            SELECT user_id, restaurant_id, veg_score, non_veg_score,
                   veg_count, non_veg_count, confidence, calculated_at
            FROM restaurant_aggregate_scores
            WHERE user_id = $1
            ORDER BY restaurant_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(scores)
    }

    async fn replace_restaurant_aggregate_scores(
        &self,
        user_id: &str,
        scores: &[RestaurantAggregateScore],
    ) -> AppResult<()> {
        let restaurant_ids: Vec<String> =
            scores.iter().map(|s| s.restaurant_id.clone()).collect();

        let mut tx = self.pool.begin().await?;

        if !scores.is_empty() {
            let veg_scores: Vec<Option<f64>> = scores.iter().map(|s| s.veg_score).collect();
            let non_veg_scores: Vec<Option<f64>> =
                scores.iter().map(|s| s.non_veg_score).collect();
            let veg_counts: Vec<i32> = scores.iter().map(|s| s.veg_count).collect();
            let non_veg_counts: Vec<i32> = scores.iter().map(|s| s.non_veg_count).collect();
            let confidences: Vec<f64> = scores.iter().map(|s| s.confidence).collect();
            let calculated_at: Vec<_> = scores.iter().map(|s| s.calculated_at).collect();

            sqlx::query(
                r#"
                INSERT INTO restaurant_aggregate_scores (
                    user_id, restaurant_id, veg_score, non_veg_score,
                    veg_count, non_veg_count, confidence, calculated_at
                )
                SELECT $1, s.restaurant_id, s.veg_score, s.non_veg_score,
                       s.veg_count, s.non_veg_count, s.confidence, s.calculated_at
                FROM UNNEST(
                    $2::text[], $3::float8[], $4::float8[],
                    $5::int4[], $6::int4[], $7::float8[], $8::timestamptz[]
                ) AS s(restaurant_id, veg_score, non_veg_score,
                       veg_count, non_veg_count, confidence, calculated_at)
                ON CONFLICT (user_id, restaurant_id) DO UPDATE SET
                    veg_score = EXCLUDED.veg_score,
                    non_veg_score = EXCLUDED.non_veg_score,
                    veg_count = EXCLUDED.veg_count,
                    non_veg_count = EXCLUDED.non_veg_count,
                    confidence = EXCLUDED.confidence,
                    calculated_at = EXCLUDED.calculated_at
                "#,
            )
            .bind(user_id)
            .bind(&restaurant_ids)
            .bind(&veg_scores)
            .bind(&non_veg_scores)
            .bind(&veg_counts)
            .bind(&non_veg_counts)
            .bind(&confidences)
            .bind(&calculated_at)
            .execute(&mut *tx)
            .await?;
        }

        // Restaurants that no longer score on either track
        let stale = sqlx::query(
            r#"
            DELETE FROM restaurant_aggregate_scores
            WHERE user_id = $1 AND restaurant_id <> ALL($2)
            "#,
        )
        .bind(user_id)
        .bind(&restaurant_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            user_id = %user_id,
            upserted = scores.len(),
            removed = stale.rows_affected(),
            "Restaurant aggregate scores persisted"
        );

        Ok(())
    }
}
