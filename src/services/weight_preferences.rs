use crate::{
    db::{UserDirectory, WeightPreferenceStore},
    error::{AppError, AppResult},
    models::{ScoringDomain, WeightPreference, DEFAULT_WEIGHT},
    services::validate_user_id,
};

/// Lists the friends a user includes in one scoring domain
pub async fn list_preferences(
    store: &dyn WeightPreferenceStore,
    domain: ScoringDomain,
    user_id: &str,
) -> AppResult<Vec<WeightPreference>> {
    validate_user_id(user_id)?;
    store.list_preferences(domain, user_id).await
}

/// Includes a friend at `weight`, or changes the weight of an included friend
pub async fn set_weight(
    users: &dyn UserDirectory,
    store: &dyn WeightPreferenceStore,
    domain: ScoringDomain,
    user_id: &str,
    friend_id: &str,
    weight: f64,
) -> AppResult<()> {
    validate_pair(user_id, friend_id)?;
    validate_weight(weight)?;
    ensure_users_exist(users, &[user_id, friend_id]).await?;

    store
        .upsert_preference(domain, user_id, friend_id, weight)
        .await?;

    tracing::debug!(
        user_id = %user_id,
        friend_id = %friend_id,
        domain = %domain,
        weight,
        "Weight preference saved"
    );

    Ok(())
}

/// Stops including a friend
pub async fn remove_friend(
    store: &dyn WeightPreferenceStore,
    domain: ScoringDomain,
    user_id: &str,
    friend_id: &str,
) -> AppResult<()> {
    validate_pair(user_id, friend_id)?;

    if !store.delete_preference(domain, user_id, friend_id).await? {
        return Err(AppError::NotFound(format!(
            "{} is not among {}'s {} friends",
            friend_id, user_id, domain
        )));
    }
    Ok(())
}

/// Sets every listed friend to the same inclusion state.
///
/// Including adds friends at the default weight and keeps the weight of friends
/// already included. Excluding removes them. Returns the number of rows changed.
pub async fn set_inclusion(
    users: &dyn UserDirectory,
    store: &dyn WeightPreferenceStore,
    domain: ScoringDomain,
    user_id: &str,
    friend_ids: &[String],
    included: bool,
) -> AppResult<u64> {
    validate_user_id(user_id)?;
    if friend_ids.is_empty() {
        return Ok(0);
    }
    for friend_id in friend_ids {
        validate_pair(user_id, friend_id)?;
    }

    let changed = if included {
        let mut ids: Vec<&str> = friend_ids.iter().map(String::as_str).collect();
        ids.push(user_id);
        ensure_users_exist(users, &ids).await?;

        store
            .include_friends(domain, user_id, friend_ids, DEFAULT_WEIGHT)
            .await?
    } else {
        store.exclude_friends(domain, user_id, friend_ids).await?
    };

    tracing::info!(
        user_id = %user_id,
        domain = %domain,
        requested = friend_ids.len(),
        changed,
        included,
        "Friend inclusion updated"
    );

    Ok(changed)
}

fn validate_pair(user_id: &str, friend_id: &str) -> AppResult<()> {
    validate_user_id(user_id)?;
    if friend_id.trim().is_empty() {
        return Err(AppError::InvalidInput("friendId is required".to_string()));
    }
    if friend_id == user_id {
        return Err(AppError::InvalidInput(
            "A user cannot add themself as a friend".to_string(),
        ));
    }
    Ok(())
}

fn validate_weight(weight: f64) -> AppResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(AppError::InvalidInput(format!(
            "Weight must be a non-negative number, got {}",
            weight
        )));
    }
    Ok(())
}

async fn ensure_users_exist(users: &dyn UserDirectory, ids: &[&str]) -> AppResult<()> {
    for id in ids {
        if users.get_user(id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryStore,
        models::{User, UserStatus},
    };
    use tokio_test::{assert_err, assert_ok};

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        for id in ["me", "f1", "f2"] {
            store
                .insert_user(User::new(id, id, UserStatus::Active))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_set_weight_then_update() {
        let store = store().await;
        assert_ok!(set_weight(&store, &store, ScoringDomain::Movies, "me", "f1", 1.5).await);
        assert_ok!(set_weight(&store, &store, ScoringDomain::Movies, "me", "f1", 0.25).await);

        let prefs = list_preferences(&store, ScoringDomain::Movies, "me")
            .await
            .unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].weight, 0.25);
    }

    #[tokio::test]
    async fn test_negative_or_nan_weight_is_rejected() {
        let store = store().await;
        for weight in [-0.1, f64::NAN, f64::INFINITY] {
            let result = set_weight(&store, &store, ScoringDomain::Movies, "me", "f1", weight).await;
            assert!(matches!(result, Err(AppError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn test_self_and_unknown_friends_are_rejected() {
        let store = store().await;

        let result = set_weight(&store, &store, ScoringDomain::Movies, "me", "me", 1.0).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let result = set_weight(&store, &store, ScoringDomain::Movies, "me", "ghost", 1.0).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_friend_is_not_found() {
        let store = store().await;
        let result = remove_friend(&store, ScoringDomain::Restaurants, "me", "f1").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bulk_include_then_exclude() {
        let store = store().await;
        let friends = vec!["f1".to_string(), "f2".to_string()];

        let added = set_inclusion(&store, &store, ScoringDomain::Movies, "me", &friends, true)
            .await
            .unwrap();
        assert_eq!(added, 2);

        let prefs = list_preferences(&store, ScoringDomain::Movies, "me")
            .await
            .unwrap();
        assert!(prefs.iter().all(|p| p.weight == DEFAULT_WEIGHT));

        let removed = set_inclusion(&store, &store, ScoringDomain::Movies, "me", &friends[..1], false)
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let prefs = list_preferences(&store, ScoringDomain::Movies, "me")
            .await
            .unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].friend_id, "f2");
    }

    #[tokio::test]
    async fn test_list_requires_user_id() {
        let store = store().await;
        assert_err!(list_preferences(&store, ScoringDomain::Movies, "").await);
    }
}
