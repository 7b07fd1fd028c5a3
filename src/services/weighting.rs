//! Weight-aware averaging shared by the movie and restaurant pipelines.

use std::collections::HashMap;

use crate::models::WeightPreference;

/// Weight of a user's own rating in their aggregate scores
pub const SELF_WEIGHT: f64 = 1.0;

/// Everyone whose ratings feed one user's aggregate scores, with their weights
#[derive(Debug, Clone)]
pub struct ContributorWeights {
    owner_id: String,
    weights: HashMap<String, f64>,
}

impl ContributorWeights {
    /// Builds the contributor set from the owner's friend preferences.
    ///
    /// The owner is always present at [`SELF_WEIGHT`], even if a preference row names them.
    pub fn new<'a, I>(owner_id: &str, preferences: I) -> Self
    where
        I: IntoIterator<Item = &'a WeightPreference>,
    {
        let mut weights: HashMap<String, f64> = preferences
            .into_iter()
            .map(|p| (p.friend_id.clone(), p.weight))
            .collect();
        weights.insert(owner_id.to_string(), SELF_WEIGHT);

        Self {
            owner_id: owner_id.to_string(),
            weights,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub fn weight_of(&self, user_id: &str) -> Option<f64> {
        self.weights.get(user_id).copied()
    }

    /// Ids to load ratings for, owner included
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.weights.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of friends, excluding the owner
    pub fn friend_count(&self) -> usize {
        self.weights.len() - 1
    }
}

/// Running `Σ(score × weight) / Σ(weight)`
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct WeightedAverage {
    weighted_sum: f64,
    total_weight: f64,
    contributions: u32,
}

impl WeightedAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one rating. A non-positive weight leaves the average untouched.
    pub fn add(&mut self, score: f64, weight: f64) {
        if weight <= 0.0 || !weight.is_finite() {
            return;
        }
        self.weighted_sum += score * weight;
        self.total_weight += weight;
        self.contributions += 1;
    }

    /// The average, or `None` when nothing with positive weight was added
    pub fn value(&self) -> Option<f64> {
        (self.total_weight > 0.0).then(|| self.weighted_sum / self.total_weight)
    }

    /// Number of ratings that carried positive weight
    pub fn contributions(&self) -> u32 {
        self.contributions
    }
}

/// Rounds to two decimal places. Only applied to values about to be persisted.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;

    fn pref(friend_id: &str, weight: f64) -> WeightPreference {
        WeightPreference {
            user_id: "me".to_string(),
            friend_id: friend_id.to_string(),
            weight,
            friend_status: UserStatus::Active,
        }
    }

    #[test]
    fn test_weighted_average_matches_formula() {
        let mut avg = WeightedAverage::new();
        avg.add(7.0, SELF_WEIGHT);
        avg.add(4.0, 0.25);
        avg.add(9.0, 1.75);

        let expected = (7.0 * 1.0 + 4.0 * 0.25 + 9.0 * 1.75) / (1.0 + 0.25 + 1.75);
        assert!((avg.value().unwrap() - expected).abs() < 1e-9);
        assert_eq!(avg.contributions(), 3);
    }

    #[test]
    fn test_zero_weight_is_absent() {
        let mut with_zero = WeightedAverage::new();
        with_zero.add(6.0, 1.0);
        with_zero.add(1.0, 0.0);

        let mut without = WeightedAverage::new();
        without.add(6.0, 1.0);

        assert_eq!(with_zero, without);
        assert_eq!(with_zero.contributions(), 1);
    }

    #[test]
    fn test_empty_average_has_no_value() {
        let mut avg = WeightedAverage::new();
        assert_eq!(avg.value(), None);

        avg.add(8.0, 0.0);
        assert_eq!(avg.value(), None);
    }

    #[test]
    fn test_owner_weight_cannot_be_overridden() {
        let prefs = vec![pref("me", 0.2), pref("f1", 0.5)];
        let weights = ContributorWeights::new("me", &prefs);

        assert_eq!(weights.weight_of("me"), Some(SELF_WEIGHT));
        assert_eq!(weights.weight_of("f1"), Some(0.5));
        assert_eq!(weights.friend_count(), 1);
        assert_eq!(weights.user_ids(), vec!["f1".to_string(), "me".to_string()]);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(8.3333333), 8.33);
        assert_eq!(round2(6.666), 6.67);
        assert_eq!(round2(0.6), 0.6);
    }
}
