//! Scoring Engine
//!
//! Turns a user's recent behavior rows into per-product relevance scores with
//! recency decay, type-specific weighting, and a cross-signal diversity
//! bonus, then widens, ranks, and backfills the candidate set.
//!
//! Every sub-step failure inside the pipeline is absorbed: logged, treated as
//! an empty contribution, and the pipeline falls through toward the
//! popularity backfill rather than raising. Only caller misuse is rejected.

use crate::behavior::event::{BehaviorEvent, BehaviorType};
use crate::behavior::store::BehaviorStore;
use crate::catalog::CatalogStore;
use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::preferences::PreferenceStore;
use crate::scoring::expander::Expander;
use crate::scoring::ranker::{self, Candidate, RankedProduct, POPULAR_PICK_REASON};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cap on the purchase repeat multiplier.
const PURCHASE_COUNT_CAP: f64 = 3.0;

/// Result of a recommendation request.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub products: Vec<RankedProduct>,
    /// Distinct reasons used across the list, in first-seen order.
    pub reasons: Vec<String>,
    pub is_new_user: bool,
}

/// The behavioral scoring engine.
#[derive(Clone)]
pub struct ScoringEngine {
    behaviors: Arc<dyn BehaviorStore>,
    preferences: Arc<dyn PreferenceStore>,
    catalog: Arc<dyn CatalogStore>,
    expander: Expander,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(
        behaviors: Arc<dyn BehaviorStore>,
        preferences: Arc<dyn PreferenceStore>,
        catalog: Arc<dyn CatalogStore>,
        config: ScoringConfig,
    ) -> Self {
        let expander = Expander::new(Arc::clone(&catalog), config.clone());
        Self {
            behaviors,
            preferences,
            catalog,
            expander,
            config,
        }
    }

    /// Produce a ranked, explainable product list for the user.
    ///
    /// Always returns a non-empty list as long as at least one active product
    /// exists; total pipeline failure degrades to the plain popularity list.
    pub async fn recommendations(
        &self,
        user_id: i64,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Recommendations> {
        if user_id <= 0 {
            return Err(Error::validation("user id is required"));
        }
        if limit == 0 {
            return Ok(Recommendations {
                products: Vec::new(),
                reasons: Vec::new(),
                is_new_user: false,
            });
        }

        // New users get the popularity list outright.
        match self.behaviors.count_events(user_id).await {
            Ok(0) => return Ok(self.popularity_only(user_id, limit).await),
            Ok(_) => {}
            Err(e) => {
                warn!(user_id, error = %e, "event count failed, continuing degraded");
            }
        }

        let events = match self
            .behaviors
            .recent_events(user_id, self.config.recent_event_window)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(user_id, error = %e, "recent events fetch failed, treating as empty");
                Vec::new()
            }
        };

        let now = Utc::now();
        let mut candidates = self.accumulate(&events, now);

        // Widen the candidate set. Stated favorite categories feed the
        // affinity aggregation alongside the implicit signal.
        let scored: HashMap<i64, f64> = candidates
            .iter()
            .map(|(id, c)| (*id, c.score))
            .collect();
        let exclude_ids: Vec<i64> = scored.keys().copied().collect();
        let stated_categories = self.stated_categories(user_id).await;

        let seeds = self
            .expander
            .expand(&scored, &stated_categories, query, &exclude_ids)
            .await;
        for (product_id, seed) in seeds {
            candidates.entry(product_id).or_insert_with(|| Candidate {
                score: seed.seed_score,
                reasons: vec![seed.reason.to_string()],
                last_interaction_at: None,
                interaction_types: Default::default(),
            });
        }

        let candidates_considered = candidates.len();
        let mut products = ranker::rank(candidates, self.config.tie_break_window, limit);

        if products.len() < limit {
            let popular = match self.catalog.find_active_products(limit).await {
                Ok(popular) => popular,
                Err(e) => {
                    warn!(user_id, error = %e, "popularity fallback fetch failed");
                    Vec::new()
                }
            };
            ranker::backfill(&mut products, &popular, limit);
        }

        let reasons = aggregate_reasons(&products);

        debug!(
            user_id,
            candidates_considered,
            returned = products.len(),
            "generated recommendations"
        );

        Ok(Recommendations {
            products,
            reasons,
            is_new_user: false,
        })
    }

    /// Step 3 of the pipeline: fold each event into its product accumulator.
    fn accumulate(
        &self,
        events: &[BehaviorEvent],
        now: DateTime<Utc>,
    ) -> HashMap<i64, Candidate> {
        let mut candidates: HashMap<i64, Candidate> = HashMap::new();

        for event in events {
            let Some(product_id) = event.product_id else {
                continue;
            };

            let decay = recency_decay(now, event.created_at, self.config.recency_decay_days);
            let factor = count_factor(event.behavior_type, event.occurrence_count);
            let contribution = event.weight * factor * decay;

            let candidate = candidates.entry(product_id).or_default();
            candidate.score += contribution;
            if candidate.interaction_types.insert(event.behavior_type) {
                if let Some(reason) = interaction_reason(event.behavior_type) {
                    candidate.reasons.push(reason.to_string());
                }
            }
            candidate.last_interaction_at = Some(match candidate.last_interaction_at {
                Some(existing) => existing.max(event.created_at),
                None => event.created_at,
            });
        }

        // Diversity bonus: products touched through several signal types
        // outrank single-signal products of equal raw score.
        for candidate in candidates.values_mut() {
            candidate.score +=
                self.config.diversity_bonus * candidate.interaction_types.len() as f64;
        }

        candidates
    }

    async fn stated_categories(&self, user_id: i64) -> HashMap<i64, f64> {
        match self.preferences.preferences_for(user_id).await {
            Ok(preferences) => preferences
                .iter()
                .filter_map(|p| p.category_id().map(|id| (id, p.weight)))
                .collect(),
            Err(e) => {
                warn!(user_id, error = %e, "preference fetch failed, ignoring stated tastes");
                HashMap::new()
            }
        }
    }

    async fn popularity_only(&self, user_id: i64, limit: usize) -> Recommendations {
        let products = match self.catalog.find_active_products(limit).await {
            Ok(products) => products,
            Err(e) => {
                warn!(user_id, error = %e, "popularity list fetch failed");
                Vec::new()
            }
        };

        let products: Vec<RankedProduct> = products
            .into_iter()
            .map(|p| RankedProduct {
                product_id: p.id,
                score: 0.0,
                reasons: vec![POPULAR_PICK_REASON.to_string()],
                last_interaction_at: None,
            })
            .collect();

        debug!(user_id, returned = products.len(), "new user, popularity list");

        let reasons = aggregate_reasons(&products);
        Recommendations {
            products,
            reasons,
            is_new_user: true,
        }
    }
}

/// Exponential recency decay. Ages below zero (clock skew) count as fresh.
pub(crate) fn recency_decay(
    now: DateTime<Utc>,
    created_at: DateTime<Utc>,
    decay_days: f64,
) -> f64 {
    let days = ((now - created_at).num_seconds() as f64 / 86_400.0).max(0.0);
    (-days / decay_days).exp()
}

/// Repeat-count multiplier per behavior type.
pub(crate) fn count_factor(behavior_type: BehaviorType, occurrence_count: i32) -> f64 {
    let count = occurrence_count.max(1) as f64;
    match behavior_type {
        BehaviorType::Purchase => count.min(PURCHASE_COUNT_CAP),
        BehaviorType::View => (count + 1.0).log2(),
        _ => 1.0,
    }
}

/// Human-readable reason per interaction type, at most one per distinct type.
fn interaction_reason(behavior_type: BehaviorType) -> Option<&'static str> {
    match behavior_type {
        BehaviorType::View => Some("you viewed this"),
        BehaviorType::Like => Some("you liked this"),
        BehaviorType::AddToCart => Some("you added this to your cart"),
        BehaviorType::Purchase => Some("you purchased this"),
        BehaviorType::Review => Some("you reviewed this"),
        BehaviorType::Search | BehaviorType::ClickCategory => None,
    }
}

fn aggregate_reasons(products: &[RankedProduct]) -> Vec<String> {
    let mut reasons = Vec::new();
    for product in products {
        for reason in &product.reasons {
            if !reasons.contains(reason) {
                reasons.push(reason.clone());
            }
        }
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_recency_decay_favors_younger_events() {
        let now = Utc::now();
        let young = recency_decay(now, now - Duration::days(1), 10.0);
        let old = recency_decay(now, now - Duration::days(30), 10.0);
        assert!(young > old);
        // exp(-1/10) and exp(-3)
        assert!((young - (-0.1f64).exp()).abs() < 1e-6);
        assert!((old - (-3.0f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_recency_decay_clamps_future_timestamps() {
        let now = Utc::now();
        let decay = recency_decay(now, now + Duration::days(2), 10.0);
        assert_eq!(decay, 1.0);
    }

    #[test]
    fn test_count_factor_caps_purchases() {
        assert_eq!(count_factor(BehaviorType::Purchase, 1), 1.0);
        assert_eq!(count_factor(BehaviorType::Purchase, 2), 2.0);
        assert_eq!(count_factor(BehaviorType::Purchase, 7), 3.0);
    }

    #[test]
    fn test_count_factor_log_views() {
        assert_eq!(count_factor(BehaviorType::View, 1), 1.0);
        assert_eq!(count_factor(BehaviorType::View, 3), 2.0);
        assert_eq!(count_factor(BehaviorType::AddToCart, 9), 1.0);
    }

    #[test]
    fn test_reasons_cover_product_signals() {
        assert_eq!(
            interaction_reason(BehaviorType::Purchase),
            Some("you purchased this")
        );
        assert_eq!(interaction_reason(BehaviorType::Search), None);
    }
}
