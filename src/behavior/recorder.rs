//! Behavior Recorder
//!
//! Ingests one interaction at a time. Counted types upsert onto their dedup
//! key, reviews append, searches append unless a near-duplicate of a recent
//! query exists. Weight formulas live here; atomicity lives in the store.

use crate::behavior::event::{BehaviorPayload, BehaviorType, WeightCurve};
use crate::behavior::store::{BehaviorStore, NewBehaviorEvent};
use crate::catalog::CatalogStore;
use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::scoring::text::{extract_keywords, keyword_similarity};
use std::sync::Arc;
use tracing::{debug, warn};

/// Caps for the search-weight factors.
const SEARCH_FACTOR_CAP: f64 = 1.5;
const SEARCH_KEYWORD_FACTOR_BASE: f64 = 0.8;
const SEARCH_FACTOR_STEP: f64 = 0.1;
/// Relevance factor when no related products were found.
const SEARCH_NO_MATCH_FACTOR: f64 = 0.8;
/// Review weight is `base * (REVIEW_RATING_FLOOR + rating / 10)`.
const REVIEW_RATING_FLOOR: f64 = 0.6;

/// Records behavior events and keeps the like table consistent with them.
#[derive(Clone)]
pub struct BehaviorRecorder {
    behaviors: Arc<dyn BehaviorStore>,
    catalog: Arc<dyn CatalogStore>,
    config: ScoringConfig,
}

impl BehaviorRecorder {
    pub fn new(
        behaviors: Arc<dyn BehaviorStore>,
        catalog: Arc<dyn CatalogStore>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            behaviors,
            catalog,
            config,
        }
    }

    /// Record one interaction.
    ///
    /// Rejects with [`Error::Validation`] on a missing user id and with
    /// [`Error::NotFound`] when `product_id` does not resolve to an active
    /// product.
    pub async fn record_event(
        &self,
        user_id: i64,
        product_id: Option<i64>,
        behavior_type: BehaviorType,
        payload: Option<BehaviorPayload>,
    ) -> Result<()> {
        if user_id <= 0 {
            return Err(Error::validation("user id is required"));
        }

        if let Some(pid) = product_id {
            if self.catalog.find_active_product(pid).await?.is_none() {
                return Err(Error::not_found("product", pid));
            }
        }

        let base = self.config.base_weights.for_type(behavior_type);

        match behavior_type {
            BehaviorType::Search => self.record_search(user_id, payload).await?,
            BehaviorType::Review => {
                let weight = match &payload {
                    Some(BehaviorPayload::Review {
                        rating: Some(rating),
                        ..
                    }) => base * (REVIEW_RATING_FLOOR + rating / 10.0),
                    _ => base,
                };
                self.behaviors
                    .append_event(NewBehaviorEvent {
                        user_id,
                        product_id,
                        behavior_type,
                        weight,
                        payload,
                    })
                    .await?;
            }
            _ => {
                let curve = match behavior_type {
                    BehaviorType::AddToCart => WeightCurve::CartIntent { base },
                    _ => WeightCurve::Diminishing { base },
                };
                let event = self
                    .behaviors
                    .upsert_event(
                        NewBehaviorEvent {
                            user_id,
                            product_id,
                            behavior_type,
                            weight: base,
                            payload,
                        },
                        curve,
                    )
                    .await?;
                debug!(
                    user_id,
                    ?product_id,
                    behavior_type = %behavior_type,
                    occurrence_count = event.occurrence_count,
                    weight = event.weight,
                    "recorded behavior"
                );
            }
        }

        Ok(())
    }

    /// Toggle a like. Creating keeps the unique like row and the LIKE event
    /// consistent; both directions are idempotent no-ops when the user is
    /// already in the target state.
    pub async fn set_like(&self, user_id: i64, product_id: i64, liked: bool) -> Result<()> {
        if user_id <= 0 {
            return Err(Error::validation("user id is required"));
        }
        if self.catalog.find_active_product(product_id).await?.is_none() {
            return Err(Error::not_found("product", product_id));
        }

        if liked {
            let created = self.behaviors.insert_like(user_id, product_id).await?;
            if created {
                self.record_event(user_id, Some(product_id), BehaviorType::Like, None)
                    .await?;
            } else {
                debug!(user_id, product_id, "like already present, no-op");
            }
        } else {
            let removed_like = self.behaviors.delete_like(user_id, product_id).await?;
            let removed_event = self
                .behaviors
                .delete_event(user_id, product_id, BehaviorType::Like)
                .await?;
            if !removed_like && !removed_event {
                debug!(user_id, product_id, "unlike on unliked product, no-op");
            }
        }

        Ok(())
    }

    /// Search events fold into a recent near-duplicate instead of appending.
    async fn record_search(&self, user_id: i64, payload: Option<BehaviorPayload>) -> Result<()> {
        let (query, mut keywords, mut related_product_ids, related_category_ids) = match payload {
            Some(BehaviorPayload::Search {
                query,
                keywords,
                related_product_ids,
                related_category_ids,
            }) => (query, keywords, related_product_ids, related_category_ids),
            _ => {
                return Err(Error::validation(
                    "search events require a search payload",
                ))
            }
        };

        if keywords.is_empty() {
            keywords = extract_keywords(&query);
        }

        // Relate the query to catalog products by substring match. A catalog
        // failure only costs relevance weighting, never the recording itself.
        if related_product_ids.is_empty() && !keywords.is_empty() {
            match self
                .catalog
                .search_active_products_by_keywords(&keywords, &[])
                .await
            {
                Ok(products) => {
                    related_product_ids = products.iter().map(|p| p.id).collect();
                }
                Err(e) => {
                    warn!(user_id, error = %e, "catalog lookup failed while relating search");
                }
            }
        }

        let keyword_factor = f64::min(
            SEARCH_FACTOR_CAP,
            SEARCH_KEYWORD_FACTOR_BASE + SEARCH_FACTOR_STEP * keywords.len() as f64,
        );
        let relevance_factor = if related_product_ids.is_empty() {
            SEARCH_NO_MATCH_FACTOR
        } else {
            f64::min(
                SEARCH_FACTOR_CAP,
                1.0 + SEARCH_FACTOR_STEP * related_product_ids.len() as f64,
            )
        };
        let base = self.config.base_weights.for_type(BehaviorType::Search);
        let weight = base * keyword_factor * relevance_factor;

        let payload = BehaviorPayload::Search {
            query,
            keywords: keywords.clone(),
            related_product_ids,
            related_category_ids,
        };

        // Compare against the most recent searches; a malformed stored
        // payload reads back as empty and simply never matches.
        let recent = self
            .behaviors
            .recent_events_of_type(user_id, BehaviorType::Search, self.config.search_dedup_window)
            .await?;

        for event in &recent {
            let existing_keywords: &[String] = match &event.payload {
                Some(BehaviorPayload::Search { keywords, .. }) => keywords,
                _ => &[],
            };
            let similarity = keyword_similarity(&keywords, existing_keywords);
            if similarity > self.config.search_similarity_threshold {
                debug!(
                    user_id,
                    event_id = %event.id,
                    similarity,
                    "folding near-duplicate search"
                );
                return self
                    .behaviors
                    .fold_event(event.id, weight, Some(payload))
                    .await;
            }
        }

        self.behaviors
            .append_event(NewBehaviorEvent {
                user_id,
                product_id: None,
                behavior_type: BehaviorType::Search,
                weight,
                payload: Some(payload),
            })
            .await?;

        Ok(())
    }
}
