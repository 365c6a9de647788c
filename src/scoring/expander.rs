//! Affinity & Query Expander
//!
//! Widens the candidate set beyond directly-scored products using inferred
//! category affinity and/or a free-text query. Expansion candidates receive
//! lower seed scores than real interactions. The two strategies are
//! independent fan-outs over the same read-only snapshot and run
//! concurrently; store failures cost only candidates, never the pipeline.

use crate::catalog::CatalogStore;
use crate::config::ScoringConfig;
use crate::scoring::text::extract_keywords;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reason attached to category-affinity candidates.
pub const CATEGORY_MATCH_REASON: &str = "matches a category you favor";
/// Reason attached to candidates reached through a stated preference.
pub const STATED_TASTE_REASON: &str = "fits your stated tastes";
/// Reason attached to query-expansion candidates.
pub const QUERY_MATCH_REASON: &str = "matches your request";

/// A candidate discovered by expansion, with its seed score.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionSeed {
    pub seed_score: f64,
    pub reason: &'static str,
}

/// Candidate-set widening over the catalog capability.
#[derive(Clone)]
pub struct Expander {
    catalog: Arc<dyn CatalogStore>,
    config: ScoringConfig,
}

impl Expander {
    pub fn new(catalog: Arc<dyn CatalogStore>, config: ScoringConfig) -> Self {
        Self { catalog, config }
    }

    /// Run both expansion strategies concurrently and merge their outputs,
    /// keeping the higher seed score for duplicates.
    pub async fn expand(
        &self,
        scored: &HashMap<i64, f64>,
        stated_categories: &HashMap<i64, f64>,
        query: Option<&str>,
        exclude_ids: &[i64],
    ) -> HashMap<i64, ExpansionSeed> {
        let (by_category, by_query) = tokio::join!(
            self.category_expansion(scored, stated_categories, exclude_ids),
            self.query_expansion(query, exclude_ids),
        );

        let mut merged = by_category;
        for (product_id, seed) in by_query {
            merged
                .entry(product_id)
                .and_modify(|existing| {
                    if seed.seed_score > existing.seed_score {
                        *existing = seed.clone();
                    }
                })
                .or_insert(seed);
        }

        debug!(candidates = merged.len(), "expansion complete");
        merged
    }

    /// Infer the user's strongest categories from directly-scored products
    /// (plus stated favorites) and pull in a few more products from them.
    async fn category_expansion(
        &self,
        scored: &HashMap<i64, f64>,
        stated_categories: &HashMap<i64, f64>,
        exclude_ids: &[i64],
    ) -> HashMap<i64, ExpansionSeed> {
        let scored_ids: Vec<i64> = scored.keys().copied().collect();

        let products = match self.catalog.find_active_products_by_id(&scored_ids).await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "category affinity lookup failed, skipping expansion");
                Vec::new()
            }
        };

        let mut affinity: HashMap<i64, f64> = HashMap::new();
        for product in &products {
            let Some(score) = scored.get(&product.id) else {
                continue;
            };
            for category_id in &product.category_ids {
                *affinity.entry(*category_id).or_insert(0.0) +=
                    self.config.category_affinity_share * score;
            }
        }

        let stated: HashSet<i64> = stated_categories.keys().copied().collect();
        for (category_id, weight) in stated_categories {
            *affinity.entry(*category_id).or_insert(0.0) +=
                weight * self.config.stated_category_seed;
        }

        if affinity.is_empty() {
            return HashMap::new();
        }

        let mut top: Vec<(i64, f64)> = affinity.into_iter().collect();
        top.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let top_categories: Vec<i64> = top
            .into_iter()
            .take(self.config.top_category_count)
            .map(|(id, _)| id)
            .collect();

        let candidates = match self
            .catalog
            .find_active_products_by_category(
                &top_categories,
                exclude_ids,
                self.config.category_expansion_limit,
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "category expansion fetch failed, skipping");
                Vec::new()
            }
        };

        candidates
            .into_iter()
            .map(|product| {
                let matching = product
                    .category_ids
                    .iter()
                    .filter(|c| top_categories.contains(c))
                    .count();
                let via_stated = product.category_ids.iter().any(|c| stated.contains(c));
                let seed = ExpansionSeed {
                    seed_score: self.config.category_seed_score * matching.max(1) as f64,
                    reason: if via_stated {
                        STATED_TASTE_REASON
                    } else {
                        CATEGORY_MATCH_REASON
                    },
                };
                (product.id, seed)
            })
            .collect()
    }

    /// Match a free-text query's keywords against the catalog.
    async fn query_expansion(
        &self,
        query: Option<&str>,
        exclude_ids: &[i64],
    ) -> HashMap<i64, ExpansionSeed> {
        let Some(query) = query else {
            return HashMap::new();
        };
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return HashMap::new();
        }

        let products = match self
            .catalog
            .search_active_products_by_keywords(&keywords, exclude_ids)
            .await
        {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "keyword search failed, skipping query expansion");
                Vec::new()
            }
        };

        products
            .into_iter()
            .map(|product| {
                let matched = keywords
                    .iter()
                    .filter(|kw| product.matches_keyword(kw))
                    .count();
                let seed = ExpansionSeed {
                    seed_score: self.config.keyword_seed_base
                        + self.config.keyword_seed_per_match * matched as f64,
                    reason: QUERY_MATCH_REASON,
                };
                (product.id, seed)
            })
            .collect()
    }
}
