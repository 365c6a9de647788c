//! Search Analytics
//!
//! Read-only aggregation over a user's recorded search events for
//! diagnostics. Not in the recommendation hot path and never mutates state;
//! malformed payloads are skipped with a logged warning.

use crate::behavior::event::{BehaviorPayload, BehaviorType};
use crate::behavior::store::BehaviorStore;
use crate::error::{Error, Result};
use chrono::Timelike;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Time-of-day buckets by event creation hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeOfDayHistogram {
    /// Hours 0-11
    pub morning: usize,
    /// Hours 12-17
    pub afternoon: usize,
    /// Hours 18-23
    pub evening: usize,
}

impl TimeOfDayHistogram {
    fn record(&mut self, hour: u32) {
        if hour < 12 {
            self.morning += 1;
        } else if hour < 18 {
            self.afternoon += 1;
        } else {
            self.evening += 1;
        }
    }
}

/// Aggregated view over a user's recent searches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsSummary {
    pub total_searches: usize,
    /// Queries newest first.
    pub recent_queries: Vec<String>,
    pub keyword_frequency: HashMap<String, usize>,
    pub time_of_day: TimeOfDayHistogram,
    pub related_products: HashMap<i64, usize>,
    pub related_categories: HashMap<i64, usize>,
}

/// Read-only aggregator over search events.
#[derive(Clone)]
pub struct SearchAnalytics {
    behaviors: Arc<dyn BehaviorStore>,
}

impl SearchAnalytics {
    pub fn new(behaviors: Arc<dyn BehaviorStore>) -> Self {
        Self { behaviors }
    }

    /// Summarize the user's most recent `limit` search events.
    pub async fn summary(&self, user_id: i64, limit: usize) -> Result<AnalyticsSummary> {
        if user_id <= 0 {
            return Err(Error::validation("user id is required"));
        }

        let events = self
            .behaviors
            .recent_events_of_type(user_id, BehaviorType::Search, limit)
            .await?;

        let mut summary = AnalyticsSummary::default();

        for event in &events {
            let Some(BehaviorPayload::Search {
                query,
                keywords,
                related_product_ids,
                related_category_ids,
            }) = &event.payload
            else {
                // The store already dropped undecodable payloads to None.
                warn!(
                    user_id,
                    event_id = %event.id,
                    "skipping search event without a usable payload"
                );
                continue;
            };

            summary.total_searches += 1;
            summary.recent_queries.push(query.clone());
            for keyword in keywords {
                *summary.keyword_frequency.entry(keyword.clone()).or_insert(0) += 1;
            }
            summary.time_of_day.record(event.created_at.hour());
            for product_id in related_product_ids {
                *summary.related_products.entry(*product_id).or_insert(0) += 1;
            }
            for category_id in related_category_ids {
                *summary.related_categories.entry(*category_id).or_insert(0) += 1;
            }
        }

        Ok(summary)
    }
}
