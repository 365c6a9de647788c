//! Ranker/Assembler
//!
//! Orders scored candidates, applies the near-tie recency rule, caps to the
//! requested limit, and backfills short result sets from the popularity
//! fallback. Pure routines over plain data so they are exercisable without
//! the scoring engine.

use crate::behavior::event::BehaviorType;
use crate::catalog::Product;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Reason attached to popularity-fallback products.
pub const POPULAR_PICK_REASON: &str = "popular pick";

/// Per-product accumulator fed into the ranker.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub score: f64,
    pub reasons: Vec<String>,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub interaction_types: HashSet<BehaviorType>,
}

/// One entry of the final ranked list.
#[derive(Debug, Clone, Serialize)]
pub struct RankedProduct {
    pub product_id: i64,
    pub score: f64,
    pub reasons: Vec<String>,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

/// Order candidates by score descending, break near-ties (score gap under
/// `tie_break_window`) in favor of the more recent interaction, and truncate
/// to `limit`.
///
/// Candidates without a real interaction (expansion seeds) are treated as
/// very old for the tie-break.
pub fn rank(
    candidates: HashMap<i64, Candidate>,
    tie_break_window: f64,
    limit: usize,
) -> Vec<RankedProduct> {
    let mut items: Vec<RankedProduct> = candidates
        .into_iter()
        .map(|(product_id, c)| RankedProduct {
            product_id,
            score: c.score,
            reasons: c.reasons,
            last_interaction_at: c.last_interaction_at,
        })
        .collect();

    // Primary order: score descending, id ascending for determinism.
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.product_id.cmp(&b.product_id))
    });

    // Near-tie pass: within the window, the more recent interaction wins.
    // Bounded bubble keeps the comparison pairwise and total.
    let very_old = DateTime::<Utc>::MIN_UTC;
    let mut passes = 0;
    loop {
        let mut swapped = false;
        for i in 0..items.len().saturating_sub(1) {
            let earlier = items[i].last_interaction_at.unwrap_or(very_old);
            let later = items[i + 1].last_interaction_at.unwrap_or(very_old);
            if (items[i].score - items[i + 1].score).abs() < tie_break_window && later > earlier {
                items.swap(i, i + 1);
                swapped = true;
            }
        }
        passes += 1;
        if !swapped || passes >= items.len() {
            break;
        }
    }

    items.truncate(limit);
    items
}

/// Append the highest-rated products not already present, tagged as popular
/// picks, until `limit` entries exist or `popular` is exhausted.
pub fn backfill(ranked: &mut Vec<RankedProduct>, popular: &[Product], limit: usize) {
    let present: HashSet<i64> = ranked.iter().map(|r| r.product_id).collect();

    for product in popular {
        if ranked.len() >= limit {
            break;
        }
        if present.contains(&product.id) {
            continue;
        }
        ranked.push(RankedProduct {
            product_id: product.id,
            score: 0.0,
            reasons: vec![POPULAR_PICK_REASON.to_string()],
            last_interaction_at: None,
        });
    }
}
