//! Behavior event model
//!
//! One row per recorded interaction (or per dedup key for counted types).
//! The extra data carried by search, review, and category-click events is a
//! tagged union decoded through an explicit discriminator, so malformed stored
//! data is caught at the boundary rather than deep inside scoring.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Interaction types we track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorType {
    View,
    Like,
    AddToCart,
    Purchase,
    Review,
    Search,
    ClickCategory,
}

impl BehaviorType {
    /// Stable string form used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorType::View => "view",
            BehaviorType::Like => "like",
            BehaviorType::AddToCart => "add_to_cart",
            BehaviorType::Purchase => "purchase",
            BehaviorType::Review => "review",
            BehaviorType::Search => "search",
            BehaviorType::ClickCategory => "click_category",
        }
    }

    /// Counted types hold at most one row per (user, product-or-null, type);
    /// repeats increment the row. Review and search rows are appended.
    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            BehaviorType::View
                | BehaviorType::Like
                | BehaviorType::AddToCart
                | BehaviorType::Purchase
                | BehaviorType::ClickCategory
        )
    }
}

impl std::fmt::Display for BehaviorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BehaviorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "view" => Ok(BehaviorType::View),
            "like" => Ok(BehaviorType::Like),
            "add_to_cart" => Ok(BehaviorType::AddToCart),
            "purchase" => Ok(BehaviorType::Purchase),
            "review" => Ok(BehaviorType::Review),
            "search" => Ok(BehaviorType::Search),
            "click_category" => Ok(BehaviorType::ClickCategory),
            other => Err(Error::validation(format!(
                "unknown behavior type: {other}"
            ))),
        }
    }
}

/// Typed per-type payload, discriminated by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorPayload {
    Search {
        query: String,
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        related_product_ids: Vec<i64>,
        #[serde(default)]
        related_category_ids: Vec<i64>,
    },
    Review {
        #[serde(default)]
        rating: Option<f64>,
        #[serde(default)]
        content: Option<String>,
    },
    CategoryClick {
        category_id: i64,
    },
}

impl BehaviorPayload {
    /// Decode a stored JSON payload. Failures surface as
    /// [`Error::MalformedPayload`]; callers in the scoring pipeline absorb
    /// them and proceed with an empty payload.
    pub fn decode(behavior_type: BehaviorType, value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            Error::malformed_payload(
                behavior_type.as_str(),
                "stored payload does not match its discriminator",
                Some(e),
            )
        })
    }
}

/// How a counted row's weight evolves as its counter grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightCurve {
    /// Repeated intent is rewarded: `base * (log10(count + 1) + 1)`
    CartIntent { base: f64 },
    /// Diminishing returns: `base * (1 + log10(count) * 0.2)`
    Diminishing { base: f64 },
}

impl WeightCurve {
    /// Weight after the counter reaches `count`. The first occurrence always
    /// carries the plain base weight; the curve applies from the first repeat.
    pub fn weight_at(&self, count: i32) -> f64 {
        let count = count.max(1) as f64;
        match self {
            WeightCurve::CartIntent { base } => {
                if count <= 1.0 {
                    *base
                } else {
                    base * ((count + 1.0).log10() + 1.0)
                }
            }
            WeightCurve::Diminishing { base } => base * (1.0 + count.log10() * 0.2),
        }
    }
}

/// One stored behavior row.
#[derive(Debug, Clone)]
pub struct BehaviorEvent {
    pub id: Uuid,
    pub user_id: i64,
    pub product_id: Option<i64>,
    pub behavior_type: BehaviorType,
    pub occurrence_count: i32,
    pub weight: f64,
    /// `None` when the row has no payload or the stored payload failed to
    /// decode (the store logs the latter).
    pub payload: Option<BehaviorPayload>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
