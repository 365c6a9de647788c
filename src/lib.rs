//! ShopLens engine library crate
//!
//! Behavioral scoring and personalized recommendations for the ShopLens
//! storefront. Ingests implicit and explicit user signals, maintains
//! frequency- and recency-aware weights per signal, and produces ranked,
//! explainable product lists that degrade gracefully for new users or
//! partial failures.

pub mod analytics;
pub mod behavior;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod preferences;
pub mod scoring;

// Re-export commonly used types
pub use analytics::{AnalyticsSummary, SearchAnalytics};
pub use behavior::{BehaviorEvent, BehaviorPayload, BehaviorRecorder, BehaviorType};
pub use catalog::{CatalogStore, Product};
pub use config::{Config, ScoringConfig};
pub use database::Database;
pub use error::{Error, Result};
pub use preferences::{Preference, PreferenceKind, PreferenceStore};
pub use scoring::{RankedProduct, Recommendations, ScoringEngine};
