//! Scoring module
//!
//! Produces personalized, explainable product rankings for ShopLens users.
//!
//! ## Architecture
//!
//! 1. **Engine** — accumulate recent behavior rows into per-product scores
//!    with recency decay, type weighting, and a cross-signal diversity bonus
//! 2. **Expander** — widen the candidate set via category affinity and
//!    free-text query keywords, with lower seed scores
//! 3. **Ranker** — order, break near-ties by recency, cap, and backfill from
//!    the popularity fallback
//!
//! ## Algorithm overview
//!
//! Each of the user's 50 most recent behavior rows with a product contributes
//! `weight * countFactor * exp(-ageDays / 10)` to that product. Products
//! touched through several distinct signal types receive a diversity bonus of
//! 0.2 per type. Expansion candidates seed at 0.3-range scores so real
//! interactions dominate. Users with no history, and any result set shorter
//! than the requested limit, fall back to the highest-rated active products.

pub mod engine;
pub mod expander;
pub mod ranker;
pub mod text;

// Re-export the types that are actually used externally
pub use engine::{Recommendations, ScoringEngine};
pub use ranker::{Candidate, RankedProduct};
