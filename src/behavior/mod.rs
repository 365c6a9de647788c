//! Behavior tracking module
//!
//! Records one user interaction at a time and keeps the per-(user, product,
//! type) counter rows the scoring engine reads.
//!
//! ## Architecture
//!
//! 1. **Event model** — behavior types, tagged payload union, row shapes
//! 2. **Store** — atomic upsert/append primitives over the behavior tables
//! 3. **Recorder** — dedup rules, weight formulas, like toggle, search folding
//!
//! Counted types (view, like, add-to-cart, category click) hold at most one
//! row per dedup key; repeats increment the counter and recompute the weight.
//! Reviews always append. Searches append unless a near-duplicate of a recent
//! query exists, in which case they fold into it.

pub mod event;
pub mod recorder;
pub mod store;

pub use event::{BehaviorEvent, BehaviorPayload, BehaviorType};
pub use recorder::BehaviorRecorder;
pub use store::{BehaviorStore, NewBehaviorEvent, PgBehaviorStore};
