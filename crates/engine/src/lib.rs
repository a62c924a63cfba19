//! `tracknow-engine` — real-time inventory synchronization.
//!
//! [`InventoryEngine`] owns the authoritative local view of an owner's
//! inventory, reconciles it against the store's snapshot subscription, and
//! writes every mutation through to the store. [`ResultsView`] is the
//! read-only mirror of the parallel `apiResults` collection.

pub mod engine;
pub mod results;

pub use engine::{EngineError, InventoryEngine};
pub use results::{ResultRow, ResultsView};
