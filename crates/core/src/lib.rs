//! `tracknow-core` — shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no IO, no HTTP, no camera
//! access): strongly-typed identifiers, the inventory data model with its
//! validation rules, and the user-facing error taxonomy.

pub mod error;
pub mod id;
pub mod item;

pub use error::ErrorKind;
pub use id::{ItemId, OwnerId};
pub use item::{ApiResult, InvalidItem, InventoryItem, ItemPatch, NewItem};
