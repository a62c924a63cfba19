//! `tracknow-store` — the remote document store boundary.
//!
//! Per-owner document collections with create/update/delete and a live
//! snapshot subscription. Two implementations:
//!
//! - [`InMemoryStore`]: in-process, for tests/dev.
//! - [`RestStore`]: HTTP document API client with a polling snapshot watcher.

pub mod in_memory;
pub mod remote;
pub mod rest;

pub use in_memory::InMemoryStore;
pub use remote::{RemoteStore, StoreError, StoreEvent, Subscription};
pub use rest::RestStore;
