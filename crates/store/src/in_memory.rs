//! In-memory document store.
//!
//! Intended for tests/dev. Not optimized for performance. Snapshot delivery
//! is synchronous with the mutation, which keeps tests deterministic.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use tracknow_core::{ApiResult, InventoryItem, ItemId, ItemPatch, NewItem, OwnerId};

use crate::remote::{RemoteStore, StoreError, StoreEvent, Subscription};

#[derive(Default)]
struct OwnerState {
    items: HashMap<ItemId, InventoryItem>,
    results: HashMap<ItemId, ApiResult>,
    item_subs: Vec<mpsc::UnboundedSender<StoreEvent<InventoryItem>>>,
    result_subs: Vec<mpsc::UnboundedSender<StoreEvent<ApiResult>>>,
}

impl OwnerState {
    fn item_snapshot(&self) -> Vec<InventoryItem> {
        let mut items: Vec<_> = self.items.values().cloned().collect();
        items.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        items
    }

    fn result_snapshot(&self) -> Vec<ApiResult> {
        let mut results: Vec<_> = self.results.values().cloned().collect();
        results.sort_by(|a, b| a.id.cmp(&b.id));
        results
    }

    fn publish_items(&mut self) {
        let snapshot = self.item_snapshot();
        // Drop any dead subscribers while publishing.
        self.item_subs
            .retain(|tx| tx.send(StoreEvent::Snapshot(snapshot.clone())).is_ok());
    }

    fn publish_results(&mut self) {
        let snapshot = self.result_snapshot();
        self.result_subs
            .retain(|tx| tx.send(StoreEvent::Snapshot(snapshot.clone())).is_ok());
    }
}

/// In-memory per-owner document store with live snapshot delivery.
#[derive(Default)]
pub struct InMemoryStore {
    owners: Mutex<HashMap<OwnerId, OwnerState>>,
    available: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            owners: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated transport availability.
    ///
    /// While unavailable, every mutation fails with
    /// [`StoreError::Unavailable`] and no document changes.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Write into the owner's `apiResults` collection (upstream batch
    /// process stand-in).
    pub fn put_api_result(&self, owner: OwnerId, result: ApiResult) {
        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let state = owners.entry(owner).or_default();
        state.results.insert(result.id, result);
        state.publish_results();
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn create(&self, owner: OwnerId, item: NewItem) -> Result<ItemId, StoreError> {
        self.check_available()?;

        let id = ItemId::new();
        let doc = InventoryItem {
            id,
            owner_id: owner,
            name: item.name().to_string(),
            quantity: item.quantity(),
            created_at: Utc::now(),
        };

        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let state = owners.entry(owner).or_default();
        state.items.insert(id, doc);
        state.publish_items();

        Ok(id)
    }

    async fn update(&self, owner: OwnerId, id: ItemId, patch: ItemPatch) -> Result<(), StoreError> {
        self.check_available()?;

        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let state = owners.entry(owner).or_default();
        let item = state.items.get_mut(&id).ok_or(StoreError::NotFound)?;
        patch.apply(item);
        state.publish_items();

        Ok(())
    }

    async fn delete(&self, owner: OwnerId, id: ItemId) -> Result<(), StoreError> {
        self.check_available()?;

        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let state = owners.entry(owner).or_default();

        // Idempotent: deleting a missing id changes nothing, so nothing is
        // published either.
        if state.items.remove(&id).is_some() {
            state.publish_items();
        }

        Ok(())
    }

    fn subscribe(&self, owner: OwnerId) -> Subscription<InventoryItem> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let state = owners.entry(owner).or_default();
        // Initial snapshot is delivered immediately, as the remote store does.
        let _ = tx.send(StoreEvent::Snapshot(state.item_snapshot()));
        state.item_subs.push(tx);

        Subscription::new(rx)
    }

    fn subscribe_results(&self, owner: OwnerId) -> Subscription<ApiResult> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        let state = owners.entry(owner).or_default();
        let _ = tx.send(StoreEvent::Snapshot(state.result_snapshot()));
        state.result_subs.push(tx);

        Subscription::new(rx)
    }
}
