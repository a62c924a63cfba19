//! Store contract: per-owner document collections plus live subscriptions.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use tracknow_core::{ApiResult, ErrorKind, InventoryItem, ItemId, ItemPatch, NewItem, OwnerId};

/// Transport-level store failure model.
///
/// Every mutation is asynchronous; its effect is observed only through the
/// next snapshot delivered to a subscription, never through the mutation
/// call's own completion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached. The operation was abandoned.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The target document no longer exists (e.g. deleted concurrently).
    #[error("document not found")]
    NotFound,
}

impl From<StoreError> for ErrorKind {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => ErrorKind::StoreUnavailable(msg),
            StoreError::NotFound => ErrorKind::NotFound,
        }
    }
}

/// One delivery on a live subscription.
#[derive(Debug, Clone)]
pub enum StoreEvent<T> {
    /// The full current document set for the subscribed owner.
    Snapshot(Vec<T>),
    /// Terminal failure; fires at most once and ends the subscription.
    Error(StoreError),
}

/// A live subscription to an owner's document collection.
///
/// Deliveries continue until [`Subscription::unsubscribe`] is called (or the
/// subscription is dropped, which detaches it the same way). The first
/// delivery is the current snapshot at subscribe time.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<StoreEvent<T>>,
}

impl<T> Subscription<T> {
    pub fn new(receiver: mpsc::UnboundedReceiver<StoreEvent<T>>) -> Self {
        Self { receiver }
    }

    /// Wait for the next delivery. `None` means the store side closed the
    /// stream (after a terminal [`StoreEvent::Error`] or store shutdown).
    pub async fn recv(&mut self) -> Option<StoreEvent<T>> {
        self.receiver.recv().await
    }

    /// Stop receiving. Consuming `self` makes a second call impossible.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

/// Per-owner document store.
///
/// All operations are scoped by `owner`; a document is visible only through
/// its own owner's collection. The `apiResults` collection is a parallel,
/// display-only collection written by an upstream batch process.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a document. The store assigns `id` and `created_at`.
    async fn create(&self, owner: OwnerId, item: NewItem) -> Result<ItemId, StoreError>;

    /// Partial merge into an existing document.
    async fn update(&self, owner: OwnerId, id: ItemId, patch: ItemPatch) -> Result<(), StoreError>;

    /// Delete a document. Idempotent: deleting a missing id succeeds.
    async fn delete(&self, owner: OwnerId, id: ItemId) -> Result<(), StoreError>;

    /// Subscribe to the owner's inventory collection.
    fn subscribe(&self, owner: OwnerId) -> Subscription<InventoryItem>;

    /// Subscribe to the owner's `apiResults` collection.
    fn subscribe_results(&self, owner: OwnerId) -> Subscription<ApiResult>;
}

#[async_trait]
impl<S> RemoteStore for std::sync::Arc<S>
where
    S: RemoteStore + ?Sized,
{
    async fn create(&self, owner: OwnerId, item: NewItem) -> Result<ItemId, StoreError> {
        (**self).create(owner, item).await
    }

    async fn update(&self, owner: OwnerId, id: ItemId, patch: ItemPatch) -> Result<(), StoreError> {
        (**self).update(owner, id, patch).await
    }

    async fn delete(&self, owner: OwnerId, id: ItemId) -> Result<(), StoreError> {
        (**self).delete(owner, id).await
    }

    fn subscribe(&self, owner: OwnerId) -> Subscription<InventoryItem> {
        (**self).subscribe(owner)
    }

    fn subscribe_results(&self, owner: OwnerId) -> Subscription<ApiResult> {
        (**self).subscribe_results(owner)
    }
}
