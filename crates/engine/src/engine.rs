//! The inventory engine: reconciled local view + write-through mutations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tracknow_core::{ErrorKind, InvalidItem, InventoryItem, ItemId, ItemPatch, NewItem, OwnerId};
use tracknow_store::{RemoteStore, StoreError, StoreEvent};

/// Failure of an engine operation.
///
/// Every failure is also recorded as [`InventoryEngine::last_error`] so the
/// caller can render it; none are fatal and none are retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidItem),

    #[error("no active owner; call start first")]
    NotStarted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<EngineError> for ErrorKind {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput(e) => e.into(),
            EngineError::NotStarted => {
                ErrorKind::invalid_input("no active owner; call start first")
            }
            EngineError::Store(e) => e.into(),
        }
    }
}

/// State shared between the engine handle and its reconciliation task.
struct Shared {
    items: Mutex<HashMap<ItemId, InventoryItem>>,
    last_error: Mutex<Option<ErrorKind>>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            items: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
            revision,
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    fn set_error(&self, kind: Option<ErrorKind>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = kind;
    }
}

struct Active {
    owner: OwnerId,
    task: JoinHandle<()>,
}

/// Authoritative local view of one owner's inventory.
///
/// The local map is mutated only by the reconciliation task, which replaces
/// it wholesale with every snapshot the subscription delivers. Mutation
/// operations write to the store alone; their effect becomes visible once
/// the corresponding snapshot round-trips.
pub struct InventoryEngine<S: RemoteStore> {
    store: S,
    shared: Arc<Shared>,
    active: Mutex<Option<Active>>,
}

impl<S: RemoteStore + 'static> InventoryEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            shared: Arc::new(Shared::new()),
            active: Mutex::new(None),
        }
    }

    /// Open the subscription for `owner`.
    ///
    /// At most one subscription is live at a time: a previous owner's
    /// subscription is torn down first and the local view cleared, so no
    /// stale data leaks across users.
    pub fn start(&self, owner: OwnerId) {
        self.stop();

        let mut sub = self.store.subscribe(owner);
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                match event {
                    StoreEvent::Snapshot(items) => {
                        let map: HashMap<ItemId, InventoryItem> =
                            items.into_iter().map(|item| (item.id, item)).collect();
                        *shared.items.lock().unwrap_or_else(|e| e.into_inner()) = map;
                        shared.bump();
                    }
                    StoreEvent::Error(err) => {
                        tracing::warn!(owner = %owner, "inventory subscription ended: {err}");
                        shared.set_error(Some(err.into()));
                        shared.bump();
                        break;
                    }
                }
            }
        });

        tracing::debug!(owner = %owner, "inventory engine started");
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(Active { owner, task });
    }

    /// Tear down the active subscription, if any, and clear the local view.
    pub fn stop(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(active) = previous {
            // Aborting drops the subscription held by the task, which
            // detaches it from the store.
            active.task.abort();
            self.shared
                .items
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
            self.shared.bump();
            tracing::debug!(owner = %active.owner, "inventory engine stopped");
        }
    }

    /// The currently subscribed owner.
    pub fn owner(&self) -> Option<OwnerId> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|a| a.owner)
    }

    /// Last reconciled items, in creation order.
    pub fn items(&self) -> Vec<InventoryItem> {
        let mut items: Vec<_> = self
            .shared
            .items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        items
    }

    pub fn get(&self, id: ItemId) -> Option<InventoryItem> {
        self.shared
            .items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// The most recent failure, for rendering. Cleared when the next
    /// operation begins.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Reconciliation counter: increments once per applied snapshot (and on
    /// teardown).
    pub fn revision(&self) -> u64 {
        *self.shared.revision.borrow()
    }

    /// Wait until the revision advances past `since`.
    pub async fn changed(&self, since: u64) {
        let mut rx = self.shared.revision.subscribe();
        let _ = rx.wait_for(|r| *r > since).await;
    }

    /// Validate and create an item.
    ///
    /// Invalid input is rejected locally; the store is never called for it.
    pub async fn add(&self, name: &str, quantity: i64) -> Result<ItemId, EngineError> {
        self.shared.set_error(None);
        let owner = self.require_owner()?;

        let item = match NewItem::new(name, quantity) {
            Ok(item) => item,
            Err(invalid) => {
                self.shared.set_error(Some(invalid.clone().into()));
                return Err(invalid.into());
            }
        };

        match self.store.create(owner, item).await {
            Ok(id) => {
                tracing::debug!(item = %id, "created inventory item");
                Ok(id)
            }
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Raise the quantity by one.
    ///
    /// The new value is computed from the last reconciled quantity, not an
    /// atomic server-side increment; concurrent writers race last-write-wins.
    pub async fn increment_quantity(&self, id: ItemId) -> Result<(), EngineError> {
        self.shared.set_error(None);
        let owner = self.require_owner()?;

        let Some(current) = self.get(id).map(|item| item.quantity) else {
            tracing::debug!(item = %id, "increment on unknown item ignored");
            return Ok(());
        };

        match self
            .store
            .update(owner, id, ItemPatch::quantity(current + 1))
            .await
        {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Lower the quantity by one, deleting the item instead of ever
    /// persisting a quantity of 0.
    pub async fn decrement_or_remove(&self, id: ItemId) -> Result<(), EngineError> {
        self.shared.set_error(None);
        let owner = self.require_owner()?;

        let Some(current) = self.get(id).map(|item| item.quantity) else {
            tracing::debug!(item = %id, "decrement on unknown item ignored");
            return Ok(());
        };

        let result = if current > 1 {
            self.store
                .update(owner, id, ItemPatch::quantity(current - 1))
                .await
        } else {
            self.store.delete(owner, id).await
        };

        match result {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Unconditional delete. Deleting an absent item is a no-op.
    pub async fn remove(&self, id: ItemId) -> Result<(), EngineError> {
        self.shared.set_error(None);
        let owner = self.require_owner()?;

        match self.store.delete(owner, id).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(self.surface(err)),
        }
    }

    fn require_owner(&self) -> Result<OwnerId, EngineError> {
        self.owner().ok_or_else(|| {
            let err = EngineError::NotStarted;
            self.shared.set_error(Some(err.clone().into()));
            err
        })
    }

    fn surface(&self, err: StoreError) -> EngineError {
        self.shared.set_error(Some(err.clone().into()));
        EngineError::Store(err)
    }
}

impl<S: RemoteStore> Drop for InventoryEngine<S> {
    fn drop(&mut self) {
        if let Some(active) = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            active.task.abort();
        }
    }
}
