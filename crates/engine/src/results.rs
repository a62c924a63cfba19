//! Read-only mirror of the per-owner `apiResults` collection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use tracknow_core::{ApiResult, ErrorKind, InventoryItem, ItemId, OwnerId};
use tracknow_store::{RemoteStore, StoreEvent};

/// One display row: an inventory item with its optional enrichment, joined
/// by id. Enrichment never affects inventory invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub item: InventoryItem,
    pub enrichment: Option<ApiResult>,
}

struct Shared {
    results: Mutex<HashMap<ItemId, ApiResult>>,
    last_error: Mutex<Option<ErrorKind>>,
    revision: watch::Sender<u64>,
}

/// Reconciled mirror of the `apiResults` collection, same lifecycle as the
/// inventory engine: `start(owner)` / `stop()`, full-replace per snapshot.
pub struct ResultsView<S: RemoteStore> {
    store: S,
    shared: Arc<Shared>,
    active: Mutex<Option<JoinHandle<()>>>,
}

impl<S: RemoteStore + 'static> ResultsView<S> {
    pub fn new(store: S) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store,
            shared: Arc::new(Shared {
                results: Mutex::new(HashMap::new()),
                last_error: Mutex::new(None),
                revision,
            }),
            active: Mutex::new(None),
        }
    }

    pub fn start(&self, owner: OwnerId) {
        self.stop();

        let mut sub = self.store.subscribe_results(owner);
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                match event {
                    StoreEvent::Snapshot(results) => {
                        let map: HashMap<ItemId, ApiResult> =
                            results.into_iter().map(|r| (r.id, r)).collect();
                        *shared.results.lock().unwrap_or_else(|e| e.into_inner()) = map;
                        shared.revision.send_modify(|r| *r += 1);
                    }
                    StoreEvent::Error(err) => {
                        tracing::warn!(owner = %owner, "apiResults subscription ended: {err}");
                        *shared.last_error.lock().unwrap_or_else(|e| e.into_inner()) =
                            Some(err.into());
                        shared.revision.send_modify(|r| *r += 1);
                        break;
                    }
                }
            }
        });

        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    pub fn stop(&self) {
        if let Some(task) = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
            self.shared
                .results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
            self.shared.revision.send_modify(|r| *r += 1);
        }
    }

    /// Last reconciled results, ordered by id for stable rendering.
    pub fn results(&self) -> Vec<ApiResult> {
        let mut results: Vec<_> = self
            .shared
            .results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        results.sort_by_key(|r| r.id);
        results
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn revision(&self) -> u64 {
        *self.shared.revision.borrow()
    }

    pub async fn changed(&self, since: u64) {
        let mut rx = self.shared.revision.subscribe();
        let _ = rx.wait_for(|r| *r > since).await;
    }

    /// Join inventory items against the mirrored results by id.
    pub fn rows(&self, items: &[InventoryItem]) -> Vec<ResultRow> {
        let results = self.shared.results.lock().unwrap_or_else(|e| e.into_inner());
        items
            .iter()
            .map(|item| ResultRow {
                item: item.clone(),
                enrichment: results.get(&item.id).cloned(),
            })
            .collect()
    }
}

impl<S: RemoteStore> Drop for ResultsView<S> {
    fn drop(&mut self) {
        if let Some(task) = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use chrono::Utc;
    use tracknow_store::InMemoryStore;

    async fn wait_until<S: RemoteStore + 'static>(
        view: &ResultsView<S>,
        pred: impl Fn(&[ApiResult]) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let rev = view.revision();
                if pred(&view.results()) {
                    return;
                }
                view.changed(rev).await;
            }
        })
        .await
        .expect("results view did not reach the expected state");
    }

    fn item(id: ItemId, owner: OwnerId, name: &str) -> InventoryItem {
        InventoryItem {
            id,
            owner_id: owner,
            name: name.to_string(),
            quantity: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn mirrors_upstream_results() {
        let store = Arc::new(InMemoryStore::new());
        let view = ResultsView::new(store.clone());
        let owner = OwnerId::new();
        view.start(owner);

        let id = ItemId::new();
        store.put_api_result(
            owner,
            ApiResult {
                id,
                name: "a red apple".to_string(),
                quantity: Some(3),
            },
        );

        wait_until(&view, |results| results.len() == 1).await;
        assert_eq!(view.results()[0].name, "a red apple");
    }

    #[tokio::test]
    async fn rows_join_by_id_and_tolerate_missing_enrichment() {
        let store = Arc::new(InMemoryStore::new());
        let view = ResultsView::new(store.clone());
        let owner = OwnerId::new();
        view.start(owner);

        let enriched = ItemId::new();
        let plain = ItemId::new();
        store.put_api_result(
            owner,
            ApiResult {
                id: enriched,
                name: "a red apple".to_string(),
                quantity: None,
            },
        );
        wait_until(&view, |results| results.len() == 1).await;

        let items = vec![item(enriched, owner, "Apples"), item(plain, owner, "Pears")];
        let rows = view.rows(&items);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].enrichment.is_some());
        assert!(rows[1].enrichment.is_none());
    }

    #[tokio::test]
    async fn stop_clears_the_mirror() {
        let store = Arc::new(InMemoryStore::new());
        let view = ResultsView::new(store.clone());
        let owner = OwnerId::new();
        view.start(owner);

        store.put_api_result(
            owner,
            ApiResult {
                id: ItemId::new(),
                name: "a red apple".to_string(),
                quantity: None,
            },
        );
        wait_until(&view, |results| results.len() == 1).await;

        view.stop();
        assert!(view.results().is_empty());
    }
}
