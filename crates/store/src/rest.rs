//! HTTP document store client.
//!
//! Talks to a plain REST document API (`/owners/{owner}/inventory` and
//! `/owners/{owner}/apiResults`). The live-subscription primitive is
//! emulated by a polling watcher: the collection is re-fetched on an
//! interval and a snapshot is delivered whenever the document set changed.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use tracknow_core::{ApiResult, InventoryItem, ItemId, ItemPatch, NewItem, OwnerId};

use crate::remote::{RemoteStore, StoreError, StoreEvent, Subscription};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// REST-backed [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_poll_interval(base_url, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(base_url: impl Into<String>, poll_interval: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
            poll_interval,
        }
    }

    fn inventory_url(&self, owner: OwnerId) -> String {
        format!("{}/owners/{}/inventory", self.base_url, owner)
    }

    fn item_url(&self, owner: OwnerId, id: ItemId) -> String {
        format!("{}/owners/{}/inventory/{}", self.base_url, owner, id)
    }

    fn results_url(&self, owner: OwnerId) -> String {
        format!("{}/owners/{}/apiResults", self.base_url, owner)
    }

    /// Spawn a polling watcher for one collection URL.
    ///
    /// Must be called from within a tokio runtime. The watcher exits when
    /// the subscriber goes away or after the first fetch failure (the
    /// subscription's error event is terminal).
    fn spawn_watcher<T>(&self, url: String) -> Subscription<T>
    where
        T: DeserializeOwned + PartialEq + Clone + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last: Option<Vec<T>> = None;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                match fetch_collection::<T>(&client, &url).await {
                    Ok(docs) => {
                        if last.as_ref() == Some(&docs) {
                            continue;
                        }
                        if tx.send(StoreEvent::Snapshot(docs.clone())).is_err() {
                            break;
                        }
                        last = Some(docs);
                    }
                    Err(err) => {
                        tracing::warn!("snapshot watcher for {url} terminating: {err}");
                        let _ = tx.send(StoreEvent::Error(err));
                        break;
                    }
                }
            }
        });

        Subscription::new(rx)
    }
}

async fn fetch_collection<T>(client: &reqwest::Client, url: &str) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
{
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(StoreError::Unavailable(format!(
            "GET {url} returned {}",
            resp.status()
        )));
    }

    resp.json::<Vec<T>>()
        .await
        .map_err(|e| StoreError::Unavailable(format!("malformed collection body: {e}")))
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn create(&self, owner: OwnerId, item: NewItem) -> Result<ItemId, StoreError> {
        let url = self.inventory_url(owner);
        let resp = self
            .client
            .post(&url)
            .json(&item)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "POST {url} returned {}",
                resp.status()
            )));
        }

        // The API echoes the created document back with its assigned id.
        let created: InventoryItem = resp
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("malformed create response: {e}")))?;

        tracing::debug!(item = %created.id, owner = %owner, "created inventory document");
        Ok(created.id)
    }

    async fn update(&self, owner: OwnerId, id: ItemId, patch: ItemPatch) -> Result<(), StoreError> {
        let url = self.item_url(owner, id);
        let resp = self
            .client
            .patch(&url)
            .json(&patch)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "PATCH {url} returned {}",
                resp.status()
            )));
        }

        Ok(())
    }

    async fn delete(&self, owner: OwnerId, id: ItemId) -> Result<(), StoreError> {
        let url = self.item_url(owner, id);
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        // Idempotent: deleting an already-deleted document is fine.
        if resp.status() == reqwest::StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }

        Err(StoreError::Unavailable(format!(
            "DELETE {url} returned {}",
            resp.status()
        )))
    }

    fn subscribe(&self, owner: OwnerId) -> Subscription<InventoryItem> {
        self.spawn_watcher(self.inventory_url(owner))
    }

    fn subscribe_results(&self, owner: OwnerId) -> Subscription<ApiResult> {
        self.spawn_watcher(self.results_url(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let store = RestStore::new("http://localhost:9090///");
        let owner = OwnerId::new();
        assert!(
            store
                .inventory_url(owner)
                .starts_with("http://localhost:9090/owners/")
        );
        assert!(store.results_url(owner).ends_with("/apiResults"));
    }
}
