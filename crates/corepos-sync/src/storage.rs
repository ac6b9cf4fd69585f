//! # Shared Storage
//!
//! Local storage shared by every register window, with change events.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  window A (StorageHandle)        window B (StorageHandle)               │
//! │       │ set("current-cart-state")        ▲                              │
//! │       ▼                                  │ StorageEvent                 │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ SharedStorage                                                    │  │
//! │  │   LocalStorageRepository ──► local_storage table                 │  │
//! │  │   broadcast::Sender<StorageEvent> ──► every listener             │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  A never sees its own write as an event.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use corepos_store::LocalStorageRepository;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// Buffered events per listener before it starts lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Identifies one register window.
pub type WindowId = Uuid;

/// A change made by some window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    pub source: WindowId,
}

/// The storage every window shares.
#[derive(Debug, Clone)]
pub struct SharedStorage {
    repo: LocalStorageRepository,
    events: broadcast::Sender<StorageEvent>,
}

impl SharedStorage {
    pub fn new(repo: LocalStorageRepository) -> Self {
        Self::with_capacity(repo, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(repo: LocalStorageRepository, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        SharedStorage { repo, events }
    }

    /// Opens a handle for a new window.
    pub fn open_window(&self) -> StorageHandle {
        StorageHandle {
            window: Uuid::new_v4(),
            storage: self.clone(),
        }
    }

    pub fn repository(&self) -> &LocalStorageRepository {
        &self.repo
    }
}

/// One window's view of [`SharedStorage`].
#[derive(Debug, Clone)]
pub struct StorageHandle {
    window: WindowId,
    storage: SharedStorage,
}

impl StorageHandle {
    pub fn window_id(&self) -> WindowId {
        self.window
    }

    /// The storage this handle belongs to, for opening sibling windows.
    pub fn shared(&self) -> &SharedStorage {
        &self.storage
    }

    pub async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.storage.repo.get(key).await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        Ok(self.storage.repo.get_json(key).await?)
    }

    /// Stores `value` and notifies the other windows.
    pub async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let old_value = self.storage.repo.get(key).await?;
        self.storage.repo.set(key, value).await?;
        self.publish(key, old_value, Some(value.to_string()));
        Ok(())
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> SyncResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }

    /// Removes `key`. Other windows hear about it only if it existed.
    pub async fn remove(&self, key: &str) -> SyncResult<bool> {
        let old_value = self.storage.repo.get(key).await?;
        let removed = self.storage.repo.remove(key).await?;
        if removed {
            self.publish(key, old_value, None);
        }
        Ok(removed)
    }

    /// Listens for changes made by other windows.
    pub fn listen(&self) -> StorageListener {
        StorageListener {
            window: self.window,
            receiver: self.storage.events.subscribe(),
        }
    }

    fn publish(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        let event = StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            source: self.window,
        };
        // No listeners is fine.
        let delivered = self.storage.events.send(event).unwrap_or(0);
        debug!(key, window = %self.window, delivered, "Storage event published");
    }
}

/// Receives storage events from other windows.
#[derive(Debug)]
pub struct StorageListener {
    window: WindowId,
    receiver: broadcast::Receiver<StorageEvent>,
}

impl StorageListener {
    /// Next change from another window.
    ///
    /// Lagging skips the dropped events with a warning.
    /// `ChannelClosed` means the storage itself is gone.
    pub async fn recv(&mut self) -> SyncResult<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.source == self.window => continue,
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(window = %self.window, skipped, "Storage listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(SyncError::ChannelClosed("storage".to_string()));
                }
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `Ok(None)` when
    /// nothing is waiting.
    pub fn try_recv(&mut self) -> SyncResult<Option<StorageEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.source == self.window => continue,
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(window = %self.window, skipped, "Storage listener lagged");
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SyncError::ChannelClosed("storage".to_string()));
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use corepos_store::{Database, DbConfig};

    pub(crate) async fn shared() -> SharedStorage {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SharedStorage::new(db.local_storage())
    }

    #[tokio::test]
    async fn test_events_reach_other_windows_only() {
        let storage = shared().await;
        let cashier = storage.open_window();
        let display = storage.open_window();

        let mut cashier_events = cashier.listen();
        let mut display_events = display.listen();

        cashier.set("token", "abc").await.unwrap();

        let event = display_events.recv().await.unwrap();
        assert_eq!(event.key, "token");
        assert_eq!(event.old_value, None);
        assert_eq!(event.new_value.as_deref(), Some("abc"));
        assert_eq!(event.source, cashier.window_id());

        assert_eq!(cashier_events.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_shared_between_windows() {
        let storage = shared().await;
        let a = storage.open_window();
        let b = storage.open_window();

        a.set_json("selectedStore", &serde_json::json!({"id": 2})).await.unwrap();
        let value: serde_json::Value = b.get_json("selectedStore").await.unwrap().unwrap();
        assert_eq!(value["id"], 2);
    }

    #[tokio::test]
    async fn test_remove_publishes_once() {
        let storage = shared().await;
        let a = storage.open_window();
        let b = storage.open_window();
        let mut events = b.listen();

        a.set("companyId", "7").await.unwrap();
        assert!(a.remove("companyId").await.unwrap());
        assert!(!a.remove("companyId").await.unwrap());

        let set = events.recv().await.unwrap();
        assert_eq!(set.new_value.as_deref(), Some("7"));
        let removed = events.recv().await.unwrap();
        assert_eq!(removed.old_value.as_deref(), Some("7"));
        assert_eq!(removed.new_value, None);
        assert_eq!(events.try_recv().unwrap(), None);
    }
}
