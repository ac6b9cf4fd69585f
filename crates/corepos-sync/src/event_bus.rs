//! # Event Bus
//!
//! Named events between windows, carried through shared storage.
//!
//! ```text
//! emit("order-completed", payload)
//!   ├──► storage["pos-event:order-completed"] = { payload, timestamp }
//!   │        └──► StorageEvent ──► other windows' forwarders ──► their listeners
//!   └──► this window's listeners, called directly
//! ```
//!
//! Every emit writes a fresh timestamp, so repeating an event with the
//! same payload still notifies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use corepos_store::keys;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::storage::StorageHandle;

/// What is stored under an event key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub payload: Value,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// Returned by [`EventBus::on`], passed back to [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
}

/// Event bus for one window.
#[derive(Clone)]
pub struct EventBus {
    storage: StorageHandle,
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("window", &self.storage.window_id())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(storage: StorageHandle) -> Self {
        EventBus {
            storage,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Registers `listener` for `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let Some(list) = registry.listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() < before;
        if list.is_empty() {
            registry.listeners.remove(event);
        }
        removed
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().listeners.get(event).map_or(0, Vec::len)
    }

    /// Publishes `payload` to this window's listeners and, through storage,
    /// to every other window.
    pub async fn emit(&self, event: &str, payload: Value) -> SyncResult<()> {
        let record = EventRecord {
            payload,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.storage.set_json(&keys::event_key(event), &record).await?;
        debug!(event, "Event emitted");
        self.dispatch(event, &record.payload);
        Ok(())
    }

    /// Last record stored for `event`, from any window.
    pub async fn last(&self, event: &str) -> SyncResult<Option<EventRecord>> {
        self.storage.get_json(&keys::event_key(event)).await
    }

    /// Delivers other windows' events to this window's listeners until the
    /// returned forwarder is dropped.
    pub fn forward_remote(&self) -> RemoteForwarder {
        let mut listener = self.storage.listen();
        let bus = self.clone();

        let task = tokio::spawn(async move {
            loop {
                let change = match listener.recv().await {
                    Ok(change) => change,
                    Err(SyncError::ChannelClosed(_)) => break,
                    Err(e) => {
                        warn!(error = %e, "Event forwarder receive failed");
                        continue;
                    }
                };
                let Some(event) = keys::event_name(&change.key) else {
                    continue;
                };
                let Some(raw) = change.new_value else {
                    continue;
                };
                match serde_json::from_str::<EventRecord>(&raw) {
                    Ok(record) => bus.dispatch(event, &record.payload),
                    Err(e) => warn!(event, error = %e, "Unreadable event record"),
                }
            }
        });

        RemoteForwarder { task }
    }

    fn dispatch(&self, event: &str, payload: &Value) {
        // Clone out so listeners can call on/off without deadlocking.
        let listeners: Vec<Listener> = self
            .lock()
            .listeners
            .get(event)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(payload);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Background task feeding remote events into an [`EventBus`]. Stops on drop.
#[derive(Debug)]
pub struct RemoteForwarder {
    task: JoinHandle<()>,
}

impl Drop for RemoteForwarder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::shared;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_local_listeners_called_directly() {
        let storage = shared().await;
        let bus = EventBus::new(storage.open_window());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = bus.on("order-completed", move |payload| {
            let _ = tx.send(payload.clone());
        });

        bus.emit("order-completed", json!({"invoice_id": 9})).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), json!({"invoice_id": 9}));

        assert!(bus.off("order-completed", id));
        assert!(!bus.off("order-completed", id));
        bus.emit("order-completed", json!({"invoice_id": 10})).await.unwrap();
        assert!(rx.try_recv().is_err());

        let last = bus.last("order-completed").await.unwrap().unwrap();
        assert_eq!(last.payload, json!({"invoice_id": 10}));
        assert!(last.timestamp > 0);
    }

    #[tokio::test]
    async fn test_remote_windows_receive_through_storage() {
        let storage = shared().await;
        let cashier = EventBus::new(storage.open_window());
        let kitchen = EventBus::new(storage.open_window());

        let (tx, mut rx) = mpsc::unbounded_channel();
        kitchen.on("hold-converted", move |payload| {
            let _ = tx.send(payload.clone());
        });
        let _forwarder = kitchen.forward_remote();

        cashier.emit("hold-converted", json!({"hold_id": 4})).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, json!({"hold_id": 4}));
    }

    #[tokio::test]
    async fn test_non_event_keys_ignored() {
        let storage = shared().await;
        let cashier = storage.open_window();
        let kitchen = EventBus::new(storage.open_window());

        let (tx, mut rx) = mpsc::unbounded_channel();
        kitchen.on("token", move |payload| {
            let _ = tx.send(payload.clone());
        });
        let _forwarder = kitchen.forward_remote();

        cashier.set("token", r#"{"payload":1,"timestamp":1}"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(kitchen.listener_count("token"), 1);
    }
}
