//! # Cart Sync Service
//!
//! Persists the cart after every mutation and broadcasts it to the other
//! windows (customer display, second register screen).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  save_cart_state(cart)                                                  │
//! │     │                                                                   │
//! │     ├──► CartSnapshot::capture(cart, now)                               │
//! │     ├──► storage["current-cart-state"] = snapshot      (durable)        │
//! │     └──► "pos-cart-sync" ◄── CART_UPDATED { snapshot } (live)           │
//! │                                                                         │
//! │  load_cart_state()                                                      │
//! │     └──► storage["current-cart-state"], repaired, or the empty cart     │
//! │                                                                         │
//! │  subscribe(callback) ──► CartSubscription (drop to stop)                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Last writer wins. One cashier window is expected to write; nothing
//! stops two from doing so.

use chrono::Utc;
use corepos_core::cart::{CartItem, CartState};
use corepos_core::snapshot::CartSnapshot;
use corepos_store::keys;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{BroadcastChannel, ChannelHub};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{check_snapshot_version, CartMessage, SyncMessage, CART_SYNC_CHANNEL};
use crate::storage::StorageHandle;

/// Cart persistence and broadcast for one window.
#[derive(Debug)]
pub struct CartSyncService {
    storage: StorageHandle,
    hub: ChannelHub,
    channel: BroadcastChannel,
}

impl CartSyncService {
    pub fn new(storage: StorageHandle, hub: ChannelHub) -> Self {
        Self::with_channel(storage, hub, CART_SYNC_CHANNEL)
    }

    /// Uses a channel name other than `pos-cart-sync`.
    pub fn with_channel(storage: StorageHandle, hub: ChannelHub, channel_name: &str) -> Self {
        let channel = hub.open(channel_name);
        CartSyncService {
            storage,
            hub,
            channel,
        }
    }

    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    /// Persists a snapshot of `cart` and broadcasts it.
    pub async fn save_cart_state(&self, cart: &CartState) -> SyncResult<CartSnapshot> {
        let snapshot = CartSnapshot::capture(cart, Utc::now());
        self.storage
            .set_json(keys::CURRENT_CART_STATE, &snapshot)
            .await?;

        let delivered = self.channel.post(SyncMessage::cart_updated(&snapshot)?);
        debug!(
            items = snapshot.items.len(),
            total = snapshot.total.cents(),
            delivered,
            "Cart state saved"
        );
        Ok(snapshot)
    }

    /// Forgets the persisted cart and tells the other windows.
    pub async fn clear_cart_state(&self) -> SyncResult<()> {
        self.storage.remove(keys::CURRENT_CART_STATE).await?;
        self.channel.post(SyncMessage::cart_cleared());
        info!("Cart state cleared");
        Ok(())
    }

    /// Loads the persisted snapshot.
    ///
    /// Missing or unreadable storage gives the empty snapshot. Individual
    /// malformed items are dropped. Only a snapshot from a newer schema is
    /// an error.
    pub async fn load_cart_state(&self) -> SyncResult<CartSnapshot> {
        let Some(raw) = self.storage.get(keys::CURRENT_CART_STATE).await? else {
            return Ok(CartSnapshot::default());
        };
        let snapshot = repair_snapshot(&raw);
        check_snapshot_version(&snapshot)?;
        Ok(snapshot)
    }

    /// Loads the persisted snapshot into `cart`. Returns whether anything
    /// was restored.
    pub async fn restore_into(&self, cart: &mut CartState) -> SyncResult<bool> {
        let snapshot = self.load_cart_state().await?;
        if snapshot.is_empty() {
            return Ok(false);
        }
        cart.apply_snapshot(&snapshot);
        info!(items = snapshot.items.len(), "Cart restored from storage");
        Ok(true)
    }

    /// Calls `callback` for every cart message from another window until the
    /// subscription is dropped.
    ///
    /// Messages from a newer schema are logged and skipped.
    pub fn subscribe<F>(&self, mut callback: F) -> CartSubscription
    where
        F: FnMut(CartMessage) + Send + 'static,
    {
        let mut channel = self.hub.open(self.channel.name());
        let name = channel.name().to_string();

        let task = tokio::spawn(async move {
            loop {
                let message = match channel.recv().await {
                    Ok(message) => message,
                    Err(SyncError::ChannelClosed(_)) => break,
                    Err(e) => {
                        warn!(error = %e, "Cart channel receive failed");
                        continue;
                    }
                };
                match message.decode_cart() {
                    Ok(Some(cart_message)) => callback(cart_message),
                    Ok(None) => debug!(kind = ?message.kind, "Ignoring message"),
                    Err(e) => warn!(error = %e, "Skipping cart message"),
                }
            }
        });

        debug!(channel = %name, "Cart subscription started");
        CartSubscription { task: Some(task) }
    }
}

/// Rebuilds a snapshot from whatever is stored, keeping what parses.
fn repair_snapshot(raw: &str) -> CartSnapshot {
    let mut object = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => object,
        Ok(_) | Err(_) => {
            warn!("Stored cart state is not an object, using empty cart");
            return CartSnapshot::default();
        }
    };

    let items = match object.remove("items") {
        Some(Value::Array(entries)) => {
            let total = entries.len();
            let items: Vec<CartItem> = entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect();
            if items.len() < total {
                warn!(dropped = total - items.len(), "Dropped malformed cart items");
            }
            items
        }
        Some(Value::Object(single)) => serde_json::from_value(Value::Object(single))
            .map(|item| vec![item])
            .unwrap_or_default(),
        Some(_) | None => Vec::new(),
    };

    let mut snapshot: CartSnapshot = serde_json::from_value(Value::Object(object))
        .unwrap_or_else(|e| {
            warn!(error = %e, "Stored cart fields unreadable, keeping items only");
            CartSnapshot::default()
        });
    snapshot.items = items;
    snapshot
}

/// Live cart subscription. Dropping it stops delivery and closes its
/// channel handle.
#[derive(Debug)]
pub struct CartSubscription {
    task: Option<JoinHandle<()>>,
}

impl CartSubscription {
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Cart subscription stopped");
        }
    }
}

impl Drop for CartSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::shared;
    use corepos_core::cart::ProductInput;
    use corepos_core::types::{DiscountType, TaxRate};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn sample_cart() -> CartState {
        let mut cart = CartState::new();
        cart.add_item(&ProductInput::new(1, "Burger", 500i64), 2).unwrap();
        cart.set_discount(DiscountType::Percentage, 10.0).unwrap();
        cart.set_tax_rate(TaxRate::from_bps(800)).unwrap();
        cart
    }

    #[tokio::test]
    async fn test_save_then_load_in_fresh_instance() {
        let storage = shared().await;
        let hub = ChannelHub::new();

        let writer = CartSyncService::new(storage.open_window(), hub.clone());
        let saved = writer.save_cart_state(&sample_cart()).await.unwrap();
        assert_eq!(saved.total.cents(), 972);

        let reader = CartSyncService::new(storage.open_window(), hub);
        let loaded = reader.load_cart_state().await.unwrap();
        assert_eq!(loaded, saved);

        let mut restored = CartState::new();
        assert!(reader.restore_into(&mut restored).await.unwrap());
        assert_eq!(restored.subtotal().cents(), 1000);
        assert_eq!(restored.discount_amount().cents(), 100);
        assert_eq!(restored.tax_amount().cents(), 72);
        assert_eq!(restored.total().cents(), 972);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_storage_gives_default() {
        let storage = shared().await;
        let window = storage.open_window();
        let service = CartSyncService::new(window.clone(), ChannelHub::new());

        assert_eq!(service.load_cart_state().await.unwrap(), CartSnapshot::default());

        window.set(keys::CURRENT_CART_STATE, "{not json").await.unwrap();
        let loaded = service.load_cart_state().await.unwrap();
        assert!(loaded.items.is_empty());

        window.set(keys::CURRENT_CART_STATE, "[1,2,3]").await.unwrap();
        assert_eq!(service.load_cart_state().await.unwrap(), CartSnapshot::default());
    }

    #[tokio::test]
    async fn test_items_coerced_to_array() {
        let storage = shared().await;
        let window = storage.open_window();
        let service = CartSyncService::new(window.clone(), ChannelHub::new());

        window
            .set(keys::CURRENT_CART_STATE, r#"{"items":"oops","total":500}"#)
            .await
            .unwrap();
        let loaded = service.load_cart_state().await.unwrap();
        assert!(loaded.items.is_empty());
        assert_eq!(loaded.total.cents(), 500);

        window
            .set(
                keys::CURRENT_CART_STATE,
                r#"{"items":[{"id":1,"name":"Tea","price":250,"quantity":2},{"bogus":true},7]}"#,
            )
            .await
            .unwrap();
        let loaded = service.load_cart_state().await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].name, "Tea");
    }

    #[tokio::test]
    async fn test_newer_snapshot_rejected() {
        let storage = shared().await;
        let window = storage.open_window();
        let service = CartSyncService::new(window.clone(), ChannelHub::new());

        window
            .set(keys::CURRENT_CART_STATE, r#"{"schemaVersion":99,"items":[]}"#)
            .await
            .unwrap();
        assert!(matches!(
            service.load_cart_state().await,
            Err(SyncError::UnsupportedVersion { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscribers_receive_other_windows_updates() {
        let storage = shared().await;
        let hub = ChannelHub::new();
        let cashier = CartSyncService::new(storage.open_window(), hub.clone());
        let display = CartSyncService::new(storage.open_window(), hub.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = display.subscribe(move |msg| {
            let _ = tx.send(msg);
        });
        assert!(subscription.is_active());

        cashier.save_cart_state(&sample_cart()).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            CartMessage::Updated(snapshot) => assert_eq!(snapshot.total.cents(), 972),
            other => panic!("unexpected message: {other:?}"),
        }

        cashier.clear_cart_state().await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, CartMessage::Cleared);

        // cashier + display + the subscription's own handle
        assert_eq!(hub.handle_count(CART_SYNC_CHANNEL), 3);
        subscription.unsubscribe();
        for _ in 0..100 {
            if hub.handle_count(CART_SYNC_CHANNEL) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(hub.handle_count(CART_SYNC_CHANNEL), 2);
    }
}
