//! # Broadcast Channels
//!
//! Named pub/sub channels between windows. A message posted on a channel
//! reaches every other handle open on the same name, never the poster.
//!
//! ```text
//! ChannelHub
//!   "pos-cart-sync" ──► broadcast::Sender<Envelope>
//!        ├── BroadcastChannel (cashier)   post() ─┐
//!        ├── BroadcastChannel (display)   ◄───────┤
//!        └── BroadcastChannel (kitchen)   ◄───────┘
//! ```
//!
//! The hub forgets a name once its last handle closes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::protocol::SyncMessage;

/// Buffered messages per handle.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct Envelope {
    source: Uuid,
    message: SyncMessage,
}

type Channels = HashMap<String, broadcast::Sender<Envelope>>;

/// Registry of named channels.
#[derive(Debug, Clone)]
pub struct ChannelHub {
    channels: Arc<Mutex<Channels>>,
    capacity: usize,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ChannelHub {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Opens a handle on `name`, creating the channel if needed.
    pub fn open(&self, name: &str) -> BroadcastChannel {
        let mut channels = lock(&self.channels);
        let sender = channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();
        let receiver = sender.subscribe();
        debug!(channel = name, handles = sender.receiver_count(), "Channel opened");

        BroadcastChannel {
            name: name.to_string(),
            id: Uuid::new_v4(),
            sender,
            receiver,
            channels: Arc::clone(&self.channels),
        }
    }

    /// Number of open handles on `name`.
    pub fn handle_count(&self, name: &str) -> usize {
        lock(&self.channels)
            .get(name)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    pub fn is_open(&self, name: &str) -> bool {
        lock(&self.channels).contains_key(name)
    }
}

fn lock(channels: &Mutex<Channels>) -> MutexGuard<'_, Channels> {
    // A panic while holding the lock cannot leave the map half-updated.
    channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One window's handle on a named channel. Closes on drop.
#[derive(Debug)]
pub struct BroadcastChannel {
    name: String,
    id: Uuid,
    sender: broadcast::Sender<Envelope>,
    receiver: broadcast::Receiver<Envelope>,
    channels: Arc<Mutex<Channels>>,
}

impl BroadcastChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Posts to every other handle. Returns how many received it.
    pub fn post(&self, message: SyncMessage) -> usize {
        let envelope = Envelope {
            source: self.id,
            message,
        };
        // The poster's own receiver counts as one.
        let delivered = self
            .sender
            .send(envelope)
            .map(|n| n.saturating_sub(1))
            .unwrap_or(0);
        debug!(channel = %self.name, delivered, "Message posted");
        delivered
    }

    /// Next message from another handle.
    pub async fn recv(&mut self) -> SyncResult<SyncMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(env) if env.source == self.id => continue,
                Ok(env) => return Ok(env.message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.name, skipped, "Channel handle lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(SyncError::ChannelClosed(self.name.clone()));
                }
            }
        }
    }

    /// Non-blocking receive. `Ok(None)` when nothing is waiting.
    pub fn try_recv(&mut self) -> SyncResult<Option<SyncMessage>> {
        loop {
            match self.receiver.try_recv() {
                Ok(env) if env.source == self.id => continue,
                Ok(env) => return Ok(Some(env.message)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(channel = %self.name, skipped, "Channel handle lagged");
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SyncError::ChannelClosed(self.name.clone()));
                }
            }
        }
    }

    /// Closes the handle.
    pub fn close(self) {}
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        let mut channels = lock(&self.channels);
        // Our receiver is still alive here, so 1 means "only us".
        if self.sender.receiver_count() <= 1 {
            channels.remove(&self.name);
            debug!(channel = %self.name, "Channel released");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageKind, CART_SYNC_CHANNEL};

    #[tokio::test]
    async fn test_no_self_delivery() {
        let hub = ChannelHub::new();
        let mut cashier = hub.open(CART_SYNC_CHANNEL);
        let mut display = hub.open(CART_SYNC_CHANNEL);

        assert_eq!(cashier.post(SyncMessage::cart_cleared()), 1);

        let msg = display.recv().await.unwrap();
        assert_eq!(msg.kind, MessageKind::CartCleared);
        assert_eq!(cashier.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_channels_are_separate() {
        let hub = ChannelHub::new();
        let a = hub.open("one");
        let mut b = hub.open("two");

        assert_eq!(a.post(SyncMessage::cart_cleared()), 0);
        assert_eq!(b.try_recv().unwrap(), None);
    }

    #[test]
    fn test_last_close_releases_name() {
        let hub = ChannelHub::new();
        let a = hub.open("pos-cart-sync");
        let b = hub.open("pos-cart-sync");
        assert_eq!(hub.handle_count("pos-cart-sync"), 2);

        a.close();
        assert!(hub.is_open("pos-cart-sync"));
        assert_eq!(hub.handle_count("pos-cart-sync"), 1);

        drop(b);
        assert!(!hub.is_open("pos-cart-sync"));
    }
}
