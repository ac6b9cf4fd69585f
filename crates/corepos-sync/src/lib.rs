//! # corepos-sync: Cross-Window Sync for CorePOS
//!
//! Several windows of the register run against the same local storage: the
//! cashier screen, the customer-facing display, the kitchen screen. This
//! crate keeps them in step.
//!
//! ## Module Organization
//!
//! - [`storage`] - Shared storage with per-window change events
//! - [`channel`] - Named broadcast channels without self-delivery
//! - [`protocol`] - Versioned message envelope
//! - [`cart_sync`] - Cart snapshot persistence and broadcast
//! - [`event_bus`] - Named events over storage
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use corepos_sync::{CartSyncService, ChannelHub, SharedStorage};
//!
//! let storage = SharedStorage::new(db.local_storage());
//! let hub = ChannelHub::new();
//!
//! let cashier = CartSyncService::new(storage.open_window(), hub.clone());
//! let display = CartSyncService::new(storage.open_window(), hub.clone());
//!
//! let _sub = display.subscribe(|msg| println!("{msg:?}"));
//! cashier.save_cart_state(&cart).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart_sync;
pub mod channel;
pub mod error;
pub mod event_bus;
pub mod protocol;
pub mod storage;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart_sync::{CartSubscription, CartSyncService};
pub use channel::{BroadcastChannel, ChannelHub};
pub use error::{SyncError, SyncResult};
pub use event_bus::{EventBus, EventRecord, ListenerId, RemoteForwarder};
pub use protocol::{CartMessage, MessageKind, SyncMessage, CART_SYNC_CHANNEL, PROTOCOL_VERSION};
pub use storage::{SharedStorage, StorageEvent, StorageHandle, StorageListener, WindowId};
