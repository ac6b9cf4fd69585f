//! # corepos-client: Backend Services for the CorePOS Register
//!
//! Everything that needs the core-pos REST backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PosClient (client.rs)                          │
//! │                                                                         │
//! │   ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐   │
//! │   │ KitchenService   │   │ HoldOrderService │   │ CartSyncService  │   │
//! │   │                  │   │                  │   │ EventBus         │   │
//! │   │ board refresh    │   │ save / load      │   │ (corepos-sync)   │   │
//! │   │ status changes   │   │ conversion saga  │   │                  │   │
//! │   │ with rollback    │   │ reconciliation   │   │                  │   │
//! │   └───┬──────┬───────┘   └────────┬─────────┘   └──────────────────┘   │
//! │       │      │                    │                                     │
//! │       │   SectionCache (moka)     │                                     │
//! │       │   retry (backoff)         │                                     │
//! │       │   Debouncer               │                                     │
//! │       ▼                           ▼                                     │
//! │   ┌─────────────────────────────────────────────────────────────────┐   │
//! │   │ PosApi trait ──► HttpPosApi (reqwest, bearer + company header)  │   │
//! │   └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Errors
//! Every service returns [`ApiError`]: a code from [`ErrorCode`], a message
//! and optional details. It serializes to `{success:false, message, code,
//! details}` for the front end.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod hold;
pub mod kitchen;
pub mod retry;
pub mod section_cache;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::http::{Credentials, HttpPosApi};
pub use api::{ItemStatusChange, OrderQuery, OrderStatusChange, PosApi};
pub use client::PosClient;
pub use config::{
    ApiSettings, ConfigError, KitchenSettings, PosConfig, RetrySettings, StorageSettings,
    SyncSettings,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use hold::{
    ConversionOutcome, ConversionRecord, ConversionStep, HoldOrderService, PendingReconciliation,
    ReconcileReport,
};
pub use kitchen::{KitchenService, OrderScope};
pub use section_cache::SectionCache;
