//! # corepos-store: Local Storage for CorePOS
//!
//! The register's durable key/value storage on SQLite. Every register
//! window opens the same database file; change notification between
//! windows lives in `corepos-sync`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  corepos-sync (SharedStorage)    corepos-client (token, caches)         │
//! │       │                                  │                              │
//! │       └──────────────┬───────────────────┘                              │
//! │                      ▼                                                  │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 corepos-store (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs) ──► LocalStorageRepository                 │   │
//! │  │   migrations (embedded)    keys (well-known key names)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │               corepos.db (SQLite, WAL)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use corepos_store::{keys, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("corepos.db")).await?;
//! db.local_storage().set(keys::COMPANY_ID, "7").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod keys;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::local_storage::{LocalStorageRepository, StoredEntry};
