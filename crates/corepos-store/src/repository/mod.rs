//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  corepos-sync / corepos-client                                          │
//! │       │                                                                 │
//! │       │  db.local_storage().get_json::<CartSnapshot>(CURRENT_CART_STATE)│
//! │       ▼                                                                 │
//! │  LocalStorageRepository                                                 │
//! │  ├── get / get_json                                                     │
//! │  ├── set / set_json                                                     │
//! │  ├── remove / remove_all                                                │
//! │  └── keys_with_prefix                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  local_storage table                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod local_storage;
