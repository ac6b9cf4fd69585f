//! # corepos-core: Pure Register Logic for CorePOS
//!
//! Cart pricing, tax, invoice payloads and section projection as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CorePOS Register                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Front end (order entry, kitchen display, register)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   corepos-client (REST, kitchen service, hold conversion)       │   │
//! │  │   corepos-sync   (cross-window cart sync, event bus)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ corepos-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   money · price · cart · tax · snapshot · invoice · section     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` in integer cents
//! - [`price`] - The boundary where untyped amounts become `Money`
//! - [`cart`] - Cart state, actions and getters
//! - [`tax`] - The single tax calculator
//! - [`snapshot`] - Persisted/broadcast cart shape
//! - [`invoice`] - Server records, payload building, hold validation
//! - [`section`] - Kitchen/bar board projection
//! - [`types`] - Small domain enums and value types
//! - [`validation`] - Business rule checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use corepos_core::cart::{CartState, ProductInput};
//! use corepos_core::types::{DiscountType, TaxRate};
//!
//! let mut cart = CartState::new();
//! cart.add_item(&ProductInput::new(1, "Burger", 500i64), 2).unwrap();
//! cart.set_discount(DiscountType::Percentage, 10.0).unwrap();
//! cart.set_tax_rate(TaxRate::from_bps(800)).unwrap();
//!
//! assert_eq!(cart.total().cents(), 972);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod invoice;
pub mod money;
pub mod price;
pub mod section;
pub mod serde_helpers;
pub mod snapshot;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartItem, CartState, CartTotals, ProductInput};
pub use error::{CoreError, CoreResult, ValidationError};
pub use invoice::{
    CompanySettings, HoldInvoiceRecord, InvoiceContext, InvoicePayload, InvoiceRecord,
};
pub use money::Money;
pub use section::{SectionBoard, SectionInfo, SectionMap};
pub use snapshot::{CartSnapshot, CART_SNAPSHOT_VERSION};
pub use tax::{TaxCalculator, TaxPolicy, TaxType};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Catches a slipped finger (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
