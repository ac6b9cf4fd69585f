//! # Cart Snapshot
//!
//! The persisted and broadcast form of a cart, stored under
//! `current-cart-state` and carried in `CART_UPDATED` messages.
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "items": [ { "line_id": "…", "id": 7, "price": 1550, "quantity": 3, … } ],
//!   "discountType": "%",
//!   "discountValue": 10,
//!   "taxRate": 0.08,
//!   "total": 972,
//!   "subtotal": 1000,
//!   "timestamp": 1773446400000
//! }
//! ```
//!
//! `taxRate` is a decimal fraction and `discountValue` is cents for `fixed`
//! and percent for `%`. Every field has a default so partially written
//! snapshots still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{CartItem, CartState};
use crate::money::Money;
use crate::tax::{TaxPolicy, TaxType};
use crate::types::DiscountType;

/// Current snapshot schema. Bump on incompatible layout changes.
pub const CART_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    #[serde(default = "legacy_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_value: f64,
    #[serde(default)]
    pub tax_rate: f64,
    /// Per-type taxes, when the cart uses them instead of a flat rate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tax_types: Vec<TaxType>,
    #[serde(default)]
    pub total: Money,
    #[serde(default)]
    pub subtotal: Money,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// Snapshots written before versioning carry no version field.
fn legacy_version() -> u32 {
    CART_SNAPSHOT_VERSION
}

impl Default for CartSnapshot {
    fn default() -> Self {
        CartSnapshot {
            schema_version: CART_SNAPSHOT_VERSION,
            items: Vec::new(),
            discount_type: DiscountType::Fixed,
            discount_value: 0.0,
            tax_rate: 0.0,
            tax_types: Vec::new(),
            total: Money::zero(),
            subtotal: Money::zero(),
            timestamp: 0,
        }
    }
}

impl CartSnapshot {
    /// Captures a cart. The caller supplies the clock.
    pub fn capture(cart: &CartState, at: DateTime<Utc>) -> Self {
        let discount = cart.discount();
        let tax_types = match cart.tax_policy() {
            TaxPolicy::PerType(types) => types.clone(),
            TaxPolicy::Flat(_) => Vec::new(),
        };
        CartSnapshot {
            schema_version: CART_SNAPSHOT_VERSION,
            items: cart.items().to_vec(),
            discount_type: discount.discount_type(),
            discount_value: discount.display_value(),
            tax_rate: cart.tax_policy().effective_rate().fraction(),
            tax_types,
            total: cart.total(),
            subtotal: cart.subtotal(),
            timestamp: at.timestamp_millis(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::ProductInput;
    use crate::types::TaxRate;

    #[test]
    fn test_capture_and_apply() {
        let mut cart = CartState::new();
        cart.add_item(&ProductInput::new(1, "Burger", 500i64), 2).unwrap();
        cart.set_discount(DiscountType::Percentage, 10.0).unwrap();
        cart.set_tax_rate(TaxRate::from_bps(800)).unwrap();

        let snapshot = CartSnapshot::capture(&cart, Utc::now());
        assert_eq!(snapshot.subtotal.cents(), 1000);
        assert_eq!(snapshot.total.cents(), 972);
        assert_eq!(snapshot.discount_value, 10.0);
        assert!((snapshot.tax_rate - 0.08).abs() < 1e-9);

        let mut other = CartState::new();
        other.apply_snapshot(&snapshot);
        assert_eq!(other.items(), cart.items());
        assert_eq!(other.total(), cart.total());
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(CartSnapshot::default()).unwrap();
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["discountType"], "fixed");
        assert!(json["items"].is_array());
        assert!(json.get("taxTypes").is_none());
    }

    #[test]
    fn test_partial_snapshot_loads() {
        let snapshot: CartSnapshot = serde_json::from_str(r#"{"taxRate":0.05}"#).unwrap();
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.schema_version, CART_SNAPSHOT_VERSION);
        assert_eq!(snapshot.tax_rate, 0.05);
    }
}
