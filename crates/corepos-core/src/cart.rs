//! # Cart State
//!
//! The register's working order: lines, discount, tax policy, notes,
//! tables and the linkage to a hold order or invoice being edited.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  UI Action              Cart Action                 State Change        │
//! │  ─────────              ───────────                 ────────────        │
//! │                                                                         │
//! │  Tap product ─────────► add_item() ──────────────► push / qty += n      │
//! │  Change quantity ─────► update_item_quantity() ──► items[i].qty = n     │
//! │  Split a line ────────► split_item() ────────────► insert at i + 1      │
//! │  Remove ──────────────► remove_item() / remove_line()                   │
//! │  Open hold / invoice ─► load_invoice() ──────────► clear + repopulate   │
//! │  Other window wrote ──► apply_snapshot() ────────► wholesale replace    │
//! │                                                                         │
//! │  Getters (subtotal, tax, total) are recomputed on every call.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Identity
//! A line has two ids. `id` is the catalog item id and repeats after a split.
//! `line_id` is a per-line UUID and never repeats. `remove_item(id, None)`
//! removes every line of that catalog item; pass an index or use
//! `remove_line` to remove exactly one.
//!
//! ## Totals
//! ```text
//! subtotal = Σ price × quantity
//! discount = fixed cents  |  subtotal × percent (rounded to the cent)
//! taxable  = max(subtotal − discount, 0)
//! tax      = TaxCalculator::breakdown(taxable).total
//! total    = taxable + tax
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::invoice::{InvoiceRecord, RecordItem};
use crate::money::Money;
use crate::price::{ensure_cents, PriceInput};
use crate::serde_helpers::{lenient_i64, lenient_money, lenient_opt_i64};
use crate::snapshot::CartSnapshot;
use crate::tax::{TaxBreakdown, TaxCalculator, TaxPolicy, TaxType};
use crate::types::{
    Discount, DiscountType, OrderType, PosStatus, SectionType, SelectedTable, TaxRate,
};
use crate::validation::{
    validate_cart_size, validate_fixed_discount, validate_percentage_bps, validate_quantity,
    validate_tax_rate,
};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Cart Item
// =============================================================================

/// One line in the cart.
///
/// ## Invariants
/// - `total == price × quantity` after every mutation
/// - `sub_total == total − discount_val`
/// - `price` is in cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    /// Per-line instance id.
    #[serde(default = "Uuid::new_v4")]
    #[ts(type = "string")]
    pub line_id: Uuid,

    /// Catalog item id.
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(deserialize_with = "lenient_money")]
    pub price: Money,

    #[serde(deserialize_with = "lenient_i64")]
    pub quantity: i64,

    #[serde(default, deserialize_with = "lenient_money")]
    pub total: Money,

    #[serde(default, deserialize_with = "lenient_money")]
    pub sub_total: Money,

    #[serde(default)]
    pub discount_type: DiscountType,

    /// Raw line discount as entered (cents or percent).
    #[serde(default, deserialize_with = "lenient_i64")]
    pub discount: i64,

    /// Line discount amount in cents.
    #[serde(default, deserialize_with = "lenient_money")]
    pub discount_val: Money,

    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub section_id: Option<i64>,

    #[serde(default)]
    pub section_type: Option<SectionType>,

    #[serde(default)]
    pub section_name: Option<String>,

    #[serde(default)]
    pub unit_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_money")]
    pub tax: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Server line id when the line came from a hold order or invoice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_item_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_status: Option<PosStatus>,

    #[serde(default)]
    pub from_held_order: bool,
}

impl CartItem {
    /// Restores `total` and `sub_total` from price, quantity and line discount.
    pub fn recompute(&mut self) {
        self.total = self.price * self.quantity;
        self.sub_total = self.total - self.discount_val;
    }

    fn from_product(product: &ProductInput, price: Money, quantity: i64) -> Self {
        let mut item = CartItem {
            line_id: Uuid::new_v4(),
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price,
            quantity,
            total: Money::zero(),
            sub_total: Money::zero(),
            discount_type: DiscountType::Fixed,
            discount: 0,
            discount_val: Money::zero(),
            section_id: product.section_id,
            section_type: product.section_type,
            section_name: product.section_name.clone(),
            unit_name: product.unit_name.clone(),
            tax: Money::zero(),
            modifications: product.modifications.clone(),
            notes: product.notes.clone(),
            original_item_id: None,
            pos_status: None,
            from_held_order: product.from_held_order,
        };
        item.recompute();
        item
    }

    fn from_record(
        line: &RecordItem,
        from_held_order: bool,
        order_status: Option<PosStatus>,
    ) -> Self {
        let mut item = CartItem {
            line_id: Uuid::new_v4(),
            id: line.item_id.or(line.id).unwrap_or_default(),
            name: line.name.clone(),
            description: line.description.clone(),
            price: line.price,
            quantity: line.quantity,
            total: Money::zero(),
            sub_total: Money::zero(),
            discount_type: line.discount_type.unwrap_or_default(),
            discount: line.discount.unwrap_or_default(),
            discount_val: line.discount_val.unwrap_or_default(),
            section_id: line.section_id,
            section_type: line.section_type,
            section_name: line.section_name.clone(),
            unit_name: line.unit_name.clone(),
            tax: line.tax.unwrap_or_default(),
            modifications: line.modifications.clone(),
            notes: line.notes.clone(),
            original_item_id: line.id,
            pos_status: line.pos_status.or(order_status),
            from_held_order,
        };
        item.recompute();
        item
    }
}

/// A catalog product as the UI hands it to `add_item`.
///
/// `price` is untyped here; it goes through the price boundary once.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: PriceInput,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub section_id: Option<i64>,
    #[serde(default)]
    pub section_type: Option<SectionType>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    #[serde(default)]
    pub modifications: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Price is already in cents and must not be converted again.
    #[serde(default)]
    pub from_held_order: bool,
}

impl ProductInput {
    pub fn new(id: i64, name: impl Into<String>, price: impl Into<PriceInput>) -> Self {
        ProductInput {
            id,
            name: name.into(),
            description: None,
            price: price.into(),
            section_id: None,
            section_type: None,
            section_name: None,
            unit_name: None,
            modifications: None,
            notes: None,
            from_held_order: false,
        }
    }

    /// Unit price in cents.
    pub fn price_cents(&self) -> CoreResult<Money> {
        if self.from_held_order {
            if let PriceInput::Integer(cents) = self.price {
                return Ok(Money::from_cents(cents));
            }
        }
        ensure_cents(&self.price)
    }
}

// =============================================================================
// Notes
// =============================================================================

/// The structured form of `notes`: `{"orderInfo": .., "customerNotes": ..}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
}

impl OrderNotes {
    /// Plain text that is not a notes object is kept as customer notes.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return OrderNotes::default();
        }
        serde_json::from_str(raw).unwrap_or_else(|_| OrderNotes {
            order_info: None,
            customer_notes: Some(raw.to_string()),
        })
    }

    pub fn compose(&self) -> String {
        if self.order_info.is_none() && self.customer_notes.is_none() {
            return String::new();
        }
        serde_json::to_string(self).unwrap_or_default()
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// The invoice or hold order the cart is currently editing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EditingInvoice {
    pub id: Option<i64>,
    pub number: Option<String>,
    pub status: Option<String>,
}

/// The cart of one register window.
///
/// Constructed explicitly; each window owns its own instance and shares
/// state with other windows only through snapshots.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    items: Vec<CartItem>,
    discount: Discount,
    tax_policy: TaxPolicy,
    notes: String,
    selected_tables: Vec<SelectedTable>,
    hold_invoice_id: Option<i64>,
    hold_order_description: Option<String>,
    order_type: OrderType,
    editing: EditingInvoice,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty cart with a tax policy already configured.
    pub fn with_tax_policy(tax_policy: TaxPolicy) -> Self {
        CartState {
            tax_policy,
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn tax_policy(&self) -> &TaxPolicy {
        &self.tax_policy
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn selected_tables(&self) -> &[SelectedTable] {
        &self.selected_tables
    }

    pub fn hold_invoice_id(&self) -> Option<i64> {
        self.hold_invoice_id
    }

    pub fn hold_order_description(&self) -> Option<&str> {
        self.hold_order_description.as_deref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn editing(&self) -> &EditingInvoice {
        &self.editing
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // -------------------------------------------------------------------------
    // Line Actions
    // -------------------------------------------------------------------------

    /// Adds a product, or increases the quantity of the first line that
    /// already carries its catalog id.
    pub fn add_item(&mut self, product: &ProductInput, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(item) = self.items.iter_mut().find(|i| i.id == product.id) {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = new_qty;
            item.recompute();
            return Ok(());
        }

        validate_cart_size(self.items.len()).map_err(|_| CoreError::CartTooLarge {
            max: crate::MAX_CART_ITEMS,
        })?;

        let price = product.price_cents()?;
        if price.is_negative() {
            return Err(CoreError::InvalidAmount(format!("negative price {price}")));
        }

        self.items.push(CartItem::from_product(product, price, quantity));
        Ok(())
    }

    /// Sets a line's quantity. A quantity of zero or less removes it.
    ///
    /// With `index`, the line at that position must carry `item_id`.
    /// Without it, the first line with `item_id` is updated.
    pub fn update_item_quantity(
        &mut self,
        item_id: i64,
        quantity: i64,
        index: Option<usize>,
    ) -> CoreResult<()> {
        if quantity <= 0 {
            return self.remove_item(item_id, index);
        }
        validate_quantity(quantity)?;

        let position = self.resolve_line(item_id, index)?;
        let item = &mut self.items[position];
        item.quantity = quantity;
        item.recompute();
        Ok(())
    }

    /// Moves `split_quantity` units of the line at `index` onto a new line
    /// inserted right after it. Returns the new line's id.
    ///
    /// ```text
    /// Before: [Burger ×3]
    /// split_item(0, 1)
    /// After:  [Burger ×2] [Burger ×1]   (same id, different line_id)
    /// ```
    pub fn split_item(&mut self, index: usize, split_quantity: i64) -> CoreResult<Uuid> {
        let len = self.items.len();
        let original = self
            .items
            .get(index)
            .ok_or(CoreError::IndexOutOfRange { index, len })?;

        if split_quantity <= 0 || split_quantity >= original.quantity {
            return Err(CoreError::InvalidSplit {
                requested: split_quantity,
                available: original.quantity,
            });
        }
        validate_cart_size(len).map_err(|_| CoreError::CartTooLarge {
            max: crate::MAX_CART_ITEMS,
        })?;

        // Line discount and tax follow the units; the remainder stays on
        // the original line so the sums are unchanged.
        let whole = original.quantity;
        let mut new_line = original.clone();
        new_line.line_id = Uuid::new_v4();
        new_line.quantity = split_quantity;
        new_line.discount_val = original.discount_val.share(split_quantity, whole);
        new_line.tax = original.tax.share(split_quantity, whole);
        if new_line.discount_type == DiscountType::Fixed {
            new_line.discount = new_line.discount_val.cents();
        }
        new_line.recompute();
        let new_id = new_line.line_id;

        let original = &mut self.items[index];
        original.quantity -= split_quantity;
        original.discount_val -= new_line.discount_val;
        original.tax -= new_line.tax;
        if original.discount_type == DiscountType::Fixed {
            original.discount = original.discount_val.cents();
        }
        original.recompute();

        self.items.insert(index + 1, new_line);
        Ok(new_id)
    }

    /// Removes lines by catalog id.
    ///
    /// - `Some(index)`: removes exactly that line (it must carry `item_id`).
    /// - `None`: removes EVERY line with `item_id`, split lines included.
    pub fn remove_item(&mut self, item_id: i64, index: Option<usize>) -> CoreResult<()> {
        if let Some(index) = index {
            let position = self.resolve_line(item_id, Some(index))?;
            self.items.remove(position);
            return Ok(());
        }

        let initial_len = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == initial_len {
            return Err(CoreError::ItemNotFound { item_id });
        }
        Ok(())
    }

    /// Removes the single line with this instance id.
    pub fn remove_line(&mut self, line_id: Uuid) -> CoreResult<()> {
        let position = self
            .items
            .iter()
            .position(|i| i.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))?;
        self.items.remove(position);
        Ok(())
    }

    fn resolve_line(&self, item_id: i64, index: Option<usize>) -> CoreResult<usize> {
        match index {
            Some(index) => {
                let line = self.items.get(index).ok_or(CoreError::IndexOutOfRange {
                    index,
                    len: self.items.len(),
                })?;
                if line.id != item_id {
                    return Err(CoreError::LineMismatch {
                        index,
                        expected: item_id,
                        actual: line.id,
                    });
                }
                Ok(index)
            }
            None => self
                .items
                .iter()
                .position(|i| i.id == item_id)
                .ok_or(CoreError::ItemNotFound { item_id }),
        }
    }

    // -------------------------------------------------------------------------
    // Order-Level Actions
    // -------------------------------------------------------------------------

    /// Sets the order discount.
    ///
    /// `value` is cents for `fixed` and percent (0-100, two decimals) for `%`.
    pub fn set_discount(&mut self, discount_type: DiscountType, value: f64) -> CoreResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::InvalidAmount(format!("discount {value}")));
        }
        let discount = Discount::from_parts(discount_type, value);
        match discount {
            Discount::Fixed(amount) => validate_fixed_discount(amount.cents())?,
            Discount::Percentage(bps) => validate_percentage_bps(bps)?,
        }
        self.discount = discount;
        Ok(())
    }

    pub fn clear_discount(&mut self) {
        self.discount = Discount::none();
    }

    pub fn set_tax_rate(&mut self, rate: TaxRate) -> CoreResult<()> {
        validate_tax_rate(rate)?;
        self.tax_policy = TaxPolicy::Flat(rate);
        Ok(())
    }

    pub fn set_tax_types(&mut self, types: Vec<TaxType>) -> CoreResult<()> {
        for t in &types {
            validate_tax_rate(t.rate)?;
        }
        self.tax_policy = TaxPolicy::PerType(types);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn order_notes(&self) -> OrderNotes {
        OrderNotes::parse(&self.notes)
    }

    pub fn set_order_info(&mut self, info: Option<String>) {
        let mut parts = self.order_notes();
        parts.order_info = info.filter(|s| !s.is_empty());
        self.notes = parts.compose();
    }

    pub fn set_customer_notes(&mut self, notes: Option<String>) {
        let mut parts = self.order_notes();
        parts.customer_notes = notes.filter(|s| !s.is_empty());
        self.notes = parts.compose();
    }

    pub fn set_selected_tables(&mut self, tables: Vec<SelectedTable>) {
        self.selected_tables = tables;
    }

    pub fn set_order_type(&mut self, order_type: OrderType) {
        self.order_type = order_type;
    }

    /// Links the cart to an existing hold order so the next save updates it.
    pub fn set_hold_linkage(&mut self, hold_invoice_id: Option<i64>, description: Option<String>) {
        self.hold_invoice_id = hold_invoice_id;
        self.hold_order_description = description;
    }

    /// Resets the cart to an empty dine-in order.
    ///
    /// Clears lines, discount, notes, tables, hold linkage and editing
    /// state. The tax policy is store configuration and survives.
    /// Calling it twice is the same as calling it once.
    pub fn clear(&mut self) {
        self.items.clear();
        self.discount = Discount::none();
        self.notes.clear();
        self.selected_tables.clear();
        self.hold_invoice_id = None;
        self.hold_order_description = None;
        self.order_type = OrderType::default();
        self.editing = EditingInvoice::default();
    }

    /// Replaces the cart with a hold order or invoice fetched from the server.
    ///
    /// `hold_items` wins over `items`. Record prices are already cents and
    /// are taken as-is.
    pub fn load_invoice(&mut self, record: &InvoiceRecord) {
        self.clear();

        let hold_shaped = record.is_hold_shaped();
        let lines = if hold_shaped {
            &record.hold_items
        } else {
            &record.items
        };
        self.items = lines
            .iter()
            .map(|line| CartItem::from_record(line, hold_shaped, record.pos_status))
            .collect();

        self.discount = record.discount();
        if !record.taxes.is_empty() {
            self.tax_policy = TaxPolicy::PerType(record.taxes.clone());
        }
        self.order_type = record.order_type.unwrap_or_default();
        self.notes = record.notes.clone().unwrap_or_default();
        self.selected_tables = record.tables().to_vec();

        self.editing = EditingInvoice {
            id: record.id,
            number: record.invoice_number.clone(),
            status: record.status.clone(),
        };
        if hold_shaped {
            self.hold_invoice_id = record.id;
            self.hold_order_description = record.description.clone();
        }
    }

    /// Replaces lines, discount and tax with another window's snapshot.
    ///
    /// Last writer wins; nothing is merged.
    pub fn apply_snapshot(&mut self, snapshot: &CartSnapshot) {
        self.items = snapshot.items.clone();
        for item in &mut self.items {
            item.recompute();
        }
        self.discount = Discount::from_parts(snapshot.discount_type, snapshot.discount_value);
        self.tax_policy = if snapshot.tax_types.is_empty() {
            TaxPolicy::Flat(TaxRate::from_fraction(snapshot.tax_rate))
        } else {
            TaxPolicy::PerType(snapshot.tax_types.clone())
        };
    }

    // -------------------------------------------------------------------------
    // Getters
    // -------------------------------------------------------------------------

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Σ price × quantity.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(|i| i.price * i.quantity).sum()
    }

    pub fn discount_amount(&self) -> Money {
        self.discount.amount_for(self.subtotal())
    }

    pub fn taxable_amount(&self) -> Money {
        (self.subtotal() - self.discount_amount()).clamp_non_negative()
    }

    pub fn tax_breakdown(&self) -> TaxBreakdown {
        TaxCalculator::new(&self.tax_policy).breakdown(self.taxable_amount())
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_breakdown().total
    }

    pub fn total(&self) -> Money {
        self.taxable_amount() + self.tax_amount()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

/// Cart totals summary for the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub taxable: Money,
    pub tax: Money,
    pub total: Money,
}

impl From<&CartState> for CartTotals {
    fn from(cart: &CartState) -> Self {
        let subtotal = cart.subtotal();
        let discount = cart.discount.amount_for(subtotal);
        let taxable = (subtotal - discount).clamp_non_negative();
        let tax = TaxCalculator::new(&cart.tax_policy).total(taxable);
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            subtotal,
            discount,
            taxable,
            tax,
            total: taxable + tax,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: i64, price_cents: i64) -> ProductInput {
        ProductInput::new(id, format!("Product {id}"), price_cents)
    }

    fn assert_line_invariants(cart: &CartState) {
        for item in cart.items() {
            assert_eq!(item.total, item.price * item.quantity);
            assert_eq!(item.sub_total, item.total - item.discount_val);
        }
    }

    #[test]
    fn test_add_item_merges_same_id() {
        let mut cart = CartState::new();
        cart.add_item(&product(1, 999), 2).unwrap();
        cart.add_item(&product(1, 999), 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
        assert_eq!(cart.subtotal().cents(), 4995);
        assert_line_invariants(&cart);
    }

    #[test]
    fn test_add_item_converts_dollar_prices() {
        let mut cart = CartState::new();
        cart.add_item(&ProductInput::new(1, "Soda", 2.5), 1).unwrap();
        cart.add_item(&ProductInput::new(2, "Fries", 5i64), 1).unwrap();

        assert_eq!(cart.items()[0].price.cents(), 250);
        assert_eq!(cart.items()[1].price.cents(), 500);
    }

    #[test]
    fn test_held_order_price_is_not_converted() {
        let mut cart = CartState::new();
        let mut held = product(1, 50);
        held.from_held_order = true;
        cart.add_item(&held, 1).unwrap();

        assert_eq!(cart.items()[0].price.cents(), 50);
        assert!(cart.items()[0].from_held_order);
    }

    #[test]
    fn test_add_item_limits() {
        let mut cart = CartState::new();
        assert!(cart.add_item(&product(1, 100), 0).is_err());
        cart.add_item(&product(1, 100), 999).unwrap();
        assert!(matches!(
            cart.add_item(&product(1, 100), 1),
            Err(CoreError::QuantityTooLarge { .. })
        ));

        let mut full = CartState::new();
        for id in 0..crate::MAX_CART_ITEMS as i64 {
            full.add_item(&product(id, 100), 1).unwrap();
        }
        assert!(matches!(
            full.add_item(&product(1000, 100), 1),
            Err(CoreError::CartTooLarge { .. })
        ));
    }

    #[test]
    fn test_update_item_quantity() {
        let mut cart = CartState::new();
        cart.add_item(&product(1, 250), 1).unwrap();
        cart.update_item_quantity(1, 4, None).unwrap();
        assert_eq!(cart.items()[0].total.cents(), 1000);

        assert!(matches!(
            cart.update_item_quantity(2, 1, None),
            Err(CoreError::ItemNotFound { item_id: 2 })
        ));
        assert!(matches!(
            cart.update_item_quantity(2, 1, Some(0)),
            Err(CoreError::LineMismatch { .. })
        ));

        cart.update_item_quantity(1, 0, None).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_split_item() {
        let mut cart = CartState::new();
        cart.add_item(&product(7, 300), 3).unwrap();
        cart.add_item(&product(8, 100), 1).unwrap();

        let new_line = cart.split_item(0, 1).unwrap();

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.items()[1].quantity, 1);
        assert_eq!(cart.items()[1].id, 7);
        assert_eq!(cart.items()[1].line_id, new_line);
        assert_ne!(cart.items()[0].line_id, cart.items()[1].line_id);
        assert_eq!(cart.items()[2].id, 8);
        assert_eq!(cart.subtotal().cents(), 1000);
        assert_line_invariants(&cart);
    }

    #[test]
    fn test_split_shares_line_discount_and_tax() {
        let record: InvoiceRecord = serde_json::from_value(json!({
            "hold_items": [{
                "item_id": 4, "price": 500, "quantity": 3,
                "discount_type": "fixed", "discount": 150, "discount_val": 150, "tax": 100
            }],
            "type": "TO_GO"
        }))
        .unwrap();
        let mut cart = CartState::new();
        cart.load_invoice(&record);

        let sub_total = |cart: &CartState| cart.items().iter().map(|i| i.sub_total).sum::<Money>();
        let line_tax = |cart: &CartState| cart.items().iter().map(|i| i.tax).sum::<Money>();
        assert_eq!(sub_total(&cart).cents(), 1350);

        cart.split_item(0, 1).unwrap();

        assert_eq!(sub_total(&cart).cents(), 1350);
        assert_eq!(line_tax(&cart).cents(), 100);
        assert_eq!(cart.items()[0].discount_val.cents(), 100);
        assert_eq!(cart.items()[0].discount, 100);
        assert_eq!(cart.items()[1].discount_val.cents(), 50);
        assert_eq!(cart.items()[1].sub_total.cents(), 450);
        assert_eq!(cart.items()[0].tax.cents(), 67);
        assert_eq!(cart.items()[1].tax.cents(), 33);
        assert_line_invariants(&cart);
    }

    #[test]
    fn test_split_item_rejects_whole_line() {
        let mut cart = CartState::new();
        cart.add_item(&product(7, 300), 3).unwrap();

        assert!(matches!(cart.split_item(0, 3), Err(CoreError::InvalidSplit { .. })));
        assert!(matches!(cart.split_item(0, 0), Err(CoreError::InvalidSplit { .. })));
        assert!(matches!(cart.split_item(5, 1), Err(CoreError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_remove_item_without_index_removes_split_lines() {
        let mut cart = CartState::new();
        cart.add_item(&product(7, 300), 3).unwrap();
        cart.split_item(0, 1).unwrap();

        cart.remove_item(7, None).unwrap();
        assert!(cart.is_empty());
        assert!(cart.remove_item(7, None).is_err());
    }

    #[test]
    fn test_remove_single_split_line() {
        let mut cart = CartState::new();
        cart.add_item(&product(7, 300), 3).unwrap();
        let new_line = cart.split_item(0, 1).unwrap();

        cart.remove_item(7, Some(0)).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].line_id, new_line);

        cart.remove_line(new_line).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(cart.remove_line(new_line), Err(CoreError::LineNotFound(_))));
    }

    #[test]
    fn test_totals_with_discount_and_tax() {
        let mut cart = CartState::new();
        cart.add_item(&product(1, 500), 2).unwrap();
        cart.set_discount(DiscountType::Percentage, 10.0).unwrap();
        cart.set_tax_rate(TaxRate::from_bps(800)).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.subtotal.cents(), 1000);
        assert_eq!(totals.discount.cents(), 100);
        assert_eq!(totals.taxable.cents(), 900);
        assert_eq!(totals.tax.cents(), 72);
        assert_eq!(totals.total.cents(), 972);
        assert_eq!(cart.total().cents(), 972);
    }

    #[test]
    fn test_fixed_discount_larger_than_subtotal() {
        let mut cart = CartState::new();
        cart.add_item(&product(1, 500), 1).unwrap();
        cart.set_discount(DiscountType::Fixed, 800.0).unwrap();
        cart.set_tax_rate(TaxRate::from_bps(800)).unwrap();

        assert_eq!(cart.taxable_amount(), Money::zero());
        assert_eq!(cart.total(), Money::zero());
    }

    #[test]
    fn test_discount_validation() {
        let mut cart = CartState::new();
        assert!(cart.set_discount(DiscountType::Percentage, 100.5).is_err());
        assert!(cart.set_discount(DiscountType::Fixed, -1.0).is_err());
        assert!(cart.set_discount(DiscountType::Fixed, f64::NAN).is_err());
        cart.set_discount(DiscountType::Percentage, 12.5).unwrap();
        assert_eq!(cart.discount(), Discount::Percentage(1250));
    }

    #[test]
    fn test_notes_helpers() {
        let mut cart = CartState::new();
        cart.set_order_info(Some("Table by the window".into()));
        cart.set_customer_notes(Some("No onions".into()));

        let parts = cart.order_notes();
        assert_eq!(parts.order_info.as_deref(), Some("Table by the window"));
        assert_eq!(parts.customer_notes.as_deref(), Some("No onions"));

        cart.set_notes("plain text");
        assert_eq!(cart.order_notes().customer_notes.as_deref(), Some("plain text"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut cart = CartState::with_tax_policy(TaxPolicy::Flat(TaxRate::from_bps(800)));
        cart.add_item(&product(1, 500), 2).unwrap();
        cart.set_discount(DiscountType::Fixed, 100.0).unwrap();
        cart.set_order_type(OrderType::Delivery);
        cart.set_hold_linkage(Some(4), Some("Bob".into()));
        cart.set_notes("x");

        cart.clear();
        let once = format!("{cart:?}");
        cart.clear();
        assert_eq!(format!("{cart:?}"), once);

        assert!(cart.is_empty());
        assert!(cart.discount().is_none());
        assert_eq!(cart.order_type(), OrderType::DineIn);
        assert_eq!(cart.hold_invoice_id(), None);
        assert_eq!(cart.notes(), "");
        assert_eq!(cart.tax_policy(), &TaxPolicy::Flat(TaxRate::from_bps(800)));
    }

    #[test]
    fn test_load_invoice_from_hold_items() {
        let record: InvoiceRecord = serde_json::from_value(json!({
            "hold_items": [{"item_id": 7, "id": 99, "price": 1550, "quantity": "3"}],
            "discount_val": 0,
            "type": "DINE IN"
        }))
        .unwrap();

        let mut cart = CartState::new();
        cart.add_item(&product(1, 100), 1).unwrap();
        cart.load_invoice(&record);

        assert_eq!(cart.item_count(), 1);
        let line = &cart.items()[0];
        assert_eq!(line.id, 7);
        assert_eq!(line.price.cents(), 1550);
        assert_eq!(line.quantity, 3);
        assert_eq!(line.total.cents(), 4650);
        assert_eq!(line.original_item_id, Some(99));
        assert!(line.from_held_order);
        assert_eq!(cart.order_type(), OrderType::DineIn);
    }

    #[test]
    fn test_load_invoice_prefers_hold_items_and_sets_linkage() {
        let record: InvoiceRecord = serde_json::from_value(json!({
            "id": 12,
            "invoice_number": "INV-0012",
            "status": "DRAFT",
            "description": "Window seat",
            "pos_status": "IN_PROGRESS",
            "items": [{"item_id": 1, "price": 100, "quantity": 1}],
            "hold_items": [{"item_id": 2, "price": 200, "quantity": 2}],
            "discount_type": "%",
            "discount": 10,
            "tables_selected": [{"id": 3, "name": "T3", "quantity": 4}]
        }))
        .unwrap();

        let mut cart = CartState::new();
        cart.load_invoice(&record);

        assert_eq!(cart.items()[0].id, 2);
        assert_eq!(cart.items()[0].pos_status, Some(PosStatus::InProgress));
        assert_eq!(cart.hold_invoice_id(), Some(12));
        assert_eq!(cart.hold_order_description(), Some("Window seat"));
        assert_eq!(cart.editing().number.as_deref(), Some("INV-0012"));
        assert_eq!(cart.discount(), Discount::Percentage(1000));
        assert_eq!(cart.selected_tables().len(), 1);
    }

    #[test]
    fn test_load_invoice_items_are_not_held() {
        let record: InvoiceRecord = serde_json::from_value(json!({
            "id": 30,
            "items": [{"item_id": 5, "id": 501, "price": "1200", "quantity": 1}],
            "type": "TO_GO"
        }))
        .unwrap();

        let mut cart = CartState::new();
        cart.load_invoice(&record);

        assert!(!cart.items()[0].from_held_order);
        assert_eq!(cart.items()[0].price.cents(), 1200);
        assert_eq!(cart.hold_invoice_id(), None);
        assert_eq!(cart.editing().id, Some(30));
        assert_eq!(cart.order_type(), OrderType::ToGo);
    }
}
