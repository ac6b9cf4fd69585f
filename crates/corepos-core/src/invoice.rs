//! # Invoices and Hold Orders
//!
//! Read models for server records, and the pure half of hold/invoice
//! reconciliation: building, checking and converting REST payloads.
//!
//! ## Payload Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Hold / Invoice Payloads                             │
//! │                                                                         │
//! │  CartState ──► build_invoice_payload(ctx) ──► InvoicePayload            │
//! │                                                  │                      │
//! │                   ┌──────────────────────────────┤                      │
//! │                   ▼                              ▼                      │
//! │  hold_payload_from(description)        POST /v1/invoices               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  validate_hold_invoice(json) ──► POST|PUT /v1/hold-invoices             │
//! │                                                                         │
//! │  InvoiceRecord (hold) ──► prepare_conversion(settings, number, today)   │
//! │                            ──► InvoicePayload for POST /v1/invoices     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every amount in a payload is integer cents.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::cart::CartState;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::serde_helpers::{
    lenient_i64, lenient_money, lenient_opt_f64, lenient_opt_i64, lenient_opt_money,
    lenient_opt_parse,
    null_as_default,
};
use crate::tax::{TaxLine, TaxType};
use crate::types::{
    Discount, DiscountType, OrderType, PaidStatus, PosStatus, SectionType, SelectedTable,
};
use crate::validation::{validate_item_price, validate_order_type, validate_paid_status};

/// Invoice status stamped on register invoices.
pub const DEFAULT_INVOICE_STATUS: &str = "DRAFT";

// =============================================================================
// Server Records
// =============================================================================

/// A line on an invoice or hold invoice as the server returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordItem {
    /// Server line id.
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub id: Option<i64>,
    /// Catalog item id.
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub item_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub price: Money,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "lenient_opt_money")]
    pub total: Option<Money>,
    #[serde(default, deserialize_with = "lenient_opt_parse")]
    pub discount_type: Option<DiscountType>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub discount: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_money")]
    pub discount_val: Option<Money>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub section_id: Option<i64>,
    #[serde(default)]
    pub section_type: Option<SectionType>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_money")]
    pub tax: Option<Money>,
    #[serde(default)]
    pub modifications: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub pos_status: Option<PosStatus>,
}

impl RecordItem {
    /// Catalog id, falling back to the server line id.
    pub fn catalog_id(&self) -> Option<i64> {
        self.item_id.or(self.id)
    }

    /// Declared total, or price × quantity when the server left it out.
    pub fn line_total(&self) -> Money {
        self.total.unwrap_or(self.price * self.quantity)
    }
}

/// An invoice or hold invoice as the server returns it.
///
/// Hold invoices carry their lines in `hold_items`; invoices use `items`.
/// Unknown enum values deserialize to `None` rather than failing the
/// whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceRecord {
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub id: Option<i64>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_parse")]
    pub paid_status: Option<PaidStatus>,
    #[serde(default, rename = "type", deserialize_with = "lenient_opt_parse")]
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub pos_status: Option<PosStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<RecordItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hold_items: Vec<RecordItem>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_parse")]
    pub discount_type: Option<DiscountType>,
    /// Cents for fixed discounts, percent (possibly fractional) for `%`.
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub discount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_money")]
    pub discount_val: Option<Money>,
    #[serde(default, deserialize_with = "lenient_opt_money")]
    pub sub_total: Option<Money>,
    #[serde(default, deserialize_with = "lenient_opt_money")]
    pub tax: Option<Money>,
    #[serde(default, deserialize_with = "lenient_opt_money")]
    pub total: Option<Money>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub taxes: Vec<TaxType>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tables_selected: Vec<SelectedTable>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hold_tables: Vec<SelectedTable>,
    /// On invoices: the hold order this invoice was converted from.
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub hold_invoice_id: Option<i64>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Hold invoices share the invoice read model.
pub type HoldInvoiceRecord = InvoiceRecord;

impl InvoiceRecord {
    pub fn is_hold_shaped(&self) -> bool {
        !self.hold_items.is_empty()
    }

    /// Lines in effect: `hold_items` when present, else `items`.
    pub fn lines(&self) -> &[RecordItem] {
        if self.is_hold_shaped() {
            &self.hold_items
        } else {
            &self.items
        }
    }

    pub fn tables(&self) -> &[SelectedTable] {
        if self.tables_selected.is_empty() {
            &self.hold_tables
        } else {
            &self.tables_selected
        }
    }

    /// Order discount, read back at basis-point precision.
    pub fn discount(&self) -> Discount {
        match self.discount_type.unwrap_or_default() {
            DiscountType::Percentage => {
                Discount::from_parts(DiscountType::Percentage, self.discount.unwrap_or(0.0))
            }
            DiscountType::Fixed => match self.discount {
                Some(cents) => Discount::from_parts(DiscountType::Fixed, cents),
                None => Discount::Fixed(self.discount_val.unwrap_or_default()),
            },
        }
    }
}

/// Company settings that matter to invoice creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CompanySettings {
    /// `"YES"` when the backend numbers invoices.
    #[serde(default)]
    pub invoice_auto_generate: Option<String>,
    /// Days between invoice date and due date.
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub invoice_issuance_period: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl CompanySettings {
    /// Manual numbering is on only when explicitly set to `NO`.
    pub fn requires_manual_numbering(&self) -> bool {
        self.invoice_auto_generate
            .as_deref()
            .map(|v| v.trim().eq_ignore_ascii_case("NO"))
            .unwrap_or(false)
    }

    pub fn issuance_days(&self) -> i64 {
        self.invoice_issuance_period.unwrap_or(0).max(0)
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// A line on an outgoing invoice payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PayloadItem {
    pub item_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Money,
    pub quantity: i64,
    pub total: Money,
    pub discount_type: DiscountType,
    pub discount: i64,
    pub discount_val: Money,
    pub tax: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_status: Option<PosStatus>,
    /// Server line id when editing an existing invoice or hold order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Body for `POST /v1/invoices` and `POST|PUT /v1/hold-invoices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoicePayload {
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_register_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub items: Vec<PayloadItem>,
    pub sub_total: Money,
    pub discount_type: DiscountType,
    #[ts(as = "f64")]
    pub discount: serde_json::Number,
    pub discount_val: Money,
    pub tax: Money,
    pub total: Money,
    pub due_amount: Money,
    pub taxes: Vec<TaxLine>,
    pub tax_per_item: String,
    pub discount_per_item: String,
    pub is_invoice_pos: bool,
    pub is_pdf_pos: bool,
    pub paid_status: PaidStatus,
    pub status: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables_selected: Option<Vec<SelectedTable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_tables: Option<Vec<SelectedTable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_invoice_id: Option<i64>,
    pub is_hold_invoice: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Everything a payload needs that does not live in the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceContext {
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub customer_id: Option<i64>,
    pub store_id: Option<i64>,
    pub cash_register_id: Option<i64>,
    pub reference: Option<String>,
    pub paid_status: PaidStatus,
    pub status: String,
    pub is_pdf_pos: bool,
}

impl InvoiceContext {
    pub fn new(invoice_date: NaiveDate) -> Self {
        InvoiceContext {
            invoice_date,
            due_date: None,
            invoice_number: None,
            customer_id: None,
            store_id: None,
            cash_register_id: None,
            reference: None,
            paid_status: PaidStatus::Unpaid,
            status: DEFAULT_INVOICE_STATUS.to_string(),
            is_pdf_pos: false,
        }
    }
}

fn payload_items(cart: &CartState) -> Vec<PayloadItem> {
    cart.items()
        .iter()
        .map(|item| PayloadItem {
            item_id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            price: item.price,
            quantity: item.quantity,
            total: item.total,
            discount_type: item.discount_type,
            discount: item.discount,
            discount_val: item.discount_val,
            tax: item.tax,
            unit_name: item.unit_name.clone(),
            section_id: item.section_id,
            section_type: item.section_type,
            modifications: item.modifications.clone(),
            notes: item.notes.clone(),
            pos_status: item.pos_status,
            id: item.original_item_id,
        })
        .collect()
}

/// Packages the cart for the REST API.
///
/// ## Rules
/// - Empty carts are rejected
/// - Discount and tax are order-level (`*_per_item = "NO"`)
/// - Taxes come from the same calculator the cart getters use
/// - Tables are sent only for dine-in orders
/// - A cart linked to a hold order carries `hold_invoice_id` and
///   `is_hold_invoice = true`
pub fn build_invoice_payload(
    cart: &CartState,
    ctx: &InvoiceContext,
) -> CoreResult<InvoicePayload> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let totals = cart.totals();
    let breakdown = cart.tax_breakdown();
    let discount = cart.discount();
    let tables = if cart.order_type().uses_tables() && !cart.selected_tables().is_empty() {
        Some(cart.selected_tables().to_vec())
    } else {
        None
    };
    let notes = Some(cart.notes().to_string()).filter(|n| !n.is_empty());

    Ok(InvoicePayload {
        invoice_date: ctx.invoice_date,
        due_date: ctx.due_date,
        invoice_number: ctx.invoice_number.clone(),
        customer_id: ctx.customer_id,
        store_id: ctx.store_id,
        cash_register_id: ctx.cash_register_id,
        reference: ctx.reference.clone(),
        items: payload_items(cart),
        sub_total: totals.subtotal,
        discount_type: discount.discount_type(),
        discount: discount.wire_value(),
        discount_val: totals.discount,
        tax: totals.tax,
        total: totals.total,
        due_amount: totals.total,
        taxes: breakdown.entries,
        tax_per_item: "NO".to_string(),
        discount_per_item: "NO".to_string(),
        is_invoice_pos: true,
        is_pdf_pos: ctx.is_pdf_pos,
        paid_status: ctx.paid_status,
        status: ctx.status.clone(),
        order_type: cart.order_type(),
        notes,
        tables_selected: tables.clone(),
        hold_tables: None,
        hold_invoice_id: cart.hold_invoice_id(),
        is_hold_invoice: cart.hold_invoice_id().is_some(),
        description: cart.hold_order_description().map(str::to_string),
    })
}

/// Turns an invoice payload into a hold-invoice payload.
///
/// Tables are duplicated into both `tables_selected` and `hold_tables`.
pub fn hold_payload_from(
    mut payload: InvoicePayload,
    description: impl Into<String>,
) -> InvoicePayload {
    let description = description.into();
    payload.is_hold_invoice = true;
    payload.description = Some(description).filter(|d| !d.trim().is_empty());

    let tables = payload.tables_selected.take().or(payload.hold_tables.take());
    payload.tables_selected = tables.clone();
    payload.hold_tables = tables;
    payload
}

// =============================================================================
// Validation
// =============================================================================

fn field_i64(value: &Value, field: &str) -> Option<i64> {
    match value.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Checks a hold-invoice body before it is sent.
///
/// ## Rules
/// - `items` is a non-empty array
/// - every item price is > 0
/// - `type` is one of the order types
/// - `paid_status` is PAID or UNPAID
/// - `sub_total` equals Σ item totals exactly
pub fn validate_hold_invoice(payload: &Value) -> Result<(), ValidationError> {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ValidationError::required("items"))?;

    let overflow = || ValidationError::OutOfRange {
        field: "sub_total".to_string(),
        min: 0,
        max: i64::MAX,
    };

    let mut computed = 0_i64;
    for item in items {
        let price = field_i64(item, "price").ok_or_else(|| ValidationError::InvalidFormat {
            field: "items.price".to_string(),
            reason: "must be an integer amount in cents".to_string(),
        })?;
        validate_item_price(price)?;

        let total = match field_i64(item, "total") {
            Some(total) => total,
            None => price
                .checked_mul(field_i64(item, "quantity").unwrap_or(0))
                .ok_or_else(overflow)?,
        };
        computed = computed.checked_add(total).ok_or_else(overflow)?;
    }

    let order_type = payload.get("type").and_then(Value::as_str).unwrap_or_default();
    validate_order_type(order_type)?;

    let paid_status = payload
        .get("paid_status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    validate_paid_status(paid_status)?;

    let declared =
        field_i64(payload, "sub_total").ok_or_else(|| ValidationError::required("sub_total"))?;
    if declared != computed {
        return Err(ValidationError::Mismatch {
            field: "sub_total".to_string(),
            declared,
            computed,
        });
    }

    Ok(())
}

// =============================================================================
// Conversion
// =============================================================================

/// Builds the invoice payload for converting a hold order.
///
/// `invoice_date = today`, `due_date = today + issuance period`. The
/// payload does not carry hold linkage; the conversion attaches the hold id
/// to the created invoice afterwards.
pub fn prepare_conversion(
    hold: &HoldInvoiceRecord,
    settings: &CompanySettings,
    next_number: &str,
    today: NaiveDate,
    base: &InvoiceContext,
) -> CoreResult<InvoicePayload> {
    if settings.requires_manual_numbering() {
        return Err(CoreError::ManualNumberingUnsupported);
    }
    if next_number.trim().is_empty() {
        return Err(ValidationError::required("invoice_number").into());
    }

    let mut cart = CartState::new();
    cart.load_invoice(hold);

    let ctx = InvoiceContext {
        invoice_date: today,
        due_date: Some(today + Duration::days(settings.issuance_days())),
        invoice_number: Some(next_number.to_string()),
        customer_id: hold.customer_id.or(base.customer_id),
        paid_status: hold.paid_status.unwrap_or(base.paid_status),
        ..base.clone()
    };

    let mut payload = build_invoice_payload(&cart, &ctx)?;
    payload.hold_invoice_id = None;
    payload.is_hold_invoice = false;
    payload.description = None;
    payload.hold_tables = None;
    Ok(payload)
}

// =============================================================================
// Unit Tests
// =============================================================================
