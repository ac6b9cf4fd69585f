//! # Backend API Contract
//!
//! Everything the register asks of the core-pos backend goes through
//! [`PosApi`]. [`HttpPosApi`](http::HttpPosApi) is the real client; the
//! services only see the trait.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Kitchen / bar                                                          │
//! │    POST /v1/core-pos/listordersbysection      list_orders_by_section    │
//! │    POST /v1/core-pos/getsectionanditem        section_and_items         │
//! │    POST /v1/core-pos/changeordestatus         change_order_status       │
//! │    POST /v1/core-pos/changeOrderStatusItem    change_item_status        │
//! │    GET  /v1/core-pos/sections                 list_sections             │
//! │    GET  /v1/core-pos/sections/item/{id}       item_section              │
//! │                                                                         │
//! │  Invoicing                                                              │
//! │    GET  /v1/company/settings                  company_settings          │
//! │    GET  /v1/next-number?key=invoice           next_invoice_number       │
//! │    POST /v1/invoices                          create_invoice            │
//! │    GET  /v1/invoices/{id}                     get_invoice               │
//! │    PUT  /v1/invoices/{id}                     update_invoice            │
//! │                                                                         │
//! │  Hold orders                                                            │
//! │    GET  /v1/hold-invoices                     list_hold_invoices        │
//! │    POST /v1/hold-invoices                     create_hold_invoice       │
//! │    GET  /v1/hold-invoices/{id}                get_hold_invoice          │
//! │    PUT  /v1/hold-invoices/{id}                update_hold_invoice       │
//! │    DELETE /v1/hold-invoices/{id}              delete_hold_invoice       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod http;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use corepos_core::invoice::{CompanySettings, HoldInvoiceRecord, InvoicePayload, InvoiceRecord};
use corepos_core::section::SectionInfo;
use corepos_core::types::{OrderType, PosStatus, SectionType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

pub use http::HttpPosApi;

// =============================================================================
// Request Types
// =============================================================================

/// Filter for `listordersbysection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderQuery {
    #[serde(rename = "section_type")]
    pub section: SectionType,
    /// `true` fetches the completed queue, `false` the active one.
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_register_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
}

impl OrderQuery {
    pub fn active(section: SectionType) -> Self {
        OrderQuery {
            section,
            completed: false,
            store_id: None,
            cash_register_id: None,
            order_type: None,
        }
    }

    pub fn completed(section: SectionType) -> Self {
        OrderQuery {
            completed: true,
            ..Self::active(section)
        }
    }

    pub fn with_scope(mut self, store_id: Option<i64>, cash_register_id: Option<i64>) -> Self {
        self.store_id = store_id;
        self.cash_register_id = cash_register_id;
        self
    }
}

/// Body of `changeordestatus`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStatusChange {
    pub id: i64,
    pub pos_status: PosStatus,
}

/// Body of `changeOrderStatusItem`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStatusChange {
    pub invoice_id: i64,
    pub item_id: i64,
    pub pos_status: PosStatus,
}

// =============================================================================
// Contract
// =============================================================================

#[async_trait]
pub trait PosApi: Send + Sync {
    // ---- kitchen / bar ----------------------------------------------------

    async fn list_orders_by_section(&self, query: &OrderQuery) -> ApiResult<Vec<InvoiceRecord>>;

    /// One order with its lines' section assignments.
    async fn section_and_items(&self, invoice_id: i64) -> ApiResult<InvoiceRecord>;

    async fn change_order_status(&self, change: &OrderStatusChange) -> ApiResult<()>;

    async fn change_item_status(&self, change: &ItemStatusChange) -> ApiResult<()>;

    async fn list_sections(&self) -> ApiResult<Vec<SectionInfo>>;

    /// `None` when the item is not assigned to any section.
    async fn item_section(&self, item_id: i64) -> ApiResult<Option<SectionInfo>>;

    // ---- invoicing --------------------------------------------------------

    async fn company_settings(&self) -> ApiResult<CompanySettings>;

    async fn next_invoice_number(&self) -> ApiResult<String>;

    async fn create_invoice(&self, payload: &InvoicePayload) -> ApiResult<InvoiceRecord>;

    async fn get_invoice(&self, id: i64) -> ApiResult<InvoiceRecord>;

    async fn update_invoice(&self, id: i64, changes: &Value) -> ApiResult<InvoiceRecord>;

    // ---- hold orders ------------------------------------------------------

    async fn list_hold_invoices(&self) -> ApiResult<Vec<HoldInvoiceRecord>>;

    async fn get_hold_invoice(&self, id: i64) -> ApiResult<HoldInvoiceRecord>;

    async fn create_hold_invoice(&self, payload: &InvoicePayload) -> ApiResult<HoldInvoiceRecord>;

    async fn update_hold_invoice(
        &self,
        id: i64,
        payload: &InvoicePayload,
    ) -> ApiResult<HoldInvoiceRecord>;

    async fn delete_hold_invoice(&self, id: i64) -> ApiResult<()>;
}

// =============================================================================
// Response Unwrapping
// =============================================================================

/// Keys the backend wraps single records in.
const RECORD_KEYS: &[&str] = &["data", "invoice", "hold_invoice", "section"];

/// Pulls a record out of `{data: {...}}`, `{invoice: {...}}` or a bare
/// object.
pub(crate) fn unwrap_record<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    let inner = match body {
        Value::Object(mut map) => match RECORD_KEYS.iter().find_map(|k| map.remove(*k)) {
            Some(inner @ Value::Object(_)) => inner,
            Some(_) | None => Value::Object(map),
        },
        other => other,
    };
    Ok(serde_json::from_value(inner)?)
}

/// Pulls a list out of a bare array, `{data: [...]}` or the paginated
/// `{data: {data: [...]}}`.
pub(crate) fn unwrap_list<T: DeserializeOwned>(body: Value) -> ApiResult<Vec<T>> {
    let mut current = body;
    for _ in 0..3 {
        current = match current {
            Value::Array(_) => break,
            Value::Object(mut map) => match map.remove("data") {
                Some(inner) => inner,
                None => {
                    return Err(ApiError::new(
                        crate::error::ErrorCode::ApiError,
                        "Expected a list in the response",
                    ))
                }
            },
            Value::Null => Value::Array(Vec::new()),
            _ => break,
        };
    }
    Ok(serde_json::from_value(current)?)
}

/// Reads the next number from `{nextNumber}`, `{next_number}`,
/// `{data: ...}` or a bare string/number.
pub(crate) fn unwrap_next_number(body: &Value) -> Option<String> {
    match body {
        Value::String(s) => Some(s.clone()).filter(|s| !s.trim().is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["nextNumber", "next_number", "number", "data"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(unwrap_next_number),
        _ => None,
    }
}
