//! # Hold Orders
//!
//! Parking carts as hold invoices and promoting them to real invoices.
//!
//! ## Conversion Saga
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get hold ─► settings ─► next number ─► build payload                   │
//! │                 │                                                       │
//! │                 └─ manual numbering ─► VALIDATION_ERROR (nothing sent)  │
//! │                                                                         │
//! │  ─────────────── nothing committed above this line ───────────────────  │
//! │                                                                         │
//! │  create invoice ─► confirm (GET) ─► link hold id ─► delete hold         │
//! │                                                          │              │
//! │                         delete fails ─► pending reconciliation          │
//! │                                          (retried by reconcile_pending) │
//! │                                                                         │
//! │  every run ─► storage["core_pos_order_history"]                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Once the invoice exists the conversion does not fail: later steps are
//! recorded as done or pending and the invoice is returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use corepos_core::cart::CartState;
use corepos_core::invoice::{
    build_invoice_payload, hold_payload_from, prepare_conversion, validate_hold_invoice,
    HoldInvoiceRecord, InvoiceContext, InvoiceRecord,
};
use corepos_core::money::Money;
use corepos_store::keys;
use corepos_sync::StorageHandle;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::PosApi;
use crate::error::{ApiError, ApiResult, ErrorCode};

/// Oldest conversion records are dropped past this many.
pub const ORDER_HISTORY_LIMIT: usize = 200;

// =============================================================================
// Saga Records
// =============================================================================

/// A confirmed step of a conversion, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ConversionStep {
    HoldFetched,
    SettingsChecked,
    NumberReserved { invoice_number: String },
    InvoiceCreated { invoice_id: i64 },
    InvoiceConfirmed,
    HoldLinked,
    HoldDeleted,
}

/// Result of [`HoldOrderService::convert_hold_to_invoice`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionOutcome {
    /// The created invoice, with `hold_invoice_id` set.
    pub invoice: InvoiceRecord,
    pub steps: Vec<ConversionStep>,
    /// The hold order could not be deleted and waits in
    /// `core_pos_pending_reconciliations`.
    pub reconciliation_pending: bool,
}

/// A hold order that outlived its conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReconciliation {
    pub hold_id: i64,
    pub invoice_id: i64,
    pub invoice_number: Option<String>,
    pub attempts: u32,
    pub last_error: String,
    pub recorded_at: DateTime<Utc>,
}

/// One entry of `core_pos_order_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub hold_id: i64,
    pub invoice_id: i64,
    pub invoice_number: Option<String>,
    pub total: Option<Money>,
    pub converted_at: DateTime<Utc>,
    pub reconciliation_pending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Hold ids deleted now, or already gone.
    pub resolved: Vec<i64>,
    pub still_pending: Vec<i64>,
}

// =============================================================================
// Service
// =============================================================================

#[derive(Clone)]
pub struct HoldOrderService {
    api: Arc<dyn PosApi>,
    storage: StorageHandle,
}

impl std::fmt::Debug for HoldOrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoldOrderService")
            .field("window", &self.storage.window_id())
            .finish()
    }
}

impl HoldOrderService {
    pub fn new(api: Arc<dyn PosApi>, storage: StorageHandle) -> Self {
        HoldOrderService { api, storage }
    }

    /// Saves the cart as a hold order.
    ///
    /// Updates the linked hold order when the cart was loaded from one,
    /// otherwise creates a new one. The payload is validated before any
    /// request is made.
    pub async fn save_hold_order(
        &self,
        cart: &CartState,
        ctx: &InvoiceContext,
        description: &str,
    ) -> ApiResult<HoldInvoiceRecord> {
        let payload = hold_payload_from(build_invoice_payload(cart, ctx)?, description);
        validate_hold_invoice(&serde_json::to_value(&payload)?)?;

        let saved = match cart.hold_invoice_id() {
            Some(hold_id) => self.api.update_hold_invoice(hold_id, &payload).await?,
            None => self.api.create_hold_invoice(&payload).await?,
        };
        info!(
            hold_id = ?saved.id,
            updated = cart.hold_invoice_id().is_some(),
            total = %payload.total,
            "Hold order saved"
        );

        self.refresh_cache().await;
        Ok(saved)
    }

    /// Fetches hold orders and caches them for other windows.
    pub async fn list_hold_orders(&self) -> ApiResult<Vec<HoldInvoiceRecord>> {
        let holds = self.api.list_hold_invoices().await?;
        self.storage.set_json(keys::HOLD_INVOICES, &holds).await?;
        Ok(holds)
    }

    /// Hold orders from the last fetch, without the network.
    pub async fn cached_hold_orders(&self) -> ApiResult<Vec<HoldInvoiceRecord>> {
        Ok(self
            .storage
            .get_json(keys::HOLD_INVOICES)
            .await?
            .unwrap_or_default())
    }

    /// Replaces the cart with a hold order and links it for editing.
    pub async fn load_hold_order(
        &self,
        hold_id: i64,
        cart: &mut CartState,
    ) -> ApiResult<HoldInvoiceRecord> {
        let hold = self.api.get_hold_invoice(hold_id).await?;
        cart.load_invoice(&hold);
        cart.set_hold_linkage(Some(hold_id), hold.description.clone());
        info!(hold_id, lines = cart.item_count(), "Hold order loaded into cart");
        Ok(hold)
    }

    pub async fn delete_hold_order(&self, hold_id: i64) -> ApiResult<()> {
        self.api.delete_hold_invoice(hold_id).await?;
        info!(hold_id, "Hold order deleted");
        self.refresh_cache().await;
        Ok(())
    }

    /// Promotes a hold order to an invoice.
    ///
    /// `ctx.invoice_date` is taken as today. Store, register and reference
    /// come from `ctx`; customer and paid status come from the hold order
    /// when it has them.
    pub async fn convert_hold_to_invoice(
        &self,
        hold_id: i64,
        ctx: &InvoiceContext,
    ) -> ApiResult<ConversionOutcome> {
        let mut steps = Vec::new();

        let hold = self.api.get_hold_invoice(hold_id).await?;
        steps.push(ConversionStep::HoldFetched);

        let settings = self.api.company_settings().await?;
        if settings.requires_manual_numbering() {
            warn!(hold_id, "Conversion refused: manual invoice numbering");
            return Err(ApiError::validation(
                "Invoice numbers are not auto-generated; manual numbering is not supported",
            ));
        }
        steps.push(ConversionStep::SettingsChecked);

        let number = self.api.next_invoice_number().await?;
        steps.push(ConversionStep::NumberReserved { invoice_number: number.clone() });

        let payload = prepare_conversion(&hold, &settings, &number, ctx.invoice_date, ctx)?;

        let created = self.api.create_invoice(&payload).await?;
        let invoice_id = created.id.ok_or_else(|| {
            ApiError::new(ErrorCode::ApiError, "Created invoice carried no id")
        })?;
        steps.push(ConversionStep::InvoiceCreated { invoice_id });
        info!(hold_id, invoice_id, invoice_number = %number, "Invoice created from hold order");

        // The invoice exists from here on; nothing below returns an error.
        let mut invoice = match self.api.get_invoice(invoice_id).await {
            Ok(confirmed) => {
                steps.push(ConversionStep::InvoiceConfirmed);
                confirmed
            }
            Err(e) => {
                warn!(invoice_id, error = %e, "Could not confirm created invoice");
                created
            }
        };
        invoice.hold_invoice_id = Some(hold_id);
        steps.push(ConversionStep::HoldLinked);

        let reconciliation_pending = match self.api.delete_hold_invoice(hold_id).await {
            Ok(()) => {
                steps.push(ConversionStep::HoldDeleted);
                false
            }
            Err(e) if e.code == ErrorCode::NotFound => {
                steps.push(ConversionStep::HoldDeleted);
                false
            }
            Err(e) => {
                warn!(hold_id, invoice_id, error = %e, "Hold order not deleted; queued for reconciliation");
                let pending = PendingReconciliation {
                    hold_id,
                    invoice_id,
                    invoice_number: invoice.invoice_number.clone(),
                    attempts: 1,
                    last_error: e.to_string(),
                    recorded_at: Utc::now(),
                };
                if let Err(store_err) = self.push_pending(pending).await {
                    error!(hold_id, invoice_id, error = %store_err, "Could not record pending reconciliation");
                }
                true
            }
        };

        let record = ConversionRecord {
            hold_id,
            invoice_id,
            invoice_number: invoice.invoice_number.clone().or(Some(number)),
            total: invoice.total.or(Some(payload.total)),
            converted_at: Utc::now(),
            reconciliation_pending,
        };
        if let Err(e) = self.append_history(record).await {
            error!(invoice_id, error = %e, "Could not append order history");
        }
        self.refresh_cache().await;

        Ok(ConversionOutcome { invoice, steps, reconciliation_pending })
    }

    /// Hold orders whose deletion is still owed.
    pub async fn pending_reconciliations(&self) -> ApiResult<Vec<PendingReconciliation>> {
        Ok(self
            .storage
            .get_json(keys::PENDING_RECONCILIATIONS)
            .await?
            .unwrap_or_default())
    }

    /// Retries every pending hold deletion. A hold that is already gone
    /// counts as resolved.
    pub async fn reconcile_pending(&self) -> ApiResult<ReconcileReport> {
        let pending = self.pending_reconciliations().await?;
        let mut report = ReconcileReport::default();
        let mut remaining = Vec::new();

        for mut entry in pending {
            match self.api.delete_hold_invoice(entry.hold_id).await {
                Ok(()) => report.resolved.push(entry.hold_id),
                Err(e) if e.code == ErrorCode::NotFound => report.resolved.push(entry.hold_id),
                Err(e) => {
                    warn!(hold_id = entry.hold_id, attempts = entry.attempts + 1, error = %e, "Reconciliation attempt failed");
                    entry.attempts += 1;
                    entry.last_error = e.to_string();
                    report.still_pending.push(entry.hold_id);
                    remaining.push(entry);
                }
            }
        }

        if remaining.is_empty() {
            self.storage.remove(keys::PENDING_RECONCILIATIONS).await?;
        } else {
            self.storage.set_json(keys::PENDING_RECONCILIATIONS, &remaining).await?;
        }

        if !report.resolved.is_empty() {
            let mut history = self.order_history().await?;
            for record in history.iter_mut() {
                if report.resolved.contains(&record.hold_id) {
                    record.reconciliation_pending = false;
                }
            }
            self.storage.set_json(keys::ORDER_HISTORY, &history).await?;
            self.refresh_cache().await;
        }

        info!(
            resolved = report.resolved.len(),
            still_pending = report.still_pending.len(),
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// Conversions recorded on this register, oldest first.
    pub async fn order_history(&self) -> ApiResult<Vec<ConversionRecord>> {
        Ok(self
            .storage
            .get_json(keys::ORDER_HISTORY)
            .await?
            .unwrap_or_default())
    }

    async fn push_pending(&self, entry: PendingReconciliation) -> ApiResult<()> {
        let mut pending = self.pending_reconciliations().await?;
        pending.retain(|p| p.hold_id != entry.hold_id);
        pending.push(entry);
        self.storage.set_json(keys::PENDING_RECONCILIATIONS, &pending).await?;
        Ok(())
    }

    async fn append_history(&self, record: ConversionRecord) -> ApiResult<()> {
        let mut history = self.order_history().await?;
        history.push(record);
        if history.len() > ORDER_HISTORY_LIMIT {
            let excess = history.len() - ORDER_HISTORY_LIMIT;
            history.drain(..excess);
        }
        self.storage.set_json(keys::ORDER_HISTORY, &history).await?;
        Ok(())
    }

    async fn refresh_cache(&self) {
        if let Err(e) = self.list_hold_orders().await {
            warn!(error = %e, "Hold order cache not refreshed");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
