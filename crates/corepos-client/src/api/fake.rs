//! In-memory [`PosApi`] for service tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use corepos_core::invoice::{CompanySettings, HoldInvoiceRecord, InvoicePayload, InvoiceRecord};
use corepos_core::section::SectionInfo;
use serde_json::Value;

use super::{ItemStatusChange, OrderQuery, OrderStatusChange, PosApi};
use crate::error::{ApiError, ApiResult};

#[derive(Default)]
pub(crate) struct FakeState {
    pub active: Vec<InvoiceRecord>,
    pub completed: Vec<InvoiceRecord>,
    pub sections: HashMap<i64, SectionInfo>,
    pub settings: CompanySettings,
    pub next_number: u64,
    pub invoices: HashMap<i64, InvoiceRecord>,
    pub holds: HashMap<i64, HoldInvoiceRecord>,
    pub next_id: i64,
    pub order_status_changes: Vec<OrderStatusChange>,
    pub item_status_changes: Vec<ItemStatusChange>,
    /// Errors queued per operation name, consumed one per call.
    pub failures: HashMap<&'static str, VecDeque<ApiError>>,
    /// Operation names in call order.
    pub calls: Vec<&'static str>,
}

#[derive(Default)]
pub(crate) struct FakePosApi {
    state: Mutex<FakeState>,
}

impl FakePosApi {
    pub fn new() -> Self {
        let api = FakePosApi::default();
        {
            let mut state = api.state();
            state.next_number = 1;
            state.next_id = 100;
        }
        api
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Makes the next `times` calls of `op` fail with `err`.
    pub fn fail(&self, op: &'static str, times: usize, err: ApiError) {
        let mut state = self.state();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == op).count()
    }

    fn enter(&self, op: &'static str) -> ApiResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        state.calls.push(op);
        if let Some(err) = state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }
}

fn record_from(payload: &InvoicePayload, id: i64, hold: bool) -> InvoiceRecord {
    let mut value = serde_json::to_value(payload).unwrap();
    // A flat cart rate has no tax type and does not survive the server.
    if let Some(Value::Array(taxes)) = value.get_mut("taxes") {
        taxes.retain(|t| !t["tax_type_id"].is_null());
    }
    if hold {
        value["hold_items"] = value["items"].clone();
    }
    let mut record: InvoiceRecord = serde_json::from_value(value).unwrap();
    record.id = Some(id);
    record
}

#[async_trait]
impl PosApi for FakePosApi {
    async fn list_orders_by_section(&self, query: &OrderQuery) -> ApiResult<Vec<InvoiceRecord>> {
        let state = self.enter("list_orders_by_section")?;
        Ok(if query.completed {
            state.completed.clone()
        } else {
            state.active.clone()
        })
    }

    async fn section_and_items(&self, invoice_id: i64) -> ApiResult<InvoiceRecord> {
        let state = self.enter("section_and_items")?;
        state
            .active
            .iter()
            .chain(state.completed.iter())
            .find(|o| o.id == Some(invoice_id))
            .cloned()
            .ok_or_else(|| ApiError::not_found("Order", invoice_id))
    }

    async fn change_order_status(&self, change: &OrderStatusChange) -> ApiResult<()> {
        let mut state = self.enter("change_order_status")?;
        state.order_status_changes.push(change.clone());
        Ok(())
    }

    async fn change_item_status(&self, change: &ItemStatusChange) -> ApiResult<()> {
        let mut state = self.enter("change_item_status")?;
        state.item_status_changes.push(change.clone());
        Ok(())
    }

    async fn list_sections(&self) -> ApiResult<Vec<SectionInfo>> {
        let state = self.enter("list_sections")?;
        let mut sections: Vec<SectionInfo> = state.sections.values().cloned().collect();
        sections.sort_by_key(|s| s.section_id);
        sections.dedup_by_key(|s| s.section_id);
        Ok(sections)
    }

    async fn item_section(&self, item_id: i64) -> ApiResult<Option<SectionInfo>> {
        let state = self.enter("item_section")?;
        Ok(state.sections.get(&item_id).cloned())
    }

    async fn company_settings(&self) -> ApiResult<CompanySettings> {
        Ok(self.enter("company_settings")?.settings.clone())
    }

    async fn next_invoice_number(&self) -> ApiResult<String> {
        let mut state = self.enter("next_invoice_number")?;
        let number = state.next_number;
        state.next_number += 1;
        Ok(format!("INV-{number:06}"))
    }

    async fn create_invoice(&self, payload: &InvoicePayload) -> ApiResult<InvoiceRecord> {
        let mut state = self.enter("create_invoice")?;
        state.next_id += 1;
        let id = state.next_id;
        let record = record_from(payload, id, false);
        state.invoices.insert(id, record.clone());
        Ok(record)
    }

    async fn get_invoice(&self, id: i64) -> ApiResult<InvoiceRecord> {
        let state = self.enter("get_invoice")?;
        state
            .invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Invoice", id))
    }

    async fn update_invoice(&self, id: i64, changes: &Value) -> ApiResult<InvoiceRecord> {
        let mut state = self.enter("update_invoice")?;
        let record = state
            .invoices
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("Invoice", id))?;
        let mut value = serde_json::to_value(&*record).unwrap();
        if let (Value::Object(target), Value::Object(patch)) = (&mut value, changes) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
        *record = serde_json::from_value(value).unwrap();
        Ok(record.clone())
    }

    async fn list_hold_invoices(&self) -> ApiResult<Vec<HoldInvoiceRecord>> {
        let state = self.enter("list_hold_invoices")?;
        let mut holds: Vec<HoldInvoiceRecord> = state.holds.values().cloned().collect();
        holds.sort_by_key(|h| h.id);
        Ok(holds)
    }

    async fn get_hold_invoice(&self, id: i64) -> ApiResult<HoldInvoiceRecord> {
        let state = self.enter("get_hold_invoice")?;
        state
            .holds
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Hold invoice", id))
    }

    async fn create_hold_invoice(&self, payload: &InvoicePayload) -> ApiResult<HoldInvoiceRecord> {
        let mut state = self.enter("create_hold_invoice")?;
        state.next_id += 1;
        let id = state.next_id;
        let record = record_from(payload, id, true);
        state.holds.insert(id, record.clone());
        Ok(record)
    }

    async fn update_hold_invoice(
        &self,
        id: i64,
        payload: &InvoicePayload,
    ) -> ApiResult<HoldInvoiceRecord> {
        let mut state = self.enter("update_hold_invoice")?;
        if !state.holds.contains_key(&id) {
            return Err(ApiError::not_found("Hold invoice", id));
        }
        let record = record_from(payload, id, true);
        state.holds.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_hold_invoice(&self, id: i64) -> ApiResult<()> {
        let mut state = self.enter("delete_hold_invoice")?;
        state
            .holds
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found("Hold invoice", id))
    }
}
