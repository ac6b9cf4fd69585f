//! # Kitchen / Bar Service
//!
//! Keeps one section's board in sync with the backend.
//!
//! ## Refresh
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  list_orders_by_section(active) ──┐                                     │
//! │                                   ├─► join ─► item ids                  │
//! │  list_orders_by_section(done) ────┘              │                      │
//! │                                                  ▼                      │
//! │                             SectionCache::resolve (parallel, TTL)       │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                 project_sections ─► board ─► storage["kitchen_orders"]  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Changes
//! The board changes first so the display reacts at once. The status call
//! is retried with backoff; if it still fails the board change is undone
//! and the caller gets `STATUS_UPDATE_FAILED`.

use std::sync::Arc;

use corepos_core::invoice::InvoiceRecord;
use corepos_core::section::{project_sections, unmapped_item_ids, SectionBoard, SectionMap};
use corepos_core::types::{PosStatus, SectionType};
use corepos_store::keys;
use corepos_sync::StorageHandle;
use futures::future::join_all;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{ItemStatusChange, OrderQuery, OrderStatusChange, PosApi};
use crate::config::{KitchenSettings, RetrySettings};
use crate::debounce::Debouncer;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::retry::with_retry;
use crate::section_cache::SectionCache;

/// Store and register the board is limited to. `None` means all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderScope {
    pub store_id: Option<i64>,
    pub cash_register_id: Option<i64>,
}

struct KitchenInner {
    api: Arc<dyn PosApi>,
    cache: SectionCache,
    storage: StorageHandle,
    retry: RetrySettings,
    section: SectionType,
    scope: OrderScope,
    board: RwLock<SectionBoard>,
}

/// Board service for one section type.
pub struct KitchenService {
    inner: Arc<KitchenInner>,
    debouncer: Debouncer,
}

impl std::fmt::Debug for KitchenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KitchenService")
            .field("section", &self.inner.section)
            .field("scope", &self.inner.scope)
            .finish()
    }
}

impl KitchenService {
    /// Must be called inside a Tokio runtime (starts the refresh debouncer).
    pub fn new(
        api: Arc<dyn PosApi>,
        cache: SectionCache,
        storage: StorageHandle,
        section: SectionType,
        scope: OrderScope,
        kitchen: &KitchenSettings,
        retry: RetrySettings,
    ) -> Self {
        let inner = Arc::new(KitchenInner {
            api,
            cache,
            storage,
            retry,
            section,
            scope,
            board: RwLock::new(SectionBoard::empty(section)),
        });

        let background = Arc::clone(&inner);
        let debouncer = Debouncer::spawn(kitchen.debounce_window(), move || {
            let inner = Arc::clone(&background);
            async move {
                if let Err(e) = inner.refresh().await {
                    warn!(section = %inner.section, error = %e, "Debounced refresh failed");
                }
            }
        });

        KitchenService { inner, debouncer }
    }

    pub fn section(&self) -> SectionType {
        self.inner.section
    }

    /// Current board, without touching the network.
    pub async fn board(&self) -> SectionBoard {
        self.inner.board.read().await.clone()
    }

    /// Board last persisted by any window.
    pub async fn stored_board(&self) -> ApiResult<Option<SectionBoard>> {
        Ok(self.inner.storage.get_json(keys::KITCHEN_ORDERS).await?)
    }

    /// Fetches, projects and persists the board.
    pub async fn refresh(&self) -> ApiResult<SectionBoard> {
        self.inner.refresh().await
    }

    /// Schedules a refresh. Calls within the debounce window collapse.
    pub fn request_refresh(&self) {
        self.debouncer.trigger();
    }

    /// One order with its section assignments, straight from the backend.
    pub async fn order_details(&self, order_id: i64) -> ApiResult<InvoiceRecord> {
        self.inner.api.section_and_items(order_id).await
    }

    pub async fn complete_order(&self, order_id: i64) -> ApiResult<()> {
        self.set_order_status(order_id, PosStatus::Completed).await
    }

    /// Completes several orders concurrently.
    ///
    /// Each order is rolled back on its own. When any fail, the error lists
    /// the failed ids under `details.failed`.
    pub async fn complete_orders(&self, order_ids: &[i64]) -> ApiResult<()> {
        let results = join_all(
            order_ids
                .iter()
                .map(|&id| async move { (id, self.complete_order(id).await) }),
        )
        .await;

        let failed: Vec<i64> = results
            .iter()
            .filter_map(|(id, r)| r.is_err().then_some(*id))
            .collect();
        if failed.is_empty() {
            return Ok(());
        }

        let errors: Vec<_> = results.into_iter().filter_map(|(_, r)| r.err()).collect();
        Err(ApiError::new(
            ErrorCode::StatusUpdateFailed,
            format!("{} of {} orders could not be updated", failed.len(), order_ids.len()),
        )
        .with_details(json!({ "failed": failed, "errors": errors })))
    }

    pub async fn set_order_status(&self, order_id: i64, status: PosStatus) -> ApiResult<()> {
        let inner = &self.inner;
        let previous = inner
            .board
            .write()
            .await
            .set_order_status(order_id, status)
            .ok_or_else(|| ApiError::not_found("Order", order_id))?;

        let change = OrderStatusChange { id: order_id, pos_status: status };
        let result = with_retry(&inner.retry, "change_order_status", || {
            inner.api.change_order_status(&change)
        })
        .await;

        if let Err(e) = result {
            inner.board.write().await.set_order_status(order_id, previous);
            warn!(order_id, %status, %previous, error = %e, "Order status update rolled back");
            return Err(status_update_failed(e, json!({ "order_id": order_id, "status": status })));
        }

        info!(order_id, %status, section = %inner.section, "Order status changed");
        inner.persist().await
    }

    pub async fn complete_item(&self, order_id: i64, line_id: i64) -> ApiResult<()> {
        self.set_item_status(order_id, line_id, PosStatus::Completed).await
    }

    pub async fn set_item_status(
        &self,
        order_id: i64,
        line_id: i64,
        status: PosStatus,
    ) -> ApiResult<()> {
        let inner = &self.inner;
        let previous = inner
            .board
            .write()
            .await
            .set_item_status(order_id, line_id, status)
            .ok_or_else(|| ApiError::not_found("Order line", format!("{order_id}/{line_id}")))?;

        let change = ItemStatusChange { invoice_id: order_id, item_id: line_id, pos_status: status };
        let result = with_retry(&inner.retry, "change_item_status", || {
            inner.api.change_item_status(&change)
        })
        .await;

        if let Err(e) = result {
            inner.board.write().await.set_item_status(order_id, line_id, previous);
            warn!(order_id, line_id, %status, error = %e, "Item status update rolled back");
            return Err(status_update_failed(
                e,
                json!({ "order_id": order_id, "line_id": line_id, "status": status }),
            ));
        }

        info!(order_id, line_id, %status, "Item status changed");
        inner.persist().await
    }
}

fn status_update_failed(cause: ApiError, target: serde_json::Value) -> ApiError {
    ApiError::new(ErrorCode::StatusUpdateFailed, format!("Status update failed: {}", cause.message))
        .with_details(json!({ "target": target, "cause": cause }))
}

impl KitchenInner {
    async fn refresh(&self) -> ApiResult<SectionBoard> {
        let active = OrderQuery::active(self.section)
            .with_scope(self.scope.store_id, self.scope.cash_register_id);
        let completed = OrderQuery::completed(self.section)
            .with_scope(self.scope.store_id, self.scope.cash_register_id);

        let (active, completed) = futures::join!(
            self.api.list_orders_by_section(&active),
            self.api.list_orders_by_section(&completed),
        );
        let mut orders = active?;
        orders.extend(completed?);

        let item_ids = unmapped_item_ids(&orders, &SectionMap::new());
        let mapping = self.cache.resolve(self.api.as_ref(), &item_ids).await;
        let board = project_sections(&orders, &mapping, self.section);

        debug!(
            section = %self.section,
            orders = orders.len(),
            active = board.active.len(),
            completed = board.completed.len(),
            "Board projected"
        );

        *self.board.write().await = board.clone();
        self.persist().await?;
        Ok(board)
    }

    async fn persist(&self) -> ApiResult<()> {
        let board = self.board.read().await.clone();
        self.storage.set_json(keys::KITCHEN_ORDERS, &board).await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
