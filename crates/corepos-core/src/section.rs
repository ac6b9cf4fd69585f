//! # Section Projection
//!
//! Turns server orders into a kitchen or bar board.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Section Projection                                 │
//! │                                                                         │
//! │  orders ──► tag each line with its section (mapping, then line field)   │
//! │         ──► keep only lines for the target section                      │
//! │         ──► drop orders left with no lines                              │
//! │         ──► split by ORDER pos_status:                                  │
//! │               != COMPLETED → active                                     │
//! │               == COMPLETED → completed                                  │
//! │         ──► oldest first                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::invoice::{InvoiceRecord, RecordItem};
use crate::serde_helpers::lenient_i64;
use crate::types::{OrderType, PosStatus, SectionType, SelectedTable};

// =============================================================================
// Section Mapping
// =============================================================================

/// Where an item is prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SectionInfo {
    #[serde(alias = "id", deserialize_with = "lenient_i64")]
    pub section_id: i64,
    #[serde(default)]
    pub section_type: SectionType,
    #[serde(default, alias = "section_name")]
    pub name: String,
}

/// Catalog item id → section.
pub type SectionMap = HashMap<i64, SectionInfo>;

// =============================================================================
// Board
// =============================================================================

/// An order line routed to a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SectionLine {
    /// Server line id.
    pub id: Option<i64>,
    pub item_id: Option<i64>,
    pub name: String,
    pub quantity: i64,
    pub notes: Option<String>,
    pub section_id: Option<i64>,
    pub section_type: SectionType,
    pub section_name: Option<String>,
    pub pos_status: PosStatus,
}

/// An order as shown on a section board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SectionOrder {
    pub id: i64,
    pub invoice_number: Option<String>,
    pub order_type: Option<OrderType>,
    pub pos_status: PosStatus,
    pub notes: Option<String>,
    pub tables: Vec<SelectedTable>,
    pub created_at: Option<String>,
    pub items: Vec<SectionLine>,
}

/// Active and completed queues for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SectionBoard {
    pub section: SectionType,
    pub active: Vec<SectionOrder>,
    pub completed: Vec<SectionOrder>,
}

impl SectionBoard {
    pub fn empty(section: SectionType) -> Self {
        SectionBoard {
            section,
            active: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn find_order(&self, order_id: i64) -> Option<&SectionOrder> {
        self.active
            .iter()
            .chain(self.completed.iter())
            .find(|o| o.id == order_id)
    }

    /// Sets an order's status, moving it between queues.
    ///
    /// Returns the previous status, or `None` when the order is not on the
    /// board.
    pub fn set_order_status(&mut self, order_id: i64, status: PosStatus) -> Option<PosStatus> {
        let (queue, position) = if let Some(p) = self.active.iter().position(|o| o.id == order_id) {
            (&mut self.active, p)
        } else {
            let p = self.completed.iter().position(|o| o.id == order_id)?;
            (&mut self.completed, p)
        };

        let mut order = queue.remove(position);
        let previous = order.pos_status;
        order.pos_status = status;
        if status.is_completed() {
            self.completed.push(order);
            sort_oldest_first(&mut self.completed);
        } else {
            self.active.push(order);
            sort_oldest_first(&mut self.active);
        }
        Some(previous)
    }

    /// Sets one line's status. Returns the previous status.
    pub fn set_item_status(
        &mut self,
        order_id: i64,
        line_id: i64,
        status: PosStatus,
    ) -> Option<PosStatus> {
        let line = self
            .active
            .iter_mut()
            .chain(self.completed.iter_mut())
            .find(|o| o.id == order_id)?
            .items
            .iter_mut()
            .find(|l| l.id == Some(line_id))?;
        let previous = line.pos_status;
        line.pos_status = status;
        Some(previous)
    }
}

fn sort_oldest_first(orders: &mut [SectionOrder]) {
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

// =============================================================================
// Projection
// =============================================================================

fn route_line(line: &RecordItem, mapping: &SectionMap, order_status: PosStatus) -> SectionLine {
    let mapped = line.catalog_id().and_then(|id| mapping.get(&id));
    SectionLine {
        id: line.id,
        item_id: line.item_id,
        name: line.name.clone(),
        quantity: line.quantity,
        notes: line.notes.clone(),
        section_id: mapped.map(|s| s.section_id).or(line.section_id),
        section_type: mapped
            .map(|s| s.section_type)
            .or(line.section_type)
            .unwrap_or(SectionType::Other),
        section_name: mapped.map(|s| s.name.clone()).or(line.section_name.clone()),
        pos_status: line.pos_status.unwrap_or(order_status),
    }
}

/// Projects orders onto one section's board.
///
/// Orders without an id are skipped. An order listed twice (for instance
/// in both the active and completed fetch) is kept once.
pub fn project_sections(
    orders: &[InvoiceRecord],
    mapping: &SectionMap,
    target: SectionType,
) -> SectionBoard {
    let mut board = SectionBoard::empty(target);
    let mut seen = HashSet::new();

    for order in orders {
        let Some(id) = order.id else { continue };
        if !seen.insert(id) {
            continue;
        }

        let status = order.pos_status.unwrap_or_default();
        let items: Vec<SectionLine> = order
            .lines()
            .iter()
            .map(|line| route_line(line, mapping, status))
            .filter(|line| line.section_type == target)
            .collect();
        if items.is_empty() {
            continue;
        }

        let projected = SectionOrder {
            id,
            invoice_number: order.invoice_number.clone(),
            order_type: order.order_type,
            pos_status: status,
            notes: order.notes.clone(),
            tables: order.tables().to_vec(),
            created_at: order.created_at.clone(),
            items,
        };
        if status.is_completed() {
            board.completed.push(projected);
        } else {
            board.active.push(projected);
        }
    }

    sort_oldest_first(&mut board.active);
    sort_oldest_first(&mut board.completed);
    board
}

/// Catalog ids on the orders that the mapping does not cover yet.
pub fn unmapped_item_ids(orders: &[InvoiceRecord], mapping: &SectionMap) -> Vec<i64> {
    let mut ids: Vec<i64> = orders
        .iter()
        .flat_map(|o| o.lines().iter())
        .filter_map(RecordItem::catalog_id)
        .filter(|id| !mapping.contains_key(id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    ids.sort_unstable();
    ids
}

// =============================================================================
// Unit Tests
// =============================================================================
