use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kardex_core::{DocumentCode, DocumentId, DocumentType, ItemId, WarehouseId};

/// Classification of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Inbound,
    Outbound,
    AdjustmentIn,
    AdjustmentOut,
    ReturnOut,
    ReturnIn,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inbound => "inbound",
            MovementKind::Outbound => "outbound",
            MovementKind::AdjustmentIn => "adjustment_in",
            MovementKind::AdjustmentOut => "adjustment_out",
            MovementKind::ReturnOut => "return_out",
            MovementKind::ReturnIn => "return_in",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the document that caused a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_type: DocumentType,
    pub document_id: DocumentId,
    pub code: DocumentCode,
}

impl DocumentRef {
    pub fn new(document_type: DocumentType, document_id: DocumentId, code: DocumentCode) -> Self {
        Self {
            document_type,
            document_id,
            code,
        }
    }
}

/// One immutable stock-card entry: a single quantity change to a single item.
///
/// Entries are facts. Corrections are always additive new entries, never
/// edits to existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub item_id: ItemId,
    pub warehouse_id: Option<WarehouseId>,
    pub kind: MovementKind,
    pub reference: DocumentRef,

    /// On-hand quantity read inside the append's critical section.
    pub quantity_before: i64,
    /// Signed, nonzero.
    pub quantity_change: i64,
    /// Always `quantity_before + quantity_change`.
    pub quantity_after: i64,

    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// An append request: what a document transition wants to do to stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub item_id: ItemId,
    pub warehouse_id: Option<WarehouseId>,
    pub kind: MovementKind,
    pub reference: DocumentRef,
    /// Signed, nonzero.
    pub delta: i64,
    pub note: Option<String>,
}

impl Movement {
    pub fn new(item_id: ItemId, kind: MovementKind, reference: DocumentRef, delta: i64) -> Self {
        Self {
            item_id,
            warehouse_id: None,
            kind,
            reference,
            delta,
            note: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
