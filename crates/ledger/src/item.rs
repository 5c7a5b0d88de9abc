use serde::{Deserialize, Serialize};

use kardex_core::ItemId;

/// A stock-keeping item with its denormalized on-hand quantity.
///
/// `current_stock` is a materialized view over the item's ledger history.
/// There is no public setter: the only write path is the ledger store's
/// append, which changes the quantity and records the explaining entry in
/// the same critical section. This module boundary is what keeps the cache
/// and the history from drifting apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    unit: String,
    current_stock: i64,
}

impl Item {
    /// Create an item with zero stock. Initial quantities enter through an
    /// adjustment movement, never through construction.
    pub fn new(id: ItemId, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            unit: unit.into(),
            current_stock: 0,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Current on-hand quantity. Never negative.
    pub fn current_stock(&self) -> i64 {
        self.current_stock
    }

    /// Crate-private: only `StockLedger::append_batch` may move the quantity.
    pub(crate) fn apply_delta(&mut self, delta: i64) {
        self.current_stock += delta;
    }
}
