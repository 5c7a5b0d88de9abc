use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use kardex_core::{DomainError, DomainResult, ItemId};

use crate::entry::{LedgerEntry, Movement};
use crate::item::Item;

#[derive(Debug, Default)]
struct LedgerState {
    items: HashMap<ItemId, Item>,
    entries: Vec<LedgerEntry>,
}

/// Append-only movement ledger plus the per-item quantity cache.
///
/// The single write lock is the atomic unit required by the concurrency
/// model: a batch is validated against live quantities and applied (entry
/// insertion + quantity write) inside one critical section, so two
/// concurrent stock-mutating transitions on the same item can never commit
/// interleaved reads of `current_stock`.
#[derive(Debug, Default)]
pub struct StockLedger {
    inner: RwLock<LedgerState>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item with zero stock.
    pub fn register_item(&self, item: Item) -> DomainResult<()> {
        let mut state = self.write()?;
        if state.items.contains_key(&item.id()) {
            return Err(DomainError::conflict(format!(
                "item {} already registered",
                item.id()
            )));
        }
        state.items.insert(item.id(), item);
        Ok(())
    }

    pub fn item(&self, item_id: ItemId) -> DomainResult<Item> {
        let state = self.read()?;
        state.items.get(&item_id).cloned().ok_or(DomainError::NotFound)
    }

    /// Current on-hand quantity for one item.
    pub fn current_stock(&self, item_id: ItemId) -> DomainResult<i64> {
        Ok(self.item(item_id)?.current_stock())
    }

    /// Append a single movement. See [`StockLedger::append_batch`].
    pub fn append(&self, movement: Movement, occurred_at: DateTime<Utc>) -> DomainResult<LedgerEntry> {
        let mut entries = self.append_batch(vec![movement], occurred_at)?;
        // One movement in, exactly one entry out.
        Ok(entries.remove(0))
    }

    /// Append a batch of movements, all-or-nothing.
    ///
    /// Every movement is validated against live quantities (cumulative per
    /// item, so two lines draining the same item are summed) before anything
    /// is written. One failing line aborts the whole batch with zero entries
    /// recorded and zero quantity changes.
    pub fn append_batch(
        &self,
        movements: Vec<Movement>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerEntry>> {
        if movements.is_empty() {
            return Err(DomainError::validation("movement batch cannot be empty"));
        }

        let mut state = self.write()?;

        // Validate fully before any write.
        let mut projected: HashMap<ItemId, i64> = HashMap::new();
        for movement in &movements {
            if movement.delta == 0 {
                return Err(DomainError::quantity(format!(
                    "zero-quantity movement for item {}",
                    movement.item_id
                )));
            }

            let current = state
                .items
                .get(&movement.item_id)
                .ok_or(DomainError::NotFound)?
                .current_stock();
            let running = projected.entry(movement.item_id).or_insert(current);

            let after = running.checked_add(movement.delta).ok_or_else(|| {
                DomainError::quantity(format!("quantity overflow for item {}", movement.item_id))
            })?;
            if after < 0 {
                return Err(DomainError::insufficient_stock(
                    movement.item_id,
                    *running,
                    -movement.delta,
                ));
            }
            *running = after;
        }

        // Apply: quantity write + entry insertion in the same critical section.
        let mut committed = Vec::with_capacity(movements.len());
        for movement in movements {
            let item = state
                .items
                .get_mut(&movement.item_id)
                .ok_or(DomainError::NotFound)?;
            let before = item.current_stock();
            item.apply_delta(movement.delta);

            let entry = LedgerEntry {
                entry_id: Uuid::now_v7(),
                item_id: movement.item_id,
                warehouse_id: movement.warehouse_id,
                kind: movement.kind,
                reference: movement.reference,
                quantity_before: before,
                quantity_change: movement.delta,
                quantity_after: before + movement.delta,
                occurred_at,
                note: movement.note,
            };
            state.entries.push(entry.clone());
            committed.push(entry);
        }

        Ok(committed)
    }

    /// Full movement history, in creation order. Advisory/audit view.
    pub fn entries(&self) -> DomainResult<Vec<LedgerEntry>> {
        Ok(self.read()?.entries.clone())
    }

    /// Movement history for one item, in creation order.
    pub fn entries_for(&self, item_id: ItemId) -> DomainResult<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| e.item_id == item_id)
            .cloned()
            .collect())
    }

    /// Replay the item's history from zero.
    ///
    /// Must always equal `current_stock`; exposed so tests and audits can
    /// check the ledger invariant directly.
    pub fn replayed_stock(&self, item_id: ItemId) -> DomainResult<i64> {
        let state = self.read()?;
        if !state.items.contains_key(&item_id) {
            return Err(DomainError::NotFound);
        }
        Ok(state
            .entries
            .iter()
            .filter(|e| e.item_id == item_id)
            .map(|e| e.quantity_change)
            .sum())
    }

    fn read(&self) -> DomainResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|_| DomainError::conflict("ledger lock poisoned"))
    }

    fn write(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|_| DomainError::conflict("ledger lock poisoned"))
    }
}
