//! `kardex-ledger` — the stock ledger: append-only movement history plus the
//! per-item on-hand quantity cache, kept in agreement transactionally.

pub mod entry;
pub mod item;
pub mod store;

pub use entry::{DocumentRef, LedgerEntry, Movement, MovementKind};
pub use item::Item;
pub use store::StockLedger;
