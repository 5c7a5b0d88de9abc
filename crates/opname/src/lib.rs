//! `kardex-opname` — physical stock count sessions and their two-tier
//! reconciliation: independent sheets must agree with each other before the
//! agreed count is compared against the system's own bookkeeping.

pub mod session;

pub use session::{
    AddSheet, CompareSheets, CountMismatch, CountingSheet, CountingSheetStatus, Finalize,
    OpnameCount, OpnameSession, OpnameSessionCommand, OpnameSessionEvent, OpnameSessionStatus,
    OpnameVariance, OpenSession, RecordCount, RejectSheet, SheetCount, SnapshotInput,
    SubmitSheet,
};
