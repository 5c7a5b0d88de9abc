//! `kardex-service` — orchestration over the document workflows and the
//! stock ledger: per-family operations, cross-document side effects, and the
//! atomic gate -> state machine -> ledger pipeline.

pub mod adjustment;
pub mod numbering;
pub mod opname;
pub mod outbound;
pub mod purchasing;
pub mod receiving;
pub mod returns;
pub mod services;
pub mod store;
pub mod telemetry;

pub use adjustment::{AdjustmentOutcome, AdjustmentService, AdjustmentSpec};
pub use numbering::{DocumentNumbering, SequentialNumbering};
pub use opname::{CompareOutcome, FinalizeOutcome, OpnameService};
pub use outbound::{OutboundService, ReleaseOutcome};
pub use purchasing::{IssuePoOutcome, PurchasingService};
pub use receiving::{ReceivingService, VerifyOutcome};
pub use returns::{ReturnOutcome, ReturnsService};
pub use services::InventoryServices;
pub use store::DocumentStore;
