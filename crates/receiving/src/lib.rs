//! `kardex-receiving` — inbound receipt verification workflow.

pub mod receipt;

pub use receipt::{
    CreateReceipt, Discrepancy, DiscrepancyKind, DiscrepancyResolution, DiscrepancyStatus,
    ExpectedLine, InboundReceipt, InboundReceiptCommand, InboundReceiptEvent,
    InboundReceiptStatus, ReceiptLine, RejectionReason, ResolveDiscrepancy, VerifiedLine,
    Verify, VerifyLine,
};
