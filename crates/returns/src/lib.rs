//! `kardex-returns` — vendor return workflow.

pub mod vendor_return;

pub use vendor_return::{
    AddLine, Approve, Complete, CreateReturn, KeepItems, MarkSent, Reject, ReturnLine, Submit,
    VendorReturn, VendorReturnCommand, VendorReturnEvent, VendorReturnStatus,
};
