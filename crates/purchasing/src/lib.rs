//! `kardex-purchasing` — purchase request workflow.

pub mod request;

pub use request::{
    AddLine, Confirm, CreateRequest, IssuePurchaseOrder, ManagerApprove, ManagerReject,
    PurchaseRequest, PurchaseRequestCommand, PurchaseRequestEvent, PurchaseRequestStatus,
    ReleasePayment, RemoveLine, RequestLine, Submit, UpdateLine,
};
