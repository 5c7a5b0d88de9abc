//! `kardex-adjustment` — manual stock correction workflow.

pub mod adjustment;

pub use adjustment::{
    AdjustmentDirection, AdjustmentInput, AdjustmentLine, AdjustmentMethod, Approve,
    CreateAdjustment, Reject, StockAdjustment, StockAdjustmentCommand, StockAdjustmentEvent,
    StockAdjustmentStatus, VarianceLine,
};
