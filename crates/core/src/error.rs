//! Domain error model.

use thiserror::Error;

use crate::id::ItemId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure a workflow transition or ledger append can produce is one of
/// these kinds. Infrastructure concerns (IO, transport) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (missing field, malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested edge is not legal from the document's current state.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// The approval gate denied the acting user.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A quantity is negative, zero where nonzero is required, or exceeds
    /// the requested/expected bound.
    #[error("quantity out of range: {0}")]
    QuantityOutOfRange(String),

    /// A movement would drive an item's on-hand quantity below zero.
    #[error("insufficient stock for item {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: ItemId,
        available: i64,
        requested: i64,
    },

    /// A requested document or item does not exist.
    #[error("not found")]
    NotFound,

    /// A conflict occurred (duplicate creation, stale document).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied(reason.into())
    }

    pub fn quantity(msg: impl Into<String>) -> Self {
        Self::QuantityOutOfRange(msg.into())
    }

    pub fn insufficient_stock(item: ItemId, available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            item,
            available,
            requested,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
