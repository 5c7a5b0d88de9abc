//! Capability traits shared by workflow documents.
//!
//! The approval gate consumes these instead of a document base class: each
//! family implements only the capabilities its lifecycle actually has.

use crate::id::{DocumentCode, DocumentId, DocumentType, UserId};

/// Common read surface of every workflow document.
pub trait Document {
    fn document_id(&self) -> DocumentId;
    fn document_type(&self) -> DocumentType;
    fn code(&self) -> &DocumentCode;
    fn created_by(&self) -> UserId;
}

/// Documents that pass through an independent-approval step.
pub trait Approvable: Document {
    /// The user who approved the document, once approval has happened.
    fn approved_by(&self) -> Option<UserId>;
}

/// Documents whose lifecycle separates approval from a later release step
/// (segregation of duties applies between the two).
pub trait Releasable: Approvable {
    /// The user who performed the release, once it has happened.
    fn released_by(&self) -> Option<UserId>;
}
