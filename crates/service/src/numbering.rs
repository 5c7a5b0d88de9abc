use std::collections::HashMap;
use std::sync::Mutex;

use kardex_core::{DocumentCode, DocumentType};

/// Document numbering service.
///
/// Format and uniqueness are delegated to the implementation; the workflows
/// treat produced codes as opaque and collision-free.
pub trait DocumentNumbering: Send + Sync {
    fn next_code(&self, document_type: DocumentType) -> DocumentCode;
}

/// Sequential per-family counter ("PR-0001", "GI-0002", ...).
#[derive(Debug, Default)]
pub struct SequentialNumbering {
    counters: Mutex<HashMap<DocumentType, u64>>,
}

impl SequentialNumbering {
    pub fn new() -> Self {
        Self::default()
    }

    fn prefix(document_type: DocumentType) -> &'static str {
        match document_type {
            DocumentType::PurchaseRequest => "PR",
            DocumentType::InboundReceipt => "GR",
            DocumentType::OutboundRelease => "GI",
            DocumentType::StockAdjustment => "ADJ",
            DocumentType::VendorReturn => "RTV",
            DocumentType::StockOpname => "SO",
        }
    }
}

impl DocumentNumbering for SequentialNumbering {
    fn next_code(&self, document_type: DocumentType) -> DocumentCode {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = counters.entry(document_type).or_insert(0);
        *counter += 1;
        DocumentCode::new(format!("{}-{:04}", Self::prefix(document_type), counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_sequential_per_family() {
        let numbering = SequentialNumbering::new();
        assert_eq!(
            numbering.next_code(DocumentType::PurchaseRequest).as_str(),
            "PR-0001"
        );
        assert_eq!(
            numbering.next_code(DocumentType::PurchaseRequest).as_str(),
            "PR-0002"
        );
        assert_eq!(
            numbering.next_code(DocumentType::OutboundRelease).as_str(),
            "GI-0001"
        );
    }
}
