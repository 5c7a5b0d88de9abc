use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use kardex_approval::{Actor, ApprovalGate, permissions};
use kardex_core::{Aggregate, Document, DomainError, DomainResult, DocumentId, DocumentType};
use kardex_ledger::{DocumentRef, LedgerEntry, Movement, MovementKind, StockLedger};
use kardex_receiving::{
    CreateReceipt, DiscrepancyResolution, ExpectedLine, InboundReceipt, InboundReceiptCommand,
    InboundReceiptEvent, InboundReceiptStatus, ResolveDiscrepancy, Verify, VerifyLine,
};

use crate::numbering::DocumentNumbering;
use crate::store::DocumentStore;

/// Result of a verification: the updated receipt plus the inbound entries
/// appended for accepted goods (rejected goods never enter stock).
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub receipt: InboundReceipt,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// Inbound receipt operations.
pub struct ReceivingService {
    receipts: Arc<DocumentStore<InboundReceipt>>,
    ledger: Arc<StockLedger>,
    gate: Arc<ApprovalGate>,
    numbering: Arc<dyn DocumentNumbering>,
}

impl ReceivingService {
    pub fn new(
        receipts: Arc<DocumentStore<InboundReceipt>>,
        ledger: Arc<StockLedger>,
        gate: Arc<ApprovalGate>,
        numbering: Arc<dyn DocumentNumbering>,
    ) -> Self {
        Self {
            receipts,
            ledger,
            gate,
            numbering,
        }
    }

    /// Open a receipt directly (outside the PO flow).
    pub fn create(
        &self,
        actor: &Actor,
        lines: Vec<ExpectedLine>,
        note: Option<String>,
    ) -> DomainResult<InboundReceipt> {
        let receipt_id = DocumentId::new();
        let mut receipt = InboundReceipt::empty(receipt_id);
        let events = receipt.handle(&InboundReceiptCommand::CreateReceipt(CreateReceipt {
            receipt_id,
            code: self.numbering.next_code(DocumentType::InboundReceipt),
            created_by: actor.user_id,
            source_request: None,
            lines,
            note,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            receipt.apply(event);
        }
        self.receipts.insert(receipt_id, receipt.clone())?;
        info!(code = %receipt.code(), "inbound receipt created");
        Ok(receipt)
    }

    pub fn get(&self, receipt_id: DocumentId) -> DomainResult<InboundReceipt> {
        self.receipts.get(receipt_id)
    }

    pub fn list(&self) -> DomainResult<Vec<InboundReceipt>> {
        self.receipts.list()
    }

    pub fn list_by_status(
        &self,
        status: InboundReceiptStatus,
    ) -> DomainResult<Vec<InboundReceipt>> {
        self.receipts.list_where(|r| r.status() == status)
    }

    /// Receipts that still carry at least one open discrepancy, regardless
    /// of header status.
    pub fn list_with_open_discrepancies(&self) -> DomainResult<Vec<InboundReceipt>> {
        self.receipts
            .list_where(|r| !r.open_discrepancies().is_empty())
    }

    /// Bulk verification. One inbound ledger entry per line with accepted
    /// goods, appended all-or-nothing before the header status moves.
    pub fn verify(
        &self,
        actor: &Actor,
        receipt_id: DocumentId,
        lines: Vec<VerifyLine>,
    ) -> DomainResult<VerifyOutcome> {
        let gate = &self.gate;
        let ledger = &self.ledger;
        let now = Utc::now();

        let outcome = self.receipts.update(receipt_id, |receipt| {
            gate.authorize(actor, &permissions::RECEIPT_VERIFY).map_err(|e| {
                warn!(code = %receipt.code(), %e, "verification denied");
                DomainError::PermissionDenied(e.to_string())
            })?;

            let events = receipt.handle(&InboundReceiptCommand::Verify(Verify {
                receipt_id,
                verified_by: actor.user_id,
                lines: lines.clone(),
                occurred_at: now,
            }))?;
            let InboundReceiptEvent::ReceiptVerified { results, .. } = &events[0] else {
                return Err(DomainError::conflict(
                    "verification produced an unexpected event",
                ));
            };

            let reference = DocumentRef::new(
                receipt.document_type(),
                receipt.document_id(),
                receipt.code().clone(),
            );
            let movements: Vec<Movement> = results
                .iter()
                .filter(|r| r.accepted_qty > 0)
                .map(|r| {
                    Movement::new(
                        r.item_id,
                        MovementKind::Inbound,
                        reference.clone(),
                        r.accepted_qty,
                    )
                })
                .collect();

            // Ledger first: a failed append leaves the receipt untouched.
            let ledger_entries = if movements.is_empty() {
                Vec::new()
            } else {
                ledger.append_batch(movements, now)?
            };

            for event in &events {
                receipt.apply(event);
            }
            Ok(VerifyOutcome {
                receipt: receipt.clone(),
                ledger_entries,
            })
        })?;

        info!(
            code = %outcome.receipt.code(),
            status = outcome.receipt.status().as_str(),
            entries = outcome.ledger_entries.len(),
            "inbound receipt verified"
        );
        Ok(outcome)
    }

    /// Close one open line issue. Corrections to stock, if any, are separate
    /// additive movements; earlier entries are never edited.
    pub fn resolve_discrepancy(
        &self,
        actor: &Actor,
        receipt_id: DocumentId,
        line_no: u32,
        resolution: DiscrepancyResolution,
    ) -> DomainResult<InboundReceipt> {
        let gate = &self.gate;
        let receipt = self.receipts.update(receipt_id, |receipt| {
            gate.authorize(actor, &permissions::DISCREPANCY_RESOLVE)
                .map_err(|e| DomainError::PermissionDenied(e.to_string()))?;
            let events = receipt.handle(&InboundReceiptCommand::ResolveDiscrepancy(
                ResolveDiscrepancy {
                    receipt_id,
                    line_no,
                    resolution,
                    resolved_by: actor.user_id,
                    occurred_at: Utc::now(),
                },
            ))?;
            for event in &events {
                receipt.apply(event);
            }
            Ok(receipt.clone())
        })?;
        info!(code = %receipt.code(), line_no, "discrepancy resolved");
        Ok(receipt)
    }
}
