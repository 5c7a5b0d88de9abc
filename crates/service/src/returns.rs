use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use kardex_approval::{Actor, ApprovalGate, permissions};
use kardex_core::{
    Aggregate, Document, DomainError, DomainResult, DocumentId, DocumentType, ItemId, VendorId,
};
use kardex_ledger::{DocumentRef, LedgerEntry, Movement, MovementKind, StockLedger};
use kardex_returns::{
    AddLine, Approve, Complete, CreateReturn, KeepItems, MarkSent, Reject, Submit, VendorReturn,
    VendorReturnCommand, VendorReturnEvent, VendorReturnStatus,
};

use crate::numbering::DocumentNumbering;
use crate::store::DocumentStore;

/// Result of a stock-mutating return transition (completion or keep-items).
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub vendor_return: VendorReturn,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// Vendor return operations.
pub struct ReturnsService {
    returns: Arc<DocumentStore<VendorReturn>>,
    ledger: Arc<StockLedger>,
    gate: Arc<ApprovalGate>,
    numbering: Arc<dyn DocumentNumbering>,
}

impl ReturnsService {
    pub fn new(
        returns: Arc<DocumentStore<VendorReturn>>,
        ledger: Arc<StockLedger>,
        gate: Arc<ApprovalGate>,
        numbering: Arc<dyn DocumentNumbering>,
    ) -> Self {
        Self {
            returns,
            ledger,
            gate,
            numbering,
        }
    }

    pub fn create(
        &self,
        actor: &Actor,
        vendor_id: VendorId,
        note: Option<String>,
    ) -> DomainResult<VendorReturn> {
        let return_id = DocumentId::new();
        let mut vendor_return = VendorReturn::empty(return_id);
        let events = vendor_return.handle(&VendorReturnCommand::CreateReturn(CreateReturn {
            return_id,
            code: self.numbering.next_code(DocumentType::VendorReturn),
            vendor_id,
            created_by: actor.user_id,
            note,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            vendor_return.apply(event);
        }
        self.returns.insert(return_id, vendor_return.clone())?;
        info!(code = %vendor_return.code(), "vendor return created");
        Ok(vendor_return)
    }

    pub fn get(&self, return_id: DocumentId) -> DomainResult<VendorReturn> {
        self.returns.get(return_id)
    }

    pub fn list(&self) -> DomainResult<Vec<VendorReturn>> {
        self.returns.list()
    }

    pub fn list_by_status(&self, status: VendorReturnStatus) -> DomainResult<Vec<VendorReturn>> {
        self.returns.list_where(|r| r.status() == status)
    }

    pub fn add_line(
        &self,
        actor: &Actor,
        return_id: DocumentId,
        item_id: ItemId,
        quantity: i64,
    ) -> DomainResult<VendorReturn> {
        self.returns.update(return_id, |vendor_return| {
            if actor.user_id != vendor_return.created_by() {
                return Err(DomainError::denied("only the creator can edit a vendor return"));
            }
            Self::apply_command(
                vendor_return,
                &VendorReturnCommand::AddLine(AddLine {
                    return_id,
                    item_id,
                    quantity,
                    occurred_at: Utc::now(),
                }),
            )
        })
    }

    pub fn submit(&self, actor: &Actor, return_id: DocumentId) -> DomainResult<VendorReturn> {
        let vendor_return = self.returns.update(return_id, |vendor_return| {
            if actor.user_id != vendor_return.created_by() {
                return Err(DomainError::denied("only the creator can submit a vendor return"));
            }
            Self::apply_command(
                vendor_return,
                &VendorReturnCommand::Submit(Submit {
                    return_id,
                    submitted_by: actor.user_id,
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(code = %vendor_return.code(), "vendor return submitted");
        Ok(vendor_return)
    }

    pub fn approve(&self, actor: &Actor, return_id: DocumentId) -> DomainResult<VendorReturn> {
        let gate = &self.gate;
        let vendor_return = self.returns.update(return_id, |vendor_return| {
            gate.can_approve(actor, &*vendor_return, &permissions::RETURN_APPROVE)
                .map_err(|e| Self::deny(vendor_return, &e))?;
            Self::apply_command(
                vendor_return,
                &VendorReturnCommand::Approve(Approve {
                    return_id,
                    approved_by: actor.user_id,
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(code = %vendor_return.code(), "vendor return approved");
        Ok(vendor_return)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        return_id: DocumentId,
        reason: impl Into<String>,
    ) -> DomainResult<VendorReturn> {
        let gate = &self.gate;
        let reason = reason.into();
        let vendor_return = self.returns.update(return_id, |vendor_return| {
            gate.can_approve(actor, &*vendor_return, &permissions::RETURN_REJECT)
                .map_err(|e| Self::deny(vendor_return, &e))?;
            Self::apply_command(
                vendor_return,
                &VendorReturnCommand::Reject(Reject {
                    return_id,
                    rejected_by: actor.user_id,
                    reason: reason.clone(),
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(code = %vendor_return.code(), "vendor return rejected");
        Ok(vendor_return)
    }

    pub fn mark_sent(&self, actor: &Actor, return_id: DocumentId) -> DomainResult<VendorReturn> {
        let gate = &self.gate;
        let vendor_return = self.returns.update(return_id, |vendor_return| {
            gate.authorize(actor, &permissions::RETURN_SEND)
                .map_err(|e| Self::deny(vendor_return, &e))?;
            Self::apply_command(
                vendor_return,
                &VendorReturnCommand::MarkSent(MarkSent {
                    return_id,
                    sent_by: actor.user_id,
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(code = %vendor_return.code(), "vendor return sent to vendor");
        Ok(vendor_return)
    }

    /// Complete the return: goods physically leave, one return-out entry per
    /// line in a single all-or-nothing batch. The approver cannot also be
    /// the completer (segregation of duties).
    pub fn complete(&self, actor: &Actor, return_id: DocumentId) -> DomainResult<ReturnOutcome> {
        let gate = &self.gate;
        let ledger = &self.ledger;
        let now = Utc::now();

        let outcome = self.returns.update(return_id, |vendor_return| {
            gate.can_release(actor, &*vendor_return, &permissions::RETURN_COMPLETE)
                .map_err(|e| Self::deny(vendor_return, &e))?;

            let events = vendor_return.handle(&VendorReturnCommand::Complete(Complete {
                return_id,
                completed_by: actor.user_id,
                occurred_at: now,
            }))?;
            let VendorReturnEvent::ReturnCompleted { lines, .. } = &events[0] else {
                return Err(DomainError::conflict(
                    "return completion produced an unexpected event",
                ));
            };

            let reference = DocumentRef::new(
                vendor_return.document_type(),
                vendor_return.document_id(),
                vendor_return.code().clone(),
            );
            let movements: Vec<Movement> = lines
                .iter()
                .map(|l| {
                    Movement::new(
                        l.item_id,
                        MovementKind::ReturnOut,
                        reference.clone(),
                        -l.quantity,
                    )
                })
                .collect();
            let ledger_entries = ledger.append_batch(movements, now)?;

            for event in &events {
                vendor_return.apply(event);
            }
            Ok(ReturnOutcome {
                vendor_return: vendor_return.clone(),
                ledger_entries,
            })
        })?;

        info!(
            code = %outcome.vendor_return.code(),
            entries = outcome.ledger_entries.len(),
            "vendor return completed"
        );
        Ok(outcome)
    }

    /// The vendor declined the return after the goods left: take the items
    /// back into stock with return-in entries. A distinct transition, not an
    /// undo of completion.
    pub fn keep_items(&self, actor: &Actor, return_id: DocumentId) -> DomainResult<ReturnOutcome> {
        let gate = &self.gate;
        let ledger = &self.ledger;
        let now = Utc::now();

        let outcome = self.returns.update(return_id, |vendor_return| {
            gate.authorize(actor, &permissions::RETURN_KEEP)
                .map_err(|e| Self::deny(vendor_return, &e))?;

            let events = vendor_return.handle(&VendorReturnCommand::KeepItems(KeepItems {
                return_id,
                kept_by: actor.user_id,
                occurred_at: now,
            }))?;
            let VendorReturnEvent::ItemsKept { lines, .. } = &events[0] else {
                return Err(DomainError::conflict(
                    "keep-items produced an unexpected event",
                ));
            };

            let reference = DocumentRef::new(
                vendor_return.document_type(),
                vendor_return.document_id(),
                vendor_return.code().clone(),
            );
            let movements: Vec<Movement> = lines
                .iter()
                .map(|l| {
                    Movement::new(
                        l.item_id,
                        MovementKind::ReturnIn,
                        reference.clone(),
                        l.quantity,
                    )
                })
                .collect();
            let ledger_entries = ledger.append_batch(movements, now)?;

            for event in &events {
                vendor_return.apply(event);
            }
            Ok(ReturnOutcome {
                vendor_return: vendor_return.clone(),
                ledger_entries,
            })
        })?;

        info!(
            code = %outcome.vendor_return.code(),
            entries = outcome.ledger_entries.len(),
            "returned items kept back into stock"
        );
        Ok(outcome)
    }

    fn apply_command(
        vendor_return: &mut VendorReturn,
        command: &VendorReturnCommand,
    ) -> DomainResult<VendorReturn> {
        let events = vendor_return.handle(command)?;
        for event in &events {
            vendor_return.apply(event);
        }
        Ok(vendor_return.clone())
    }

    fn deny(vendor_return: &VendorReturn, err: &kardex_approval::GateError) -> DomainError {
        warn!(code = %vendor_return.code(), %err, "vendor return transition denied");
        DomainError::PermissionDenied(err.to_string())
    }
}
