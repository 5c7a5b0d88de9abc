use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use kardex_adjustment::{
    AdjustmentInput, AdjustmentMethod, Approve, CreateAdjustment, Reject, StockAdjustment,
    StockAdjustmentCommand, StockAdjustmentEvent, StockAdjustmentStatus,
};
use kardex_approval::{Actor, ApprovalGate, permissions};
use kardex_core::{
    Aggregate, Document, DomainError, DomainResult, DocumentId, DocumentType, ItemId, UserId,
};
use kardex_ledger::{DocumentRef, LedgerEntry, Movement, MovementKind, StockLedger};

use crate::numbering::DocumentNumbering;
use crate::store::DocumentStore;

/// One correction requested at creation time; the service snapshots the
/// system quantity itself.
#[derive(Debug, Clone)]
pub struct AdjustmentSpec {
    pub item_id: ItemId,
    pub method: AdjustmentMethod,
    pub note: Option<String>,
}

/// Result of an approval: the approved document plus one adjustment entry
/// per nonzero-variance line.
#[derive(Debug, Clone)]
pub struct AdjustmentOutcome {
    pub adjustment: StockAdjustment,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// Stock adjustment operations.
pub struct AdjustmentService {
    adjustments: Arc<DocumentStore<StockAdjustment>>,
    ledger: Arc<StockLedger>,
    gate: Arc<ApprovalGate>,
    numbering: Arc<dyn DocumentNumbering>,
}

impl AdjustmentService {
    pub fn new(
        adjustments: Arc<DocumentStore<StockAdjustment>>,
        ledger: Arc<StockLedger>,
        gate: Arc<ApprovalGate>,
        numbering: Arc<dyn DocumentNumbering>,
    ) -> Self {
        Self {
            adjustments,
            ledger,
            gate,
            numbering,
        }
    }

    /// Create a pending adjustment, snapshotting each line's system quantity
    /// from the ledger at submission time.
    pub fn create(
        &self,
        actor: &Actor,
        specs: Vec<AdjustmentSpec>,
        note: Option<String>,
    ) -> DomainResult<StockAdjustment> {
        let mut inputs = Vec::with_capacity(specs.len());
        for spec in specs {
            let qty_system = self.ledger.current_stock(spec.item_id)?;
            inputs.push(AdjustmentInput {
                item_id: spec.item_id,
                method: spec.method,
                qty_system,
                note: spec.note,
            });
        }
        self.create_with_snapshots(actor.user_id, inputs, note)
    }

    /// Create a pending adjustment from pre-taken snapshots (opname
    /// finalization supplies the session's own snapshot, not live stock).
    pub(crate) fn create_with_snapshots(
        &self,
        created_by: UserId,
        inputs: Vec<AdjustmentInput>,
        note: Option<String>,
    ) -> DomainResult<StockAdjustment> {
        let adjustment_id = DocumentId::new();
        let mut adjustment = StockAdjustment::empty(adjustment_id);
        let events = adjustment.handle(&StockAdjustmentCommand::CreateAdjustment(
            CreateAdjustment {
                adjustment_id,
                code: self.numbering.next_code(DocumentType::StockAdjustment),
                created_by,
                lines: inputs,
                note,
                occurred_at: Utc::now(),
            },
        ))?;
        for event in &events {
            adjustment.apply(event);
        }
        self.adjustments.insert(adjustment_id, adjustment.clone())?;
        info!(code = %adjustment.code(), "stock adjustment created");
        Ok(adjustment)
    }

    pub fn get(&self, adjustment_id: DocumentId) -> DomainResult<StockAdjustment> {
        self.adjustments.get(adjustment_id)
    }

    pub fn list(&self) -> DomainResult<Vec<StockAdjustment>> {
        self.adjustments.list()
    }

    pub fn list_by_status(
        &self,
        status: StockAdjustmentStatus,
    ) -> DomainResult<Vec<StockAdjustment>> {
        self.adjustments.list_where(|a| a.status() == status)
    }

    /// Approve the batch. The creator cannot approve their own correction.
    /// Variances are re-validated against live stock (which may have drifted
    /// since the snapshot) inside the ledger's critical section; any line
    /// that would drive stock negative aborts the whole approval.
    pub fn approve(
        &self,
        actor: &Actor,
        adjustment_id: DocumentId,
    ) -> DomainResult<AdjustmentOutcome> {
        let gate = &self.gate;
        let ledger = &self.ledger;
        let now = Utc::now();

        let outcome = self.adjustments.update(adjustment_id, |adjustment| {
            gate.can_approve(actor, &*adjustment, &permissions::ADJUSTMENT_APPROVE)
                .map_err(|e| Self::deny(adjustment, &e))?;

            let events = adjustment.handle(&StockAdjustmentCommand::Approve(Approve {
                adjustment_id,
                approved_by: actor.user_id,
                occurred_at: now,
            }))?;
            let StockAdjustmentEvent::AdjustmentApproved { variances, .. } = &events[0] else {
                return Err(DomainError::conflict(
                    "adjustment approval produced an unexpected event",
                ));
            };

            let reference = DocumentRef::new(
                adjustment.document_type(),
                adjustment.document_id(),
                adjustment.code().clone(),
            );
            let movements: Vec<Movement> = variances
                .iter()
                .filter(|v| v.variance != 0)
                .map(|v| {
                    let kind = if v.variance > 0 {
                        MovementKind::AdjustmentIn
                    } else {
                        MovementKind::AdjustmentOut
                    };
                    Movement::new(v.item_id, kind, reference.clone(), v.variance)
                })
                .collect();

            // All lines already at their target leave nothing to move.
            let ledger_entries = if movements.is_empty() {
                Vec::new()
            } else {
                ledger.append_batch(movements, now)?
            };

            for event in &events {
                adjustment.apply(event);
            }
            Ok(AdjustmentOutcome {
                adjustment: adjustment.clone(),
                ledger_entries,
            })
        })?;

        info!(
            code = %outcome.adjustment.code(),
            entries = outcome.ledger_entries.len(),
            "stock adjustment approved"
        );
        Ok(outcome)
    }

    /// Reject the batch: the same non-self rule, no stock mutation.
    pub fn reject(
        &self,
        actor: &Actor,
        adjustment_id: DocumentId,
        reason: impl Into<String>,
    ) -> DomainResult<StockAdjustment> {
        let gate = &self.gate;
        let reason = reason.into();
        let adjustment = self.adjustments.update(adjustment_id, |adjustment| {
            gate.can_approve(actor, &*adjustment, &permissions::ADJUSTMENT_REJECT)
                .map_err(|e| Self::deny(adjustment, &e))?;
            let events = adjustment.handle(&StockAdjustmentCommand::Reject(Reject {
                adjustment_id,
                rejected_by: actor.user_id,
                reason: reason.clone(),
                occurred_at: Utc::now(),
            }))?;
            for event in &events {
                adjustment.apply(event);
            }
            Ok(adjustment.clone())
        })?;
        info!(code = %adjustment.code(), "stock adjustment rejected");
        Ok(adjustment)
    }

    fn deny(adjustment: &StockAdjustment, err: &kardex_approval::GateError) -> DomainError {
        warn!(code = %adjustment.code(), %err, "stock adjustment transition denied");
        DomainError::PermissionDenied(err.to_string())
    }
}
