use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use kardex_adjustment::{AdjustmentInput, AdjustmentMethod, StockAdjustment};
use kardex_approval::{Actor, ApprovalGate, permissions};
use kardex_core::{Aggregate, Document, DomainError, DomainResult, DocumentId, DocumentType, ItemId};
use kardex_ledger::StockLedger;
use kardex_opname::{
    AddSheet, CompareSheets, CountMismatch, Finalize, OpnameSession, OpnameSessionCommand,
    OpnameSessionEvent, OpnameSessionStatus, OpnameVariance, OpenSession, RecordCount,
    RejectSheet, SnapshotInput, SubmitSheet,
};

use crate::adjustment::AdjustmentService;
use crate::numbering::DocumentNumbering;
use crate::store::DocumentStore;

/// Result of comparing two submitted sheets.
#[derive(Debug, Clone)]
pub struct CompareOutcome {
    pub matched: bool,
    pub mismatches: Vec<CountMismatch>,
    pub session: OpnameSession,
}

/// Result of finalization: the closed session, its variance list, and the
/// pending adjustment spawned for nonzero variances (if any). Stock itself
/// is untouched until that adjustment is separately approved.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub session: OpnameSession,
    pub variances: Vec<OpnameVariance>,
    pub adjustment: Option<StockAdjustment>,
}

/// Stock opname operations.
pub struct OpnameService {
    sessions: Arc<DocumentStore<OpnameSession>>,
    ledger: Arc<StockLedger>,
    gate: Arc<ApprovalGate>,
    numbering: Arc<dyn DocumentNumbering>,
    adjustments: Arc<AdjustmentService>,
}

impl OpnameService {
    pub fn new(
        sessions: Arc<DocumentStore<OpnameSession>>,
        ledger: Arc<StockLedger>,
        gate: Arc<ApprovalGate>,
        numbering: Arc<dyn DocumentNumbering>,
        adjustments: Arc<AdjustmentService>,
    ) -> Self {
        Self {
            sessions,
            ledger,
            gate,
            numbering,
            adjustments,
        }
    }

    /// Open a session over the audited items, snapshotting each system
    /// quantity exactly once. The snapshot is never refreshed mid-session.
    pub fn open_session(
        &self,
        actor: &Actor,
        item_ids: Vec<ItemId>,
        note: Option<String>,
    ) -> DomainResult<OpnameSession> {
        let mut snapshots = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            snapshots.push(SnapshotInput {
                item_id,
                qty_system: self.ledger.current_stock(item_id)?,
            });
        }

        let session_id = DocumentId::new();
        let mut session = OpnameSession::empty(session_id);
        let events = session.handle(&OpnameSessionCommand::OpenSession(OpenSession {
            session_id,
            code: self.numbering.next_code(DocumentType::StockOpname),
            created_by: actor.user_id,
            items: snapshots,
            note,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            session.apply(event);
        }
        self.sessions.insert(session_id, session.clone())?;
        info!(code = %session.code(), items = session.items().len(), "opname session opened");
        Ok(session)
    }

    pub fn get(&self, session_id: DocumentId) -> DomainResult<OpnameSession> {
        self.sessions.get(session_id)
    }

    pub fn list(&self) -> DomainResult<Vec<OpnameSession>> {
        self.sessions.list()
    }

    pub fn list_by_status(
        &self,
        status: OpnameSessionStatus,
    ) -> DomainResult<Vec<OpnameSession>> {
        self.sessions.list_where(|s| s.status() == status)
    }

    pub fn add_sheet(&self, session_id: DocumentId) -> DomainResult<u32> {
        self.sessions.update(session_id, |session| {
            let events = session.handle(&OpnameSessionCommand::AddSheet(AddSheet {
                session_id,
                occurred_at: Utc::now(),
            }))?;
            let OpnameSessionEvent::SheetAdded { sheet_no, .. } = &events[0] else {
                return Err(DomainError::conflict("sheet creation produced an unexpected event"));
            };
            let sheet_no = *sheet_no;
            for event in &events {
                session.apply(event);
            }
            Ok(sheet_no)
        })
    }

    pub fn record_count(
        &self,
        actor: &Actor,
        session_id: DocumentId,
        sheet_no: u32,
        item_id: ItemId,
        counted_qty: i64,
    ) -> DomainResult<OpnameSession> {
        let gate = &self.gate;
        self.sessions.update(session_id, |session| {
            gate.authorize(actor, &permissions::OPNAME_COUNT)
                .map_err(|e| Self::deny(session, &e))?;
            let events = session.handle(&OpnameSessionCommand::RecordCount(RecordCount {
                session_id,
                sheet_no,
                item_id,
                counted_qty,
                occurred_at: Utc::now(),
            }))?;
            for event in &events {
                session.apply(event);
            }
            Ok(session.clone())
        })
    }

    /// Submit a fully counted sheet; the acting user becomes its counter of
    /// record.
    pub fn submit_sheet(
        &self,
        actor: &Actor,
        session_id: DocumentId,
        sheet_no: u32,
    ) -> DomainResult<OpnameSession> {
        let gate = &self.gate;
        let session = self.sessions.update(session_id, |session| {
            gate.authorize(actor, &permissions::OPNAME_COUNT)
                .map_err(|e| Self::deny(session, &e))?;
            let events = session.handle(&OpnameSessionCommand::SubmitSheet(SubmitSheet {
                session_id,
                sheet_no,
                counter: actor.user_id,
                occurred_at: Utc::now(),
            }))?;
            for event in &events {
                session.apply(event);
            }
            Ok(session.clone())
        })?;
        info!(code = %session.code(), sheet_no, "counting sheet submitted");
        Ok(session)
    }

    /// Compare two submitted sheets line-by-line. Agreement marks both
    /// matched; disagreement returns the mismatch report and changes
    /// nothing — the operator must reject one or both sheets for a recount.
    pub fn compare_sheets(
        &self,
        actor: &Actor,
        session_id: DocumentId,
        sheet_a: u32,
        sheet_b: u32,
    ) -> DomainResult<CompareOutcome> {
        let gate = &self.gate;
        let outcome = self.sessions.update(session_id, |session| {
            gate.authorize(actor, &permissions::OPNAME_COMPARE)
                .map_err(|e| Self::deny(session, &e))?;
            let events = session.handle(&OpnameSessionCommand::CompareSheets(CompareSheets {
                session_id,
                sheet_a,
                sheet_b,
                occurred_at: Utc::now(),
            }))?;
            let (matched, mismatches) = match &events[0] {
                OpnameSessionEvent::SheetsMatched { .. } => (true, Vec::new()),
                OpnameSessionEvent::SheetsMismatched { mismatches, .. } => {
                    (false, mismatches.clone())
                }
                _ => {
                    return Err(DomainError::conflict(
                        "sheet comparison produced an unexpected event",
                    ));
                }
            };
            for event in &events {
                session.apply(event);
            }
            Ok(CompareOutcome {
                matched,
                mismatches,
                session: session.clone(),
            })
        })?;

        info!(
            code = %outcome.session.code(),
            matched = outcome.matched,
            mismatches = outcome.mismatches.len(),
            "counting sheets compared"
        );
        Ok(outcome)
    }

    /// Reset a submitted sheet to draft, clearing counts and counter for a
    /// fresh independent count.
    pub fn reject_sheet(
        &self,
        actor: &Actor,
        session_id: DocumentId,
        sheet_no: u32,
    ) -> DomainResult<OpnameSession> {
        let gate = &self.gate;
        let session = self.sessions.update(session_id, |session| {
            gate.authorize(actor, &permissions::OPNAME_REJECT_SHEET)
                .map_err(|e| Self::deny(session, &e))?;
            let events = session.handle(&OpnameSessionCommand::RejectSheet(RejectSheet {
                session_id,
                sheet_no,
                rejected_by: actor.user_id,
                occurred_at: Utc::now(),
            }))?;
            for event in &events {
                session.apply(event);
            }
            Ok(session.clone())
        })?;
        info!(code = %session.code(), sheet_no, "counting sheet rejected for recount");
        Ok(session)
    }

    /// Finalize: compare the matched count against the session snapshot.
    /// Nonzero variances spawn a pending stock adjustment (method real-qty,
    /// snapshot = the session's own, one line per nonzero variance) that
    /// still has to pass independent approval; stock is untouched here.
    pub fn finalize(&self, actor: &Actor, session_id: DocumentId) -> DomainResult<FinalizeOutcome> {
        let gate = &self.gate;
        let adjustments = &self.adjustments;
        let now = Utc::now();

        let outcome = self.sessions.update(session_id, |session| {
            gate.authorize(actor, &permissions::OPNAME_FINALIZE)
                .map_err(|e| Self::deny(session, &e))?;

            let events = session.handle(&OpnameSessionCommand::Finalize(Finalize {
                session_id,
                finalized_by: actor.user_id,
                occurred_at: now,
            }))?;
            let OpnameSessionEvent::SessionFinalized { variances, .. } = &events[0] else {
                return Err(DomainError::conflict(
                    "finalization produced an unexpected event",
                ));
            };
            let variances = variances.clone();

            let nonzero: Vec<&OpnameVariance> =
                variances.iter().filter(|v| v.qty_variance != 0).collect();
            let adjustment = if nonzero.is_empty() {
                None
            } else {
                let inputs = nonzero
                    .iter()
                    .map(|v| AdjustmentInput {
                        item_id: v.item_id,
                        method: AdjustmentMethod::RealQty {
                            qty_input: v.qty_input,
                        },
                        qty_system: v.qty_system,
                        note: Some(format!("opname {}", session.code())),
                    })
                    .collect();
                Some(adjustments.create_with_snapshots(
                    actor.user_id,
                    inputs,
                    Some(format!("variances from opname {}", session.code())),
                )?)
            };

            for event in &events {
                session.apply(event);
            }
            Ok(FinalizeOutcome {
                session: session.clone(),
                variances,
                adjustment,
            })
        })?;

        info!(
            code = %outcome.session.code(),
            status = outcome.session.status().as_str(),
            adjustment = ?outcome.adjustment.as_ref().map(|a| a.code().as_str()),
            "opname session finalized"
        );
        Ok(outcome)
    }

    fn deny(session: &OpnameSession, err: &kardex_approval::GateError) -> DomainError {
        warn!(code = %session.code(), %err, "opname transition denied");
        DomainError::PermissionDenied(err.to_string())
    }
}
