use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use kardex_approval::{Actor, ApprovalGate, permissions};
use kardex_core::{
    Aggregate, Document, DomainError, DomainResult, DocumentId, DocumentType, ItemId,
};
use kardex_ledger::{DocumentRef, LedgerEntry, Movement, MovementKind, StockLedger};
use kardex_outbound::{
    AddLine, Approve, CreateRelease, OutboundRelease, OutboundReleaseCommand,
    OutboundReleaseEvent, OutboundReleaseStatus, Reject, Release, ReleaseInput,
};

use crate::numbering::DocumentNumbering;
use crate::store::DocumentStore;

/// Result of a stock release: the released document plus one outbound entry
/// per nonzero line.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub release: OutboundRelease,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// Outbound release operations.
pub struct OutboundService {
    releases: Arc<DocumentStore<OutboundRelease>>,
    ledger: Arc<StockLedger>,
    gate: Arc<ApprovalGate>,
    numbering: Arc<dyn DocumentNumbering>,
}

impl OutboundService {
    pub fn new(
        releases: Arc<DocumentStore<OutboundRelease>>,
        ledger: Arc<StockLedger>,
        gate: Arc<ApprovalGate>,
        numbering: Arc<dyn DocumentNumbering>,
    ) -> Self {
        Self {
            releases,
            ledger,
            gate,
            numbering,
        }
    }

    pub fn create(&self, actor: &Actor, note: Option<String>) -> DomainResult<OutboundRelease> {
        let release_id = DocumentId::new();
        let mut release = OutboundRelease::empty(release_id);
        let events = release.handle(&OutboundReleaseCommand::CreateRelease(CreateRelease {
            release_id,
            code: self.numbering.next_code(DocumentType::OutboundRelease),
            created_by: actor.user_id,
            note,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            release.apply(event);
        }
        self.releases.insert(release_id, release.clone())?;
        info!(code = %release.code(), "outbound release created");
        Ok(release)
    }

    pub fn get(&self, release_id: DocumentId) -> DomainResult<OutboundRelease> {
        self.releases.get(release_id)
    }

    pub fn list(&self) -> DomainResult<Vec<OutboundRelease>> {
        self.releases.list()
    }

    pub fn list_by_status(
        &self,
        status: OutboundReleaseStatus,
    ) -> DomainResult<Vec<OutboundRelease>> {
        self.releases.list_where(|r| r.status() == status)
    }

    pub fn add_line(
        &self,
        actor: &Actor,
        release_id: DocumentId,
        item_id: ItemId,
        requested_qty: i64,
    ) -> DomainResult<OutboundRelease> {
        self.releases.update(release_id, |release| {
            if actor.user_id != release.created_by() {
                return Err(DomainError::denied(
                    "only the creator can edit an outbound release",
                ));
            }
            let events = release.handle(&OutboundReleaseCommand::AddLine(AddLine {
                release_id,
                item_id,
                requested_qty,
                occurred_at: Utc::now(),
            }))?;
            for event in &events {
                release.apply(event);
            }
            Ok(release.clone())
        })
    }

    pub fn approve(&self, actor: &Actor, release_id: DocumentId) -> DomainResult<OutboundRelease> {
        let gate = &self.gate;
        let release = self.releases.update(release_id, |release| {
            gate.can_approve(actor, &*release, &permissions::RELEASE_APPROVE)
                .map_err(|e| Self::deny(release, &e))?;
            let events = release.handle(&OutboundReleaseCommand::Approve(Approve {
                release_id,
                approved_by: actor.user_id,
                occurred_at: Utc::now(),
            }))?;
            for event in &events {
                release.apply(event);
            }
            Ok(release.clone())
        })?;
        info!(code = %release.code(), "outbound release approved");
        Ok(release)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        release_id: DocumentId,
        reason: impl Into<String>,
    ) -> DomainResult<OutboundRelease> {
        let gate = &self.gate;
        let reason = reason.into();
        let release = self.releases.update(release_id, |release| {
            gate.can_approve(actor, &*release, &permissions::RELEASE_REJECT)
                .map_err(|e| Self::deny(release, &e))?;
            let events = release.handle(&OutboundReleaseCommand::Reject(Reject {
                release_id,
                rejected_by: actor.user_id,
                reason: reason.clone(),
                occurred_at: Utc::now(),
            }))?;
            for event in &events {
                release.apply(event);
            }
            Ok(release.clone())
        })?;
        info!(code = %release.code(), "outbound release rejected");
        Ok(release)
    }

    /// Release stock, all-or-nothing across lines. The gate's segregation
    /// rule applies (approver may not also release), then every nonzero line
    /// becomes one outbound movement in a single ledger batch: a single
    /// line's insufficient stock aborts the whole release with zero entries,
    /// and the header reaches `Released` only after the batch committed.
    pub fn release(
        &self,
        actor: &Actor,
        release_id: DocumentId,
        lines: Vec<ReleaseInput>,
    ) -> DomainResult<ReleaseOutcome> {
        let gate = &self.gate;
        let ledger = &self.ledger;
        let now = Utc::now();

        let outcome = self.releases.update(release_id, |release| {
            gate.can_release(actor, &*release, &permissions::RELEASE_STOCK)
                .map_err(|e| Self::deny(release, &e))?;

            let events = release.handle(&OutboundReleaseCommand::Release(Release {
                release_id,
                released_by: actor.user_id,
                lines: lines.clone(),
                occurred_at: now,
            }))?;
            let OutboundReleaseEvent::StockReleased { lines: released, .. } = &events[0] else {
                return Err(DomainError::conflict("release produced an unexpected event"));
            };

            let reference = DocumentRef::new(
                release.document_type(),
                release.document_id(),
                release.code().clone(),
            );
            let movements: Vec<Movement> = released
                .iter()
                .filter(|l| l.released_qty > 0)
                .map(|l| {
                    Movement::new(
                        l.item_id,
                        MovementKind::Outbound,
                        reference.clone(),
                        -l.released_qty,
                    )
                })
                .collect();

            let ledger_entries = ledger.append_batch(movements, now)?;

            for event in &events {
                release.apply(event);
            }
            Ok(ReleaseOutcome {
                release: release.clone(),
                ledger_entries,
            })
        })?;

        info!(
            code = %outcome.release.code(),
            entries = outcome.ledger_entries.len(),
            "stock released"
        );
        Ok(outcome)
    }

    fn deny(release: &OutboundRelease, err: &kardex_approval::GateError) -> DomainError {
        warn!(code = %release.code(), %err, "outbound release transition denied");
        DomainError::PermissionDenied(err.to_string())
    }
}
