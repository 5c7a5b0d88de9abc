use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{
    Aggregate, AggregateRoot, Document, DocumentCode, DocumentId, DocumentType, DomainError,
    ItemId, UserId,
};

/// Inbound receipt status lifecycle.
///
/// `Partial` means at least one line carries a discrepancy; the discrepancies
/// themselves are tracked and resolved per line, independently of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundReceiptStatus {
    PendingVerification,
    Completed,
    Partial,
}

impl InboundReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundReceiptStatus::PendingVerification => "pending_verification",
            InboundReceiptStatus::Completed => "completed",
            InboundReceiptStatus::Partial => "partial",
        }
    }
}

/// Why goods on a line were rejected. Explicit operator choice, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    WrongItem,
    Damaged,
}

/// Per-line mismatch between expected and received/rejected quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    Shortage,
    Overage,
    WrongItem,
    Damaged,
}

/// How an open discrepancy was closed out.
///
/// Resolution is bookkeeping only: original ledger entries are never edited,
/// and any stock correction is a separate additive movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyResolution {
    CloseShort,
    AwaitRemainder,
    AcceptAsIs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    Open,
    Resolved(DiscrepancyResolution),
}

/// An open issue attached to a verified line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub status: DiscrepancyStatus,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Inbound receipt line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub expected_qty: i64,
    pub received_qty: i64,
    pub accepted_qty: i64,
    pub rejected_qty: i64,
    pub rejection_reason: Option<RejectionReason>,
    pub discrepancy: Option<Discrepancy>,
}

/// Expected line supplied at creation (from PO issuance, before arrival).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedLine {
    pub item_id: ItemId,
    pub expected_qty: i64,
}

/// Verifier input for one line of the bulk verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyLine {
    pub line_no: u32,
    pub received_qty: i64,
    pub accepted_qty: i64,
    pub rejected_qty: i64,
    pub rejection_reason: Option<RejectionReason>,
}

/// Verification result for one line, as recorded on the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub expected_qty: i64,
    pub received_qty: i64,
    pub accepted_qty: i64,
    pub rejected_qty: i64,
    pub rejection_reason: Option<RejectionReason>,
    pub discrepancy: Option<DiscrepancyKind>,
}

/// Aggregate root: InboundReceipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReceipt {
    id: DocumentId,
    code: DocumentCode,
    status: InboundReceiptStatus,
    created_by: UserId,
    /// Purchase request this receipt was opened from, if any.
    source_request: Option<DocumentId>,
    lines: Vec<ReceiptLine>,
    verified_by: Option<UserId>,
    verified_at: Option<DateTime<Utc>>,
    note: Option<String>,
    version: u64,
    created: bool,
}

impl InboundReceipt {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            code: DocumentCode::new(""),
            status: InboundReceiptStatus::PendingVerification,
            created_by: UserId::nil(),
            source_request: None,
            lines: Vec::new(),
            verified_by: None,
            verified_at: None,
            note: None,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> InboundReceiptStatus {
        self.status
    }

    pub fn lines(&self) -> &[ReceiptLine] {
        &self.lines
    }

    pub fn source_request(&self) -> Option<DocumentId> {
        self.source_request
    }

    pub fn verified_by(&self) -> Option<UserId> {
        self.verified_by
    }

    /// Lines whose discrepancy is still open.
    pub fn open_discrepancies(&self) -> Vec<&ReceiptLine> {
        self.lines
            .iter()
            .filter(|l| {
                matches!(
                    l.discrepancy,
                    Some(Discrepancy {
                        status: DiscrepancyStatus::Open,
                        ..
                    })
                )
            })
            .collect()
    }
}

impl AggregateRoot for InboundReceipt {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Document for InboundReceipt {
    fn document_id(&self) -> DocumentId {
        self.id
    }

    fn document_type(&self) -> DocumentType {
        DocumentType::InboundReceipt
    }

    fn code(&self) -> &DocumentCode {
        &self.code
    }

    fn created_by(&self) -> UserId {
        self.created_by
    }
}

/// Command: CreateReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReceipt {
    pub receipt_id: DocumentId,
    pub code: DocumentCode,
    pub created_by: UserId,
    pub source_request: Option<DocumentId>,
    pub lines: Vec<ExpectedLine>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Verify — one bulk transition covering every line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verify {
    pub receipt_id: DocumentId,
    pub verified_by: UserId,
    pub lines: Vec<VerifyLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResolveDiscrepancy — closes one open line issue; never touches
/// stock or earlier ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveDiscrepancy {
    pub receipt_id: DocumentId,
    pub line_no: u32,
    pub resolution: DiscrepancyResolution,
    pub resolved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundReceiptCommand {
    CreateReceipt(CreateReceipt),
    Verify(Verify),
    ResolveDiscrepancy(ResolveDiscrepancy),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundReceiptEvent {
    ReceiptCreated {
        receipt_id: DocumentId,
        code: DocumentCode,
        created_by: UserId,
        source_request: Option<DocumentId>,
        lines: Vec<ExpectedLine>,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    ReceiptVerified {
        receipt_id: DocumentId,
        verified_by: UserId,
        results: Vec<VerifiedLine>,
        completed: bool,
        occurred_at: DateTime<Utc>,
    },
    DiscrepancyResolved {
        receipt_id: DocumentId,
        line_no: u32,
        resolution: DiscrepancyResolution,
        resolved_by: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for InboundReceipt {
    type Command = InboundReceiptCommand;
    type Event = InboundReceiptEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InboundReceiptEvent::ReceiptCreated {
                receipt_id,
                code,
                created_by,
                source_request,
                lines,
                note,
                ..
            } => {
                self.id = *receipt_id;
                self.code = code.clone();
                self.created_by = *created_by;
                self.source_request = *source_request;
                self.note = note.clone();
                self.status = InboundReceiptStatus::PendingVerification;
                self.lines = lines
                    .iter()
                    .enumerate()
                    .map(|(i, l)| ReceiptLine {
                        line_no: (i as u32) + 1,
                        item_id: l.item_id,
                        expected_qty: l.expected_qty,
                        received_qty: 0,
                        accepted_qty: 0,
                        rejected_qty: 0,
                        rejection_reason: None,
                        discrepancy: None,
                    })
                    .collect();
                self.created = true;
            }
            InboundReceiptEvent::ReceiptVerified {
                verified_by,
                results,
                completed,
                occurred_at,
                ..
            } => {
                for result in results {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == result.line_no)
                    {
                        line.received_qty = result.received_qty;
                        line.accepted_qty = result.accepted_qty;
                        line.rejected_qty = result.rejected_qty;
                        line.rejection_reason = result.rejection_reason;
                        line.discrepancy = result.discrepancy.map(|kind| Discrepancy {
                            kind,
                            status: DiscrepancyStatus::Open,
                            resolved_by: None,
                            resolved_at: None,
                        });
                    }
                }
                self.status = if *completed {
                    InboundReceiptStatus::Completed
                } else {
                    InboundReceiptStatus::Partial
                };
                self.verified_by = Some(*verified_by);
                self.verified_at = Some(*occurred_at);
            }
            InboundReceiptEvent::DiscrepancyResolved {
                line_no,
                resolution,
                resolved_by,
                occurred_at,
                ..
            } => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == *line_no) {
                    if let Some(discrepancy) = line.discrepancy.as_mut() {
                        discrepancy.status = DiscrepancyStatus::Resolved(*resolution);
                        discrepancy.resolved_by = Some(*resolved_by);
                        discrepancy.resolved_at = Some(*occurred_at);
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InboundReceiptCommand::CreateReceipt(cmd) => self.handle_create(cmd),
            InboundReceiptCommand::Verify(cmd) => self.handle_verify(cmd),
            InboundReceiptCommand::ResolveDiscrepancy(cmd) => self.handle_resolve(cmd),
        }
    }
}

impl InboundReceipt {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_receipt_id(&self, receipt_id: DocumentId) -> Result<(), DomainError> {
        if self.id != receipt_id {
            return Err(DomainError::conflict("receipt_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateReceipt) -> Result<Vec<InboundReceiptEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("inbound receipt already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "inbound receipt must have at least one expected line",
            ));
        }
        for line in &cmd.lines {
            if line.expected_qty <= 0 {
                return Err(DomainError::quantity("expected quantity must be positive"));
            }
        }

        Ok(vec![InboundReceiptEvent::ReceiptCreated {
            receipt_id: cmd.receipt_id,
            code: cmd.code.clone(),
            created_by: cmd.created_by,
            source_request: cmd.source_request,
            lines: cmd.lines.clone(),
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    /// Classify one verified line, in the order the business rules state:
    /// quantity mismatches first, then rejected goods.
    fn classify(
        expected: i64,
        received: i64,
        rejected: i64,
        reason: Option<RejectionReason>,
    ) -> Option<DiscrepancyKind> {
        if received < expected {
            Some(DiscrepancyKind::Shortage)
        } else if received > expected {
            Some(DiscrepancyKind::Overage)
        } else if rejected > 0 {
            // rejected > 0 implies a reason was supplied (validated upstream).
            match reason {
                Some(RejectionReason::WrongItem) => Some(DiscrepancyKind::WrongItem),
                _ => Some(DiscrepancyKind::Damaged),
            }
        } else {
            None
        }
    }

    fn handle_verify(&self, cmd: &Verify) -> Result<Vec<InboundReceiptEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_receipt_id(cmd.receipt_id)?;

        if self.status != InboundReceiptStatus::PendingVerification {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                InboundReceiptStatus::Completed.as_str(),
            ));
        }
        if cmd.lines.len() != self.lines.len() {
            return Err(DomainError::validation(format!(
                "verification must cover every line: got {}, receipt has {}",
                cmd.lines.len(),
                self.lines.len()
            )));
        }

        let mut results = Vec::with_capacity(cmd.lines.len());
        for input in &cmd.lines {
            let line = self
                .lines
                .iter()
                .find(|l| l.line_no == input.line_no)
                .ok_or(DomainError::NotFound)?;
            if results
                .iter()
                .any(|r: &VerifiedLine| r.line_no == input.line_no)
            {
                return Err(DomainError::validation(format!(
                    "line {} verified twice",
                    input.line_no
                )));
            }

            if input.received_qty < 0 || input.accepted_qty < 0 || input.rejected_qty < 0 {
                return Err(DomainError::quantity("verified quantities cannot be negative"));
            }
            if input.accepted_qty + input.rejected_qty != input.received_qty {
                return Err(DomainError::quantity(format!(
                    "line {}: accepted + rejected must equal received",
                    input.line_no
                )));
            }
            if input.rejected_qty > 0 && input.rejection_reason.is_none() {
                return Err(DomainError::validation(format!(
                    "line {}: a rejection reason is required when goods are rejected",
                    input.line_no
                )));
            }

            let discrepancy = Self::classify(
                line.expected_qty,
                input.received_qty,
                input.rejected_qty,
                input.rejection_reason,
            );
            results.push(VerifiedLine {
                line_no: input.line_no,
                item_id: line.item_id,
                expected_qty: line.expected_qty,
                received_qty: input.received_qty,
                accepted_qty: input.accepted_qty,
                rejected_qty: input.rejected_qty,
                rejection_reason: input.rejection_reason,
                discrepancy,
            });
        }

        let completed = results.iter().all(|r| r.discrepancy.is_none());
        Ok(vec![InboundReceiptEvent::ReceiptVerified {
            receipt_id: cmd.receipt_id,
            verified_by: cmd.verified_by,
            results,
            completed,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_resolve(
        &self,
        cmd: &ResolveDiscrepancy,
    ) -> Result<Vec<InboundReceiptEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_receipt_id(cmd.receipt_id)?;

        let line = self
            .lines
            .iter()
            .find(|l| l.line_no == cmd.line_no)
            .ok_or(DomainError::NotFound)?;
        match &line.discrepancy {
            Some(d) if d.status == DiscrepancyStatus::Open => {}
            Some(_) => {
                return Err(DomainError::conflict(format!(
                    "line {} discrepancy already resolved",
                    cmd.line_no
                )));
            }
            None => {
                return Err(DomainError::validation(format!(
                    "line {} has no discrepancy to resolve",
                    cmd.line_no
                )));
            }
        }

        Ok(vec![InboundReceiptEvent::DiscrepancyResolved {
            receipt_id: cmd.receipt_id,
            line_no: cmd.line_no,
            resolution: cmd.resolution,
            resolved_by: cmd.resolved_by,
            occurred_at: cmd.occurred_at,
        }])
    }
}
