use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{
    Aggregate, AggregateRoot, Approvable, Document, DocumentCode, DocumentId, DocumentType,
    DomainError, ItemId, UserId, VendorId,
};

/// Vendor return status lifecycle.
///
/// `Completed` means goods physically left (stock decremented).
/// `ClosedKeptItems` is the explicit inverse resolution for a return the
/// vendor later declined: goods come back and stock is incremented by a new
/// movement — a distinct transition, not an undo of `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorReturnStatus {
    Draft,
    PendingApproval,
    Approved,
    SentToVendor,
    Completed,
    ClosedKeptItems,
    Rejected,
}

impl VendorReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorReturnStatus::Draft => "draft",
            VendorReturnStatus::PendingApproval => "pending_approval",
            VendorReturnStatus::Approved => "approved",
            VendorReturnStatus::SentToVendor => "sent_to_vendor",
            VendorReturnStatus::Completed => "completed",
            VendorReturnStatus::ClosedKeptItems => "closed_kept_items",
            VendorReturnStatus::Rejected => "rejected",
        }
    }
}

/// Vendor return line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub quantity: i64,
}

/// Aggregate root: VendorReturn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorReturn {
    id: DocumentId,
    code: DocumentCode,
    vendor_id: Option<VendorId>,
    status: VendorReturnStatus,
    created_by: UserId,
    lines: Vec<ReturnLine>,
    note: Option<String>,

    submitted_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    completed_by: Option<UserId>,
    completed_at: Option<DateTime<Utc>>,
    kept_at: Option<DateTime<Utc>>,

    version: u64,
    created: bool,
}

impl VendorReturn {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            code: DocumentCode::new(""),
            vendor_id: None,
            status: VendorReturnStatus::Draft,
            created_by: UserId::nil(),
            lines: Vec::new(),
            note: None,
            submitted_at: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            sent_at: None,
            completed_by: None,
            completed_at: None,
            kept_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> VendorReturnStatus {
        self.status
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn lines(&self) -> &[ReturnLine] {
        &self.lines
    }
}

impl AggregateRoot for VendorReturn {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Document for VendorReturn {
    fn document_id(&self) -> DocumentId {
        self.id
    }

    fn document_type(&self) -> DocumentType {
        DocumentType::VendorReturn
    }

    fn code(&self) -> &DocumentCode {
        &self.code
    }

    fn created_by(&self) -> UserId {
        self.created_by
    }
}

impl Approvable for VendorReturn {
    fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }
}

/// Command: CreateReturn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReturn {
    pub return_id: DocumentId,
    pub code: DocumentCode,
    pub vendor_id: VendorId,
    pub created_by: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub return_id: DocumentId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Submit for approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub return_id: DocumentId,
    pub submitted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub return_id: DocumentId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject (pre-approval only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub return_id: DocumentId,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSent — goods handed to the carrier, stock untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSent {
    pub return_id: DocumentId,
    pub sent_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Complete — the stock-mutating transition (goods left for good).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complete {
    pub return_id: DocumentId,
    pub completed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: KeepItems — the vendor declined the return; goods come back and
/// stock is incremented by a new inbound-style movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepItems {
    pub return_id: DocumentId,
    pub kept_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorReturnCommand {
    CreateReturn(CreateReturn),
    AddLine(AddLine),
    Submit(Submit),
    Approve(Approve),
    Reject(Reject),
    MarkSent(MarkSent),
    Complete(Complete),
    KeepItems(KeepItems),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorReturnEvent {
    ReturnCreated {
        return_id: DocumentId,
        code: DocumentCode,
        vendor_id: VendorId,
        created_by: UserId,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    LineAdded {
        return_id: DocumentId,
        line_no: u32,
        item_id: ItemId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    ReturnSubmitted {
        return_id: DocumentId,
        submitted_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReturnApproved {
        return_id: DocumentId,
        approved_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReturnRejected {
        return_id: DocumentId,
        rejected_by: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    ReturnSent {
        return_id: DocumentId,
        sent_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReturnCompleted {
        return_id: DocumentId,
        completed_by: UserId,
        lines: Vec<ReturnLine>,
        occurred_at: DateTime<Utc>,
    },
    ItemsKept {
        return_id: DocumentId,
        kept_by: UserId,
        lines: Vec<ReturnLine>,
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for VendorReturn {
    type Command = VendorReturnCommand;
    type Event = VendorReturnEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VendorReturnEvent::ReturnCreated {
                return_id,
                code,
                vendor_id,
                created_by,
                note,
                ..
            } => {
                self.id = *return_id;
                self.code = code.clone();
                self.vendor_id = Some(*vendor_id);
                self.created_by = *created_by;
                self.note = note.clone();
                self.status = VendorReturnStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            VendorReturnEvent::LineAdded {
                line_no,
                item_id,
                quantity,
                ..
            } => {
                self.lines.push(ReturnLine {
                    line_no: *line_no,
                    item_id: *item_id,
                    quantity: *quantity,
                });
            }
            VendorReturnEvent::ReturnSubmitted { occurred_at, .. } => {
                self.status = VendorReturnStatus::PendingApproval;
                self.submitted_at = Some(*occurred_at);
            }
            VendorReturnEvent::ReturnApproved {
                approved_by,
                occurred_at,
                ..
            } => {
                self.status = VendorReturnStatus::Approved;
                self.approved_by = Some(*approved_by);
                self.approved_at = Some(*occurred_at);
            }
            VendorReturnEvent::ReturnRejected {
                rejected_by,
                reason,
                occurred_at,
                ..
            } => {
                self.status = VendorReturnStatus::Rejected;
                self.rejected_by = Some(*rejected_by);
                self.rejected_at = Some(*occurred_at);
                self.rejection_reason = Some(reason.clone());
            }
            VendorReturnEvent::ReturnSent { occurred_at, .. } => {
                self.status = VendorReturnStatus::SentToVendor;
                self.sent_at = Some(*occurred_at);
            }
            VendorReturnEvent::ReturnCompleted {
                completed_by,
                occurred_at,
                ..
            } => {
                self.status = VendorReturnStatus::Completed;
                self.completed_by = Some(*completed_by);
                self.completed_at = Some(*occurred_at);
            }
            VendorReturnEvent::ItemsKept { occurred_at, .. } => {
                self.status = VendorReturnStatus::ClosedKeptItems;
                self.kept_at = Some(*occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VendorReturnCommand::CreateReturn(cmd) => self.handle_create(cmd),
            VendorReturnCommand::AddLine(cmd) => self.handle_add_line(cmd),
            VendorReturnCommand::Submit(cmd) => self.handle_submit(cmd),
            VendorReturnCommand::Approve(cmd) => self.handle_approve(cmd),
            VendorReturnCommand::Reject(cmd) => self.handle_reject(cmd),
            VendorReturnCommand::MarkSent(cmd) => self.handle_mark_sent(cmd),
            VendorReturnCommand::Complete(cmd) => self.handle_complete(cmd),
            VendorReturnCommand::KeepItems(cmd) => self.handle_keep_items(cmd),
        }
    }
}

impl VendorReturn {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_return_id(&self, return_id: DocumentId) -> Result<(), DomainError> {
        if self.id != return_id {
            return Err(DomainError::conflict("return_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(
        &self,
        expected: VendorReturnStatus,
        to: VendorReturnStatus,
    ) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                to.as_str(),
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateReturn) -> Result<Vec<VendorReturnEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("vendor return already exists"));
        }

        Ok(vec![VendorReturnEvent::ReturnCreated {
            return_id: cmd.return_id,
            code: cmd.code.clone(),
            vendor_id: cmd.vendor_id,
            created_by: cmd.created_by,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<VendorReturnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_return_id(cmd.return_id)?;

        if self.status != VendorReturnStatus::Draft {
            return Err(DomainError::validation(
                "lines can only be added while the return is a draft",
            ));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::quantity("return quantity must be positive"));
        }

        let next_line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        Ok(vec![VendorReturnEvent::LineAdded {
            return_id: cmd.return_id,
            line_no: next_line_no,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_submit(&self, cmd: &Submit) -> Result<Vec<VendorReturnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_return_id(cmd.return_id)?;
        self.ensure_status(VendorReturnStatus::Draft, VendorReturnStatus::PendingApproval)?;

        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot submit a return without lines"));
        }

        Ok(vec![VendorReturnEvent::ReturnSubmitted {
            return_id: cmd.return_id,
            submitted_by: cmd.submitted_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<VendorReturnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_return_id(cmd.return_id)?;
        self.ensure_status(VendorReturnStatus::PendingApproval, VendorReturnStatus::Approved)?;

        Ok(vec![VendorReturnEvent::ReturnApproved {
            return_id: cmd.return_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<VendorReturnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_return_id(cmd.return_id)?;

        let allowed = matches!(
            self.status,
            VendorReturnStatus::Draft | VendorReturnStatus::PendingApproval
        );
        if !allowed {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                VendorReturnStatus::Rejected.as_str(),
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection reason is required"));
        }

        Ok(vec![VendorReturnEvent::ReturnRejected {
            return_id: cmd.return_id,
            rejected_by: cmd.rejected_by,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_mark_sent(&self, cmd: &MarkSent) -> Result<Vec<VendorReturnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_return_id(cmd.return_id)?;
        self.ensure_status(VendorReturnStatus::Approved, VendorReturnStatus::SentToVendor)?;

        Ok(vec![VendorReturnEvent::ReturnSent {
            return_id: cmd.return_id,
            sent_by: cmd.sent_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_complete(&self, cmd: &Complete) -> Result<Vec<VendorReturnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_return_id(cmd.return_id)?;
        self.ensure_status(VendorReturnStatus::SentToVendor, VendorReturnStatus::Completed)?;

        Ok(vec![VendorReturnEvent::ReturnCompleted {
            return_id: cmd.return_id,
            completed_by: cmd.completed_by,
            lines: self.lines.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_keep_items(&self, cmd: &KeepItems) -> Result<Vec<VendorReturnEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_return_id(cmd.return_id)?;
        self.ensure_status(VendorReturnStatus::Completed, VendorReturnStatus::ClosedKeptItems)?;

        Ok(vec![VendorReturnEvent::ItemsKept {
            return_id: cmd.return_id,
            kept_by: cmd.kept_by,
            lines: self.lines.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }
}
