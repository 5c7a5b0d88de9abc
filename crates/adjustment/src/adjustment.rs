use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{
    Aggregate, AggregateRoot, Approvable, Document, DocumentCode, DocumentId, DocumentType,
    DomainError, ItemId, UserId,
};

/// Stock adjustment status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAdjustmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl StockAdjustmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAdjustmentStatus::Pending => "pending",
            StockAdjustmentStatus::Approved => "approved",
            StockAdjustmentStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

/// How a line states its correction: a target real quantity, or a signed
/// delta with an explicit direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMethod {
    RealQty { qty_input: i64 },
    DeltaQty { direction: AdjustmentDirection, qty: i64 },
}

/// Stock adjustment line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub method: AdjustmentMethod,
    /// System quantity snapshot taken at creation. A point-in-time copy:
    /// live stock may drift before approval, and approval validates against
    /// the live value, not this field.
    pub qty_system: i64,
    pub note: Option<String>,
}

impl AdjustmentLine {
    /// Signed variance this line wants applied to stock.
    ///
    /// `RealQty` variance is relative to the creation-time snapshot; the
    /// approval path re-validates the resulting quantity against live stock,
    /// which may have drifted since.
    pub fn variance(&self) -> i64 {
        match self.method {
            AdjustmentMethod::RealQty { qty_input } => qty_input - self.qty_system,
            AdjustmentMethod::DeltaQty {
                direction: AdjustmentDirection::Increase,
                qty,
            } => qty,
            AdjustmentMethod::DeltaQty {
                direction: AdjustmentDirection::Decrease,
                qty,
            } => -qty,
        }
    }
}

/// Line input at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentInput {
    pub item_id: ItemId,
    pub method: AdjustmentMethod,
    /// Live stock read by the caller at submission time.
    pub qty_system: i64,
    pub note: Option<String>,
}

/// Per-line variance recorded on the approval event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub qty_system: i64,
    pub variance: i64,
}

/// Aggregate root: StockAdjustment.
///
/// One header batches many item-level corrections (damage, write-off,
/// opname result). Approval is the stock-mutating transition; rejection
/// records the decision only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    id: DocumentId,
    code: DocumentCode,
    status: StockAdjustmentStatus,
    created_by: UserId,
    lines: Vec<AdjustmentLine>,
    note: Option<String>,

    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,

    version: u64,
    created: bool,
}

impl StockAdjustment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            code: DocumentCode::new(""),
            status: StockAdjustmentStatus::Pending,
            created_by: UserId::nil(),
            lines: Vec::new(),
            note: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> StockAdjustmentStatus {
        self.status
    }

    pub fn lines(&self) -> &[AdjustmentLine] {
        &self.lines
    }
}

impl AggregateRoot for StockAdjustment {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Document for StockAdjustment {
    fn document_id(&self) -> DocumentId {
        self.id
    }

    fn document_type(&self) -> DocumentType {
        DocumentType::StockAdjustment
    }

    fn code(&self) -> &DocumentCode {
        &self.code
    }

    fn created_by(&self) -> UserId {
        self.created_by
    }
}

impl Approvable for StockAdjustment {
    fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }
}

/// Command: CreateAdjustment. Lines carry the system-quantity snapshot
/// read at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAdjustment {
    pub adjustment_id: DocumentId,
    pub code: DocumentCode,
    pub created_by: UserId,
    pub lines: Vec<AdjustmentInput>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve — the stock-mutating transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub adjustment_id: DocumentId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject — records the decision, performs no stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub adjustment_id: DocumentId,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockAdjustmentCommand {
    CreateAdjustment(CreateAdjustment),
    Approve(Approve),
    Reject(Reject),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockAdjustmentEvent {
    AdjustmentCreated {
        adjustment_id: DocumentId,
        code: DocumentCode,
        created_by: UserId,
        lines: Vec<AdjustmentInput>,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    AdjustmentApproved {
        adjustment_id: DocumentId,
        approved_by: UserId,
        /// Variances as decided at approval; the ledger batch re-validates
        /// them against live stock inside its own critical section.
        variances: Vec<VarianceLine>,
        occurred_at: DateTime<Utc>,
    },
    AdjustmentRejected {
        adjustment_id: DocumentId,
        rejected_by: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for StockAdjustment {
    type Command = StockAdjustmentCommand;
    type Event = StockAdjustmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockAdjustmentEvent::AdjustmentCreated {
                adjustment_id,
                code,
                created_by,
                lines,
                note,
                ..
            } => {
                self.id = *adjustment_id;
                self.code = code.clone();
                self.created_by = *created_by;
                self.note = note.clone();
                self.status = StockAdjustmentStatus::Pending;
                self.lines = lines
                    .iter()
                    .enumerate()
                    .map(|(i, input)| AdjustmentLine {
                        line_no: (i as u32) + 1,
                        item_id: input.item_id,
                        method: input.method,
                        qty_system: input.qty_system,
                        note: input.note.clone(),
                    })
                    .collect();
                self.created = true;
            }
            StockAdjustmentEvent::AdjustmentApproved {
                approved_by,
                occurred_at,
                ..
            } => {
                self.status = StockAdjustmentStatus::Approved;
                self.approved_by = Some(*approved_by);
                self.approved_at = Some(*occurred_at);
            }
            StockAdjustmentEvent::AdjustmentRejected {
                rejected_by,
                reason,
                occurred_at,
                ..
            } => {
                self.status = StockAdjustmentStatus::Rejected;
                self.rejected_by = Some(*rejected_by);
                self.rejected_at = Some(*occurred_at);
                self.rejection_reason = Some(reason.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockAdjustmentCommand::CreateAdjustment(cmd) => self.handle_create(cmd),
            StockAdjustmentCommand::Approve(cmd) => self.handle_approve(cmd),
            StockAdjustmentCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl StockAdjustment {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_adjustment_id(&self, adjustment_id: DocumentId) -> Result<(), DomainError> {
        if self.id != adjustment_id {
            return Err(DomainError::conflict("adjustment_id mismatch"));
        }
        Ok(())
    }

    fn ensure_pending(&self, to: StockAdjustmentStatus) -> Result<(), DomainError> {
        if self.status != StockAdjustmentStatus::Pending {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                to.as_str(),
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateAdjustment) -> Result<Vec<StockAdjustmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stock adjustment already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "stock adjustment must have at least one line",
            ));
        }
        for input in &cmd.lines {
            if input.qty_system < 0 {
                return Err(DomainError::quantity("system quantity cannot be negative"));
            }
            match input.method {
                AdjustmentMethod::RealQty { qty_input } if qty_input < 0 => {
                    return Err(DomainError::quantity("real quantity cannot be negative"));
                }
                AdjustmentMethod::DeltaQty { qty, .. } if qty <= 0 => {
                    return Err(DomainError::quantity("delta quantity must be positive"));
                }
                _ => {}
            }
        }

        Ok(vec![StockAdjustmentEvent::AdjustmentCreated {
            adjustment_id: cmd.adjustment_id,
            code: cmd.code.clone(),
            created_by: cmd.created_by,
            lines: cmd.lines.clone(),
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<StockAdjustmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_adjustment_id(cmd.adjustment_id)?;
        self.ensure_pending(StockAdjustmentStatus::Approved)?;

        let variances = self
            .lines
            .iter()
            .map(|line| VarianceLine {
                line_no: line.line_no,
                item_id: line.item_id,
                qty_system: line.qty_system,
                variance: line.variance(),
            })
            .collect();

        Ok(vec![StockAdjustmentEvent::AdjustmentApproved {
            adjustment_id: cmd.adjustment_id,
            approved_by: cmd.approved_by,
            variances,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<StockAdjustmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_adjustment_id(cmd.adjustment_id)?;
        self.ensure_pending(StockAdjustmentStatus::Rejected)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection reason is required"));
        }

        Ok(vec![StockAdjustmentEvent::AdjustmentRejected {
            adjustment_id: cmd.adjustment_id,
            rejected_by: cmd.rejected_by,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }
}
