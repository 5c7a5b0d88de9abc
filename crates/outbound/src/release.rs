use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{
    Aggregate, AggregateRoot, Approvable, Document, DocumentCode, DocumentId, DocumentType,
    DomainError, ItemId, Releasable, UserId,
};

/// Outbound release status lifecycle.
///
/// `Rejected` is reachable from `Draft` and `Approved` only. Once stock has
/// left (`Released`), a rejection must be modeled as a new reversing
/// movement, never as an undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundReleaseStatus {
    Draft,
    Approved,
    Released,
    Rejected,
}

impl OutboundReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundReleaseStatus::Draft => "draft",
            OutboundReleaseStatus::Approved => "approved",
            OutboundReleaseStatus::Released => "released",
            OutboundReleaseStatus::Rejected => "rejected",
        }
    }
}

/// Outbound release line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub requested_qty: i64,
    pub released_qty: i64,
}

/// Releaser input for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInput {
    pub line_no: u32,
    pub released_qty: i64,
}

/// One line as released, recorded on the event for the ledger batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub requested_qty: i64,
    pub released_qty: i64,
}

/// Aggregate root: OutboundRelease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRelease {
    id: DocumentId,
    code: DocumentCode,
    status: OutboundReleaseStatus,
    created_by: UserId,
    lines: Vec<ReleaseLine>,
    note: Option<String>,

    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    released_by: Option<UserId>,
    released_at: Option<DateTime<Utc>>,

    version: u64,
    created: bool,
}

impl OutboundRelease {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            code: DocumentCode::new(""),
            status: OutboundReleaseStatus::Draft,
            created_by: UserId::nil(),
            lines: Vec::new(),
            note: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            released_by: None,
            released_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> OutboundReleaseStatus {
        self.status
    }

    pub fn lines(&self) -> &[ReleaseLine] {
        &self.lines
    }
}

impl AggregateRoot for OutboundRelease {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Document for OutboundRelease {
    fn document_id(&self) -> DocumentId {
        self.id
    }

    fn document_type(&self) -> DocumentType {
        DocumentType::OutboundRelease
    }

    fn code(&self) -> &DocumentCode {
        &self.code
    }

    fn created_by(&self) -> UserId {
        self.created_by
    }
}

impl Approvable for OutboundRelease {
    fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }
}

impl Releasable for OutboundRelease {
    fn released_by(&self) -> Option<UserId> {
        self.released_by
    }
}

/// Command: CreateRelease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRelease {
    pub release_id: DocumentId,
    pub code: DocumentCode,
    pub created_by: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub release_id: DocumentId,
    pub item_id: ItemId,
    pub requested_qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub release_id: DocumentId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject (from Draft or Approved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub release_id: DocumentId,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Release.
///
/// Lines omitted from the input release zero. The emitted event carries the
/// released quantities; the stock check itself happens in the ledger's
/// atomic batch append, which the orchestration runs before applying this
/// event — the header reaches `Released` only after every line succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub release_id: DocumentId,
    pub released_by: UserId,
    pub lines: Vec<ReleaseInput>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundReleaseCommand {
    CreateRelease(CreateRelease),
    AddLine(AddLine),
    Approve(Approve),
    Reject(Reject),
    Release(Release),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundReleaseEvent {
    ReleaseCreated {
        release_id: DocumentId,
        code: DocumentCode,
        created_by: UserId,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    LineAdded {
        release_id: DocumentId,
        line_no: u32,
        item_id: ItemId,
        requested_qty: i64,
        occurred_at: DateTime<Utc>,
    },
    ReleaseApproved {
        release_id: DocumentId,
        approved_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ReleaseRejected {
        release_id: DocumentId,
        rejected_by: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    StockReleased {
        release_id: DocumentId,
        released_by: UserId,
        lines: Vec<ReleasedLine>,
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for OutboundRelease {
    type Command = OutboundReleaseCommand;
    type Event = OutboundReleaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OutboundReleaseEvent::ReleaseCreated {
                release_id,
                code,
                created_by,
                note,
                ..
            } => {
                self.id = *release_id;
                self.code = code.clone();
                self.created_by = *created_by;
                self.note = note.clone();
                self.status = OutboundReleaseStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            OutboundReleaseEvent::LineAdded {
                line_no,
                item_id,
                requested_qty,
                ..
            } => {
                self.lines.push(ReleaseLine {
                    line_no: *line_no,
                    item_id: *item_id,
                    requested_qty: *requested_qty,
                    released_qty: 0,
                });
            }
            OutboundReleaseEvent::ReleaseApproved {
                approved_by,
                occurred_at,
                ..
            } => {
                self.status = OutboundReleaseStatus::Approved;
                self.approved_by = Some(*approved_by);
                self.approved_at = Some(*occurred_at);
            }
            OutboundReleaseEvent::ReleaseRejected {
                rejected_by,
                reason,
                occurred_at,
                ..
            } => {
                self.status = OutboundReleaseStatus::Rejected;
                self.rejected_by = Some(*rejected_by);
                self.rejected_at = Some(*occurred_at);
                self.rejection_reason = Some(reason.clone());
            }
            OutboundReleaseEvent::StockReleased {
                released_by,
                lines,
                occurred_at,
                ..
            } => {
                for released in lines {
                    if let Some(line) =
                        self.lines.iter_mut().find(|l| l.line_no == released.line_no)
                    {
                        line.released_qty = released.released_qty;
                    }
                }
                self.status = OutboundReleaseStatus::Released;
                self.released_by = Some(*released_by);
                self.released_at = Some(*occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OutboundReleaseCommand::CreateRelease(cmd) => self.handle_create(cmd),
            OutboundReleaseCommand::AddLine(cmd) => self.handle_add_line(cmd),
            OutboundReleaseCommand::Approve(cmd) => self.handle_approve(cmd),
            OutboundReleaseCommand::Reject(cmd) => self.handle_reject(cmd),
            OutboundReleaseCommand::Release(cmd) => self.handle_release(cmd),
        }
    }
}

impl OutboundRelease {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_release_id(&self, release_id: DocumentId) -> Result<(), DomainError> {
        if self.id != release_id {
            return Err(DomainError::conflict("release_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRelease) -> Result<Vec<OutboundReleaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("outbound release already exists"));
        }

        Ok(vec![OutboundReleaseEvent::ReleaseCreated {
            release_id: cmd.release_id,
            code: cmd.code.clone(),
            created_by: cmd.created_by,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<OutboundReleaseEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_release_id(cmd.release_id)?;

        if self.status != OutboundReleaseStatus::Draft {
            return Err(DomainError::validation(
                "lines can only be added while the release is a draft",
            ));
        }
        if cmd.requested_qty <= 0 {
            return Err(DomainError::quantity("requested quantity must be positive"));
        }

        let next_line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        Ok(vec![OutboundReleaseEvent::LineAdded {
            release_id: cmd.release_id,
            line_no: next_line_no,
            item_id: cmd.item_id,
            requested_qty: cmd.requested_qty,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<OutboundReleaseEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_release_id(cmd.release_id)?;

        if self.status != OutboundReleaseStatus::Draft {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                OutboundReleaseStatus::Approved.as_str(),
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot approve a release without lines",
            ));
        }

        Ok(vec![OutboundReleaseEvent::ReleaseApproved {
            release_id: cmd.release_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<OutboundReleaseEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_release_id(cmd.release_id)?;

        // Never from Released: reversal of issued stock is a new movement.
        let allowed = matches!(
            self.status,
            OutboundReleaseStatus::Draft | OutboundReleaseStatus::Approved
        );
        if !allowed {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                OutboundReleaseStatus::Rejected.as_str(),
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection reason is required"));
        }

        Ok(vec![OutboundReleaseEvent::ReleaseRejected {
            release_id: cmd.release_id,
            rejected_by: cmd.rejected_by,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_release(&self, cmd: &Release) -> Result<Vec<OutboundReleaseEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_release_id(cmd.release_id)?;

        if self.status != OutboundReleaseStatus::Approved {
            return Err(DomainError::invalid_transition(
                self.status.as_str(),
                OutboundReleaseStatus::Released.as_str(),
            ));
        }

        let mut released = Vec::with_capacity(self.lines.len());
        for input in &cmd.lines {
            let line = self
                .lines
                .iter()
                .find(|l| l.line_no == input.line_no)
                .ok_or(DomainError::NotFound)?;
            if released
                .iter()
                .any(|r: &ReleasedLine| r.line_no == input.line_no)
            {
                return Err(DomainError::validation(format!(
                    "line {} released twice",
                    input.line_no
                )));
            }
            if input.released_qty < 0 || input.released_qty > line.requested_qty {
                return Err(DomainError::quantity(format!(
                    "line {}: released quantity must be within 0..={}",
                    input.line_no, line.requested_qty
                )));
            }
            released.push(ReleasedLine {
                line_no: line.line_no,
                item_id: line.item_id,
                requested_qty: line.requested_qty,
                released_qty: input.released_qty,
            });
        }

        if released.iter().map(|r| r.released_qty).sum::<i64>() == 0 {
            return Err(DomainError::quantity(
                "release with zero total quantity is a no-op",
            ));
        }

        Ok(vec![OutboundReleaseEvent::StockReleased {
            release_id: cmd.release_id,
            released_by: cmd.released_by,
            lines: released,
            occurred_at: cmd.occurred_at,
        }])
    }
}
