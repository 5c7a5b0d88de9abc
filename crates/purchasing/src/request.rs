use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{
    Aggregate, AggregateRoot, Approvable, Document, DocumentCode, DocumentId, DocumentType,
    DomainError, ItemId, Releasable, UserId, VendorId,
};

/// Purchase request status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseRequestStatus {
    Draft,
    PendingManagerApproval,
    PendingPurchasingApproval,
    Confirmed,
    WaitingPayment,
    PaymentReleased,
    PoIssued,
    Rejected,
}

impl PurchaseRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseRequestStatus::Draft => "draft",
            PurchaseRequestStatus::PendingManagerApproval => "pending_manager_approval",
            PurchaseRequestStatus::PendingPurchasingApproval => "pending_purchasing_approval",
            PurchaseRequestStatus::Confirmed => "confirmed",
            PurchaseRequestStatus::WaitingPayment => "waiting_payment",
            PurchaseRequestStatus::PaymentReleased => "payment_released",
            PurchaseRequestStatus::PoIssued => "po_issued",
            PurchaseRequestStatus::Rejected => "rejected",
        }
    }
}

/// Purchase request line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub quantity: i64,
    /// Smallest currency unit.
    pub unit_price: i64,
}

impl RequestLine {
    pub fn amount(&self) -> i64 {
        self.quantity * self.unit_price
    }
}

/// Aggregate root: PurchaseRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    id: DocumentId,
    code: DocumentCode,
    vendor_id: Option<VendorId>,
    status: PurchaseRequestStatus,
    created_by: UserId,
    lines: Vec<RequestLine>,
    /// Denormalized for display; `recompute_total()` is authoritative.
    total_amount: i64,
    note: Option<String>,

    submitted_at: Option<DateTime<Utc>>,
    manager_approved_by: Option<UserId>,
    manager_approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    confirmed_by: Option<UserId>,
    confirmed_at: Option<DateTime<Utc>>,
    payment_released_by: Option<UserId>,
    payment_released_at: Option<DateTime<Utc>>,
    po_issued_by: Option<UserId>,
    po_issued_at: Option<DateTime<Utc>>,

    version: u64,
    created: bool,
}

impl PurchaseRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            code: DocumentCode::new(""),
            vendor_id: None,
            status: PurchaseRequestStatus::Draft,
            created_by: UserId::nil(),
            lines: Vec::new(),
            total_amount: 0,
            note: None,
            submitted_at: None,
            manager_approved_by: None,
            manager_approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            confirmed_by: None,
            confirmed_at: None,
            payment_released_by: None,
            payment_released_at: None,
            po_issued_by: None,
            po_issued_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> PurchaseRequestStatus {
        self.status
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn lines(&self) -> &[RequestLine] {
        &self.lines
    }

    /// Stored denormalized total.
    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    /// Authoritative total: `sum(quantity * unit_price)` over live lines.
    /// A mismatch with `total_amount()` is a bug, not a valid state.
    pub fn recompute_total(&self) -> i64 {
        self.lines.iter().map(RequestLine::amount).sum()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Lines may be edited (and the document deleted) only in these states.
    pub fn is_editable(&self) -> bool {
        matches!(
            self.status,
            PurchaseRequestStatus::Draft | PurchaseRequestStatus::Rejected
        )
    }
}

impl AggregateRoot for PurchaseRequest {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Document for PurchaseRequest {
    fn document_id(&self) -> DocumentId {
        self.id
    }

    fn document_type(&self) -> DocumentType {
        DocumentType::PurchaseRequest
    }

    fn code(&self) -> &DocumentCode {
        &self.code
    }

    fn created_by(&self) -> UserId {
        self.created_by
    }
}

impl Approvable for PurchaseRequest {
    /// The approval the payment release segregates against: purchasing
    /// confirmation once present, manager approval before that.
    fn approved_by(&self) -> Option<UserId> {
        self.confirmed_by.or(self.manager_approved_by)
    }
}

impl Releasable for PurchaseRequest {
    fn released_by(&self) -> Option<UserId> {
        self.payment_released_by
    }
}

/// Command: CreateRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub request_id: DocumentId,
    pub code: DocumentCode,
    pub vendor_id: VendorId,
    pub created_by: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only in Draft/Rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub request_id: DocumentId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLine (only in Draft/Rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLine {
    pub request_id: DocumentId,
    pub line_no: u32,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine (only in Draft/Rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub request_id: DocumentId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Submit for manager approval (from Draft, or Rejected on revise).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub request_id: DocumentId,
    pub submitted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ManagerApprove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerApprove {
    pub request_id: DocumentId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ManagerReject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerReject {
    pub request_id: DocumentId,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: purchasing Confirm. `prepayment_required` decides whether the
/// request waits for a payment release before a PO can be issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirm {
    pub request_id: DocumentId,
    pub confirmed_by: UserId,
    pub prepayment_required: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleasePayment (only from WaitingPayment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePayment {
    pub request_id: DocumentId,
    pub released_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssuePurchaseOrder.
///
/// The emitted event carries the line items so orchestration can open the
/// matching inbound receipt. No stock moves here; nothing has arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePurchaseOrder {
    pub request_id: DocumentId,
    pub issued_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseRequestCommand {
    CreateRequest(CreateRequest),
    AddLine(AddLine),
    UpdateLine(UpdateLine),
    RemoveLine(RemoveLine),
    Submit(Submit),
    ManagerApprove(ManagerApprove),
    ManagerReject(ManagerReject),
    Confirm(Confirm),
    ReleasePayment(ReleasePayment),
    IssuePurchaseOrder(IssuePurchaseOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseRequestEvent {
    RequestCreated {
        request_id: DocumentId,
        code: DocumentCode,
        vendor_id: VendorId,
        created_by: UserId,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    LineAdded {
        request_id: DocumentId,
        line_no: u32,
        item_id: ItemId,
        quantity: i64,
        unit_price: i64,
        occurred_at: DateTime<Utc>,
    },
    LineUpdated {
        request_id: DocumentId,
        line_no: u32,
        quantity: i64,
        unit_price: i64,
        occurred_at: DateTime<Utc>,
    },
    LineRemoved {
        request_id: DocumentId,
        line_no: u32,
        occurred_at: DateTime<Utc>,
    },
    RequestSubmitted {
        request_id: DocumentId,
        submitted_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ManagerApproved {
        request_id: DocumentId,
        approved_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    RequestRejected {
        request_id: DocumentId,
        rejected_by: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    RequestConfirmed {
        request_id: DocumentId,
        confirmed_by: UserId,
        waiting_payment: bool,
        occurred_at: DateTime<Utc>,
    },
    PaymentReleased {
        request_id: DocumentId,
        released_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    PurchaseOrderIssued {
        request_id: DocumentId,
        issued_by: UserId,
        lines: Vec<RequestLine>,
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for PurchaseRequest {
    type Command = PurchaseRequestCommand;
    type Event = PurchaseRequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseRequestEvent::RequestCreated {
                request_id,
                code,
                vendor_id,
                created_by,
                note,
                ..
            } => {
                self.id = *request_id;
                self.code = code.clone();
                self.vendor_id = Some(*vendor_id);
                self.created_by = *created_by;
                self.note = note.clone();
                self.status = PurchaseRequestStatus::Draft;
                self.lines.clear();
                self.total_amount = 0;
                self.created = true;
            }
            PurchaseRequestEvent::LineAdded {
                line_no,
                item_id,
                quantity,
                unit_price,
                ..
            } => {
                self.lines.push(RequestLine {
                    line_no: *line_no,
                    item_id: *item_id,
                    quantity: *quantity,
                    unit_price: *unit_price,
                });
                self.total_amount = self.recompute_total();
            }
            PurchaseRequestEvent::LineUpdated {
                line_no,
                quantity,
                unit_price,
                ..
            } => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == *line_no) {
                    line.quantity = *quantity;
                    line.unit_price = *unit_price;
                }
                self.total_amount = self.recompute_total();
            }
            PurchaseRequestEvent::LineRemoved { line_no, .. } => {
                self.lines.retain(|l| l.line_no != *line_no);
                self.total_amount = self.recompute_total();
            }
            PurchaseRequestEvent::RequestSubmitted { occurred_at, .. } => {
                self.status = PurchaseRequestStatus::PendingManagerApproval;
                self.submitted_at = Some(*occurred_at);
                // A resubmission supersedes an earlier rejection.
                self.rejected_by = None;
                self.rejected_at = None;
                self.rejection_reason = None;
            }
            PurchaseRequestEvent::ManagerApproved {
                approved_by,
                occurred_at,
                ..
            } => {
                self.status = PurchaseRequestStatus::PendingPurchasingApproval;
                self.manager_approved_by = Some(*approved_by);
                self.manager_approved_at = Some(*occurred_at);
            }
            PurchaseRequestEvent::RequestRejected {
                rejected_by,
                reason,
                occurred_at,
                ..
            } => {
                self.status = PurchaseRequestStatus::Rejected;
                self.rejected_by = Some(*rejected_by);
                self.rejected_at = Some(*occurred_at);
                self.rejection_reason = Some(reason.clone());
            }
            PurchaseRequestEvent::RequestConfirmed {
                confirmed_by,
                waiting_payment,
                occurred_at,
                ..
            } => {
                self.status = if *waiting_payment {
                    PurchaseRequestStatus::WaitingPayment
                } else {
                    PurchaseRequestStatus::Confirmed
                };
                self.confirmed_by = Some(*confirmed_by);
                self.confirmed_at = Some(*occurred_at);
            }
            PurchaseRequestEvent::PaymentReleased {
                released_by,
                occurred_at,
                ..
            } => {
                self.status = PurchaseRequestStatus::PaymentReleased;
                self.payment_released_by = Some(*released_by);
                self.payment_released_at = Some(*occurred_at);
            }
            PurchaseRequestEvent::PurchaseOrderIssued {
                issued_by,
                occurred_at,
                ..
            } => {
                self.status = PurchaseRequestStatus::PoIssued;
                self.po_issued_by = Some(*issued_by);
                self.po_issued_at = Some(*occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseRequestCommand::CreateRequest(cmd) => self.handle_create(cmd),
            PurchaseRequestCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseRequestCommand::UpdateLine(cmd) => self.handle_update_line(cmd),
            PurchaseRequestCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            PurchaseRequestCommand::Submit(cmd) => self.handle_submit(cmd),
            PurchaseRequestCommand::ManagerApprove(cmd) => self.handle_manager_approve(cmd),
            PurchaseRequestCommand::ManagerReject(cmd) => self.handle_manager_reject(cmd),
            PurchaseRequestCommand::Confirm(cmd) => self.handle_confirm(cmd),
            PurchaseRequestCommand::ReleasePayment(cmd) => self.handle_release_payment(cmd),
            PurchaseRequestCommand::IssuePurchaseOrder(cmd) => self.handle_issue_po(cmd),
        }
    }
}

impl PurchaseRequest {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_request_id(&self, request_id: DocumentId) -> Result<(), DomainError> {
        if self.id != request_id {
            return Err(DomainError::conflict("request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), DomainError> {
        if !self.is_editable() {
            return Err(DomainError::validation(format!(
                "line items can only be edited in draft or rejected, not {}",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn transition_error(&self, to: PurchaseRequestStatus) -> DomainError {
        DomainError::invalid_transition(self.status.as_str(), to.as_str())
    }

    fn handle_create(&self, cmd: &CreateRequest) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase request already exists"));
        }
        if cmd.code.as_str().is_empty() {
            return Err(DomainError::validation("document code cannot be empty"));
        }

        Ok(vec![PurchaseRequestEvent::RequestCreated {
            request_id: cmd.request_id,
            code: cmd.code.clone(),
            vendor_id: cmd.vendor_id,
            created_by: cmd.created_by,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn validate_line(quantity: i64, unit_price: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::quantity("quantity must be positive"));
        }
        if unit_price < 0 {
            return Err(DomainError::quantity("unit price cannot be negative"));
        }
        Ok(())
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;
        self.ensure_editable()?;
        Self::validate_line(cmd.quantity, cmd.unit_price)?;

        let next_line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        Ok(vec![PurchaseRequestEvent::LineAdded {
            request_id: cmd.request_id,
            line_no: next_line_no,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update_line(&self, cmd: &UpdateLine) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;
        self.ensure_editable()?;
        Self::validate_line(cmd.quantity, cmd.unit_price)?;

        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::not_found());
        }

        Ok(vec![PurchaseRequestEvent::LineUpdated {
            request_id: cmd.request_id,
            line_no: cmd.line_no,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;
        self.ensure_editable()?;

        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::not_found());
        }

        Ok(vec![PurchaseRequestEvent::LineRemoved {
            request_id: cmd.request_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_submit(&self, cmd: &Submit) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if !self.is_editable() {
            return Err(self.transition_error(PurchaseRequestStatus::PendingManagerApproval));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit purchase request without lines",
            ));
        }

        Ok(vec![PurchaseRequestEvent::RequestSubmitted {
            request_id: cmd.request_id,
            submitted_by: cmd.submitted_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_manager_approve(
        &self,
        cmd: &ManagerApprove,
    ) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != PurchaseRequestStatus::PendingManagerApproval {
            return Err(self.transition_error(PurchaseRequestStatus::PendingPurchasingApproval));
        }

        Ok(vec![PurchaseRequestEvent::ManagerApproved {
            request_id: cmd.request_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_manager_reject(
        &self,
        cmd: &ManagerReject,
    ) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != PurchaseRequestStatus::PendingManagerApproval {
            return Err(self.transition_error(PurchaseRequestStatus::Rejected));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection reason is required"));
        }

        Ok(vec![PurchaseRequestEvent::RequestRejected {
            request_id: cmd.request_id,
            rejected_by: cmd.rejected_by,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_confirm(&self, cmd: &Confirm) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != PurchaseRequestStatus::PendingPurchasingApproval {
            return Err(self.transition_error(PurchaseRequestStatus::Confirmed));
        }

        Ok(vec![PurchaseRequestEvent::RequestConfirmed {
            request_id: cmd.request_id,
            confirmed_by: cmd.confirmed_by,
            waiting_payment: cmd.prepayment_required,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_release_payment(
        &self,
        cmd: &ReleasePayment,
    ) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != PurchaseRequestStatus::WaitingPayment {
            return Err(self.transition_error(PurchaseRequestStatus::PaymentReleased));
        }

        Ok(vec![PurchaseRequestEvent::PaymentReleased {
            request_id: cmd.request_id,
            released_by: cmd.released_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_issue_po(
        &self,
        cmd: &IssuePurchaseOrder,
    ) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        let ready = matches!(
            self.status,
            PurchaseRequestStatus::Confirmed | PurchaseRequestStatus::PaymentReleased
        );
        if !ready {
            return Err(self.transition_error(PurchaseRequestStatus::PoIssued));
        }

        Ok(vec![PurchaseRequestEvent::PurchaseOrderIssued {
            request_id: cmd.request_id,
            issued_by: cmd.issued_by,
            lines: self.lines.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_request() -> (PurchaseRequest, DocumentId, UserId) {
        let request_id = DocumentId::new();
        let creator = UserId::new();
        let mut request = PurchaseRequest::empty(request_id);
        let events = request
            .handle(&PurchaseRequestCommand::CreateRequest(CreateRequest {
                request_id,
                code: DocumentCode::new("PR-0001"),
                vendor_id: VendorId::new(),
                created_by: creator,
                note: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        (request, request_id, creator)
    }

    fn add_line(request: &mut PurchaseRequest, request_id: DocumentId, qty: i64, price: i64) {
        let events = request
            .handle(&PurchaseRequestCommand::AddLine(AddLine {
                request_id,
                item_id: ItemId::new(),
                quantity: qty,
                unit_price: price,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
    }

    fn submit_and_approve(request: &mut PurchaseRequest, request_id: DocumentId) -> UserId {
        let events = request
            .handle(&PurchaseRequestCommand::Submit(Submit {
                request_id,
                submitted_by: request.created_by(),
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);

        let manager = UserId::new();
        let events = request
            .handle(&PurchaseRequestCommand::ManagerApprove(ManagerApprove {
                request_id,
                approved_by: manager,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        manager
    }

    #[test]
    fn total_amount_tracks_line_mutations() {
        let (mut request, request_id, _) = created_request();
        add_line(&mut request, request_id, 10, 500);
        add_line(&mut request, request_id, 3, 1000);
        assert_eq!(request.total_amount(), 8000);
        assert_eq!(request.total_amount(), request.recompute_total());

        let events = request
            .handle(&PurchaseRequestCommand::UpdateLine(UpdateLine {
                request_id,
                line_no: 1,
                quantity: 2,
                unit_price: 500,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.total_amount(), 4000);

        let events = request
            .handle(&PurchaseRequestCommand::RemoveLine(RemoveLine {
                request_id,
                line_no: 2,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.total_amount(), 1000);
        assert_eq!(request.total_amount(), request.recompute_total());
    }

    #[test]
    fn lines_are_frozen_after_submission() {
        let (mut request, request_id, _) = created_request();
        add_line(&mut request, request_id, 10, 500);

        let events = request
            .handle(&PurchaseRequestCommand::Submit(Submit {
                request_id,
                submitted_by: request.created_by(),
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);

        let err = request
            .handle(&PurchaseRequestCommand::AddLine(AddLine {
                request_id,
                item_id: ItemId::new(),
                quantity: 1,
                unit_price: 1,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cannot_submit_without_lines() {
        let (request, request_id, creator) = created_request();
        let err = request
            .handle(&PurchaseRequestCommand::Submit(Submit {
                request_id,
                submitted_by: creator,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_path_to_po_issued_without_prepayment() {
        let (mut request, request_id, _) = created_request();
        add_line(&mut request, request_id, 10, 500);
        submit_and_approve(&mut request, request_id);

        let purchaser = UserId::new();
        let events = request
            .handle(&PurchaseRequestCommand::Confirm(Confirm {
                request_id,
                confirmed_by: purchaser,
                prepayment_required: false,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.status(), PurchaseRequestStatus::Confirmed);

        let events = request
            .handle(&PurchaseRequestCommand::IssuePurchaseOrder(IssuePurchaseOrder {
                request_id,
                issued_by: purchaser,
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            PurchaseRequestEvent::PurchaseOrderIssued { lines, .. } => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].quantity, 10);
            }
            other => panic!("expected PurchaseOrderIssued, got {other:?}"),
        }
        request.apply(&events[0]);
        assert_eq!(request.status(), PurchaseRequestStatus::PoIssued);
    }

    #[test]
    fn prepayment_path_requires_payment_release_before_po() {
        let (mut request, request_id, _) = created_request();
        add_line(&mut request, request_id, 5, 200);
        submit_and_approve(&mut request, request_id);

        let purchaser = UserId::new();
        let events = request
            .handle(&PurchaseRequestCommand::Confirm(Confirm {
                request_id,
                confirmed_by: purchaser,
                prepayment_required: true,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.status(), PurchaseRequestStatus::WaitingPayment);

        // PO issuance is blocked while payment is pending.
        let err = request
            .handle(&PurchaseRequestCommand::IssuePurchaseOrder(IssuePurchaseOrder {
                request_id,
                issued_by: purchaser,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        let events = request
            .handle(&PurchaseRequestCommand::ReleasePayment(ReleasePayment {
                request_id,
                released_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.status(), PurchaseRequestStatus::PaymentReleased);

        let events = request
            .handle(&PurchaseRequestCommand::IssuePurchaseOrder(IssuePurchaseOrder {
                request_id,
                issued_by: purchaser,
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.status(), PurchaseRequestStatus::PoIssued);
    }

    #[test]
    fn rejected_request_can_be_revised_and_resubmitted() {
        let (mut request, request_id, _) = created_request();
        add_line(&mut request, request_id, 10, 500);

        let events = request
            .handle(&PurchaseRequestCommand::Submit(Submit {
                request_id,
                submitted_by: request.created_by(),
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);

        let events = request
            .handle(&PurchaseRequestCommand::ManagerReject(ManagerReject {
                request_id,
                rejected_by: UserId::new(),
                reason: "over budget".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.status(), PurchaseRequestStatus::Rejected);
        assert_eq!(request.rejection_reason(), Some("over budget"));

        // Rejected behaves like draft for edits.
        add_line(&mut request, request_id, 1, 100);

        let events = request
            .handle(&PurchaseRequestCommand::Submit(Submit {
                request_id,
                submitted_by: request.created_by(),
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);
        assert_eq!(request.status(), PurchaseRequestStatus::PendingManagerApproval);
        assert_eq!(request.rejection_reason(), None);
    }

    #[test]
    fn reject_requires_a_reason() {
        let (mut request, request_id, _) = created_request();
        add_line(&mut request, request_id, 10, 500);
        let events = request
            .handle(&PurchaseRequestCommand::Submit(Submit {
                request_id,
                submitted_by: request.created_by(),
                occurred_at: test_time(),
            }))
            .unwrap();
        request.apply(&events[0]);

        let err = request
            .handle(&PurchaseRequestCommand::ManagerReject(ManagerReject {
                request_id,
                rejected_by: UserId::new(),
                reason: "  ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn confirm_is_only_reachable_after_manager_approval() {
        let (mut request, request_id, _) = created_request();
        add_line(&mut request, request_id, 10, 500);

        let err = request
            .handle(&PurchaseRequestCommand::Confirm(Confirm {
                request_id,
                confirmed_by: UserId::new(),
                prepayment_required: false,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, to } => {
                assert_eq!(from, "draft");
                assert_eq!(to, "confirmed");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }
}
