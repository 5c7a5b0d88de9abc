use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use kardex_approval::{Actor, ApprovalGate, permissions};
use kardex_core::{
    Aggregate, Document, DomainError, DomainResult, DocumentId, DocumentType, ItemId, VendorId,
};
use kardex_purchasing::{
    AddLine, Confirm, CreateRequest, IssuePurchaseOrder, ManagerApprove, ManagerReject,
    PurchaseRequest, PurchaseRequestCommand, PurchaseRequestEvent, PurchaseRequestStatus,
    ReleasePayment, RemoveLine, Submit, UpdateLine,
};
use kardex_receiving::{CreateReceipt, ExpectedLine, InboundReceipt, InboundReceiptCommand};

use crate::numbering::DocumentNumbering;
use crate::store::DocumentStore;

/// Entities produced by issuing a purchase order: the finished request plus
/// the inbound receipt opened for the goods it expects. No stock moved.
#[derive(Debug, Clone)]
pub struct IssuePoOutcome {
    pub request: PurchaseRequest,
    pub receipt: InboundReceipt,
}

/// Purchase request operations.
pub struct PurchasingService {
    requests: Arc<DocumentStore<PurchaseRequest>>,
    receipts: Arc<DocumentStore<InboundReceipt>>,
    gate: Arc<ApprovalGate>,
    numbering: Arc<dyn DocumentNumbering>,
}

impl PurchasingService {
    pub fn new(
        requests: Arc<DocumentStore<PurchaseRequest>>,
        receipts: Arc<DocumentStore<InboundReceipt>>,
        gate: Arc<ApprovalGate>,
        numbering: Arc<dyn DocumentNumbering>,
    ) -> Self {
        Self {
            requests,
            receipts,
            gate,
            numbering,
        }
    }

    pub fn create(
        &self,
        actor: &Actor,
        vendor_id: VendorId,
        note: Option<String>,
    ) -> DomainResult<PurchaseRequest> {
        let request_id = DocumentId::new();
        let code = self.numbering.next_code(DocumentType::PurchaseRequest);
        let mut request = PurchaseRequest::empty(request_id);
        let events = request.handle(&PurchaseRequestCommand::CreateRequest(CreateRequest {
            request_id,
            code,
            vendor_id,
            created_by: actor.user_id,
            note,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            request.apply(event);
        }
        self.requests.insert(request_id, request.clone())?;
        info!(code = %request.code(), "purchase request created");
        Ok(request)
    }

    pub fn get(&self, request_id: DocumentId) -> DomainResult<PurchaseRequest> {
        self.requests.get(request_id)
    }

    pub fn list(&self) -> DomainResult<Vec<PurchaseRequest>> {
        self.requests.list()
    }

    pub fn list_by_status(
        &self,
        status: PurchaseRequestStatus,
    ) -> DomainResult<Vec<PurchaseRequest>> {
        self.requests.list_where(|r| r.status() == status)
    }

    /// Delete a draft or rejected request. Only the creator (or an elevated
    /// actor) may delete.
    pub fn delete(&self, actor: &Actor, request_id: DocumentId) -> DomainResult<()> {
        let removed = self.requests.remove(request_id, |request| {
            if !request.is_editable() {
                return Err(DomainError::validation(format!(
                    "a {} purchase request cannot be deleted",
                    request.status().as_str()
                )));
            }
            if actor.user_id != request.created_by() && !self.gate.is_elevated(actor) {
                return Err(DomainError::denied(
                    "only the creator can delete a purchase request",
                ));
            }
            Ok(())
        })?;
        info!(code = %removed.code(), "purchase request deleted");
        Ok(())
    }

    pub fn add_line(
        &self,
        actor: &Actor,
        request_id: DocumentId,
        item_id: ItemId,
        quantity: i64,
        unit_price: i64,
    ) -> DomainResult<PurchaseRequest> {
        self.run(
            request_id,
            PurchaseRequestCommand::AddLine(AddLine {
                request_id,
                item_id,
                quantity,
                unit_price,
                occurred_at: Utc::now(),
            }),
            Some(actor.user_id),
        )
    }

    pub fn update_line(
        &self,
        actor: &Actor,
        request_id: DocumentId,
        line_no: u32,
        quantity: i64,
        unit_price: i64,
    ) -> DomainResult<PurchaseRequest> {
        self.run(
            request_id,
            PurchaseRequestCommand::UpdateLine(UpdateLine {
                request_id,
                line_no,
                quantity,
                unit_price,
                occurred_at: Utc::now(),
            }),
            Some(actor.user_id),
        )
    }

    pub fn remove_line(
        &self,
        actor: &Actor,
        request_id: DocumentId,
        line_no: u32,
    ) -> DomainResult<PurchaseRequest> {
        self.run(
            request_id,
            PurchaseRequestCommand::RemoveLine(RemoveLine {
                request_id,
                line_no,
                occurred_at: Utc::now(),
            }),
            Some(actor.user_id),
        )
    }

    pub fn submit(&self, actor: &Actor, request_id: DocumentId) -> DomainResult<PurchaseRequest> {
        let request = self.run(
            request_id,
            PurchaseRequestCommand::Submit(Submit {
                request_id,
                submitted_by: actor.user_id,
                occurred_at: Utc::now(),
            }),
            Some(actor.user_id),
        )?;
        info!(code = %request.code(), "purchase request submitted for manager approval");
        Ok(request)
    }

    pub fn manager_approve(
        &self,
        actor: &Actor,
        request_id: DocumentId,
    ) -> DomainResult<PurchaseRequest> {
        let gate = &self.gate;
        let request = self.requests.update(request_id, |request| {
            gate.can_approve(actor, &*request, &permissions::PR_APPROVE)
                .map_err(|e| Self::deny(request, &e))?;
            Self::apply_command(
                request,
                &PurchaseRequestCommand::ManagerApprove(ManagerApprove {
                    request_id,
                    approved_by: actor.user_id,
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(code = %request.code(), "purchase request approved by manager");
        Ok(request)
    }

    pub fn manager_reject(
        &self,
        actor: &Actor,
        request_id: DocumentId,
        reason: impl Into<String>,
    ) -> DomainResult<PurchaseRequest> {
        let gate = &self.gate;
        let reason = reason.into();
        let request = self.requests.update(request_id, |request| {
            gate.can_approve(actor, &*request, &permissions::PR_REJECT)
                .map_err(|e| Self::deny(request, &e))?;
            Self::apply_command(
                request,
                &PurchaseRequestCommand::ManagerReject(ManagerReject {
                    request_id,
                    rejected_by: actor.user_id,
                    reason: reason.clone(),
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(code = %request.code(), "purchase request rejected by manager");
        Ok(request)
    }

    pub fn confirm(
        &self,
        actor: &Actor,
        request_id: DocumentId,
        prepayment_required: bool,
    ) -> DomainResult<PurchaseRequest> {
        let gate = &self.gate;
        let request = self.requests.update(request_id, |request| {
            gate.can_approve(actor, &*request, &permissions::PR_CONFIRM)
                .map_err(|e| Self::deny(request, &e))?;
            Self::apply_command(
                request,
                &PurchaseRequestCommand::Confirm(Confirm {
                    request_id,
                    confirmed_by: actor.user_id,
                    prepayment_required,
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(
            code = %request.code(),
            status = request.status().as_str(),
            "purchase request confirmed by purchasing"
        );
        Ok(request)
    }

    pub fn release_payment(
        &self,
        actor: &Actor,
        request_id: DocumentId,
    ) -> DomainResult<PurchaseRequest> {
        let gate = &self.gate;
        let request = self.requests.update(request_id, |request| {
            gate.can_release(actor, &*request, &permissions::PAYMENT_RELEASE)
                .map_err(|e| Self::deny(request, &e))?;
            Self::apply_command(
                request,
                &PurchaseRequestCommand::ReleasePayment(ReleasePayment {
                    request_id,
                    released_by: actor.user_id,
                    occurred_at: Utc::now(),
                }),
            )
        })?;
        info!(code = %request.code(), "payment released");
        Ok(request)
    }

    /// Issue the purchase order and open the matching inbound receipt,
    /// pre-populated with expected quantities equal to the request's lines.
    pub fn issue_po(&self, actor: &Actor, request_id: DocumentId) -> DomainResult<IssuePoOutcome> {
        let gate = &self.gate;
        let receipts = &self.receipts;
        let numbering = &self.numbering;
        let now = Utc::now();

        let outcome = self.requests.update(request_id, |request| {
            gate.authorize(actor, &permissions::PO_ISSUE)
                .map_err(|e| Self::deny(request, &e))?;

            let events = request.handle(&PurchaseRequestCommand::IssuePurchaseOrder(
                IssuePurchaseOrder {
                    request_id,
                    issued_by: actor.user_id,
                    occurred_at: now,
                },
            ))?;
            let PurchaseRequestEvent::PurchaseOrderIssued { lines, .. } = &events[0] else {
                return Err(DomainError::conflict(
                    "purchase order issuance produced an unexpected event",
                ));
            };

            // Cross-document creation, not a ledger mutation: nothing has
            // arrived yet.
            let receipt_id = DocumentId::new();
            let mut receipt = InboundReceipt::empty(receipt_id);
            let receipt_events =
                receipt.handle(&InboundReceiptCommand::CreateReceipt(CreateReceipt {
                    receipt_id,
                    code: numbering.next_code(DocumentType::InboundReceipt),
                    created_by: actor.user_id,
                    source_request: Some(request_id),
                    lines: lines
                        .iter()
                        .map(|l| ExpectedLine {
                            item_id: l.item_id,
                            expected_qty: l.quantity,
                        })
                        .collect(),
                    note: None,
                    occurred_at: now,
                }))?;
            for event in &receipt_events {
                receipt.apply(event);
            }
            receipts.insert(receipt_id, receipt.clone())?;

            for event in &events {
                request.apply(event);
            }
            Ok(IssuePoOutcome {
                request: request.clone(),
                receipt,
            })
        })?;

        info!(
            request = %outcome.request.code(),
            receipt = %outcome.receipt.code(),
            "purchase order issued, inbound receipt opened"
        );
        Ok(outcome)
    }

    /// Draft-side commands are creator-owned; everything else goes through
    /// the gate in its dedicated method.
    fn run(
        &self,
        request_id: DocumentId,
        command: PurchaseRequestCommand,
        acting_user: Option<kardex_core::UserId>,
    ) -> DomainResult<PurchaseRequest> {
        self.requests.update(request_id, |request| {
            if let Some(user_id) = acting_user {
                if user_id != request.created_by() {
                    return Err(DomainError::denied(
                        "only the creator can edit or submit a purchase request",
                    ));
                }
            }
            Self::apply_command(request, &command)
        })
    }

    fn apply_command(
        request: &mut PurchaseRequest,
        command: &PurchaseRequestCommand,
    ) -> DomainResult<PurchaseRequest> {
        let events = request.handle(command)?;
        for event in &events {
            request.apply(event);
        }
        Ok(request.clone())
    }

    fn deny(request: &PurchaseRequest, err: &kardex_approval::GateError) -> DomainError {
        warn!(code = %request.code(), %err, "purchase request transition denied");
        DomainError::PermissionDenied(err.to_string())
    }
}
