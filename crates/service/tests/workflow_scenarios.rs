//! Cross-crate scenario tests: full document workflows driving the stock
//! ledger through the orchestration layer, black-box style.

use kardex_adjustment::{AdjustmentDirection, AdjustmentMethod, StockAdjustmentStatus};
use kardex_approval::Actor;
use kardex_core::{Document, DomainError, ItemId, UserId, VendorId};
use kardex_ledger::{Item, MovementKind};
use kardex_opname::{CountingSheetStatus, OpnameSessionStatus};
use kardex_outbound::{OutboundReleaseStatus, ReleaseInput};
use kardex_purchasing::PurchaseRequestStatus;
use kardex_receiving::{
    DiscrepancyKind, DiscrepancyResolution, ExpectedLine, InboundReceiptStatus, VerifyLine,
};
use kardex_returns::VendorReturnStatus;
use kardex_service::{AdjustmentSpec, InventoryServices};

fn clerk() -> Actor {
    Actor::with_role(UserId::new(), "warehouse")
}

fn manager() -> Actor {
    Actor::with_role(UserId::new(), "manager")
}

fn purchaser() -> Actor {
    Actor::with_role(UserId::new(), "purchasing")
}

fn auditor() -> Actor {
    Actor::with_role(UserId::new(), "auditor")
}

/// Register an item and bring it to `qty` on hand through an approved
/// adjustment, so even the fixture stock is explained by ledger entries.
fn seed_item(services: &InventoryServices, name: &str, qty: i64) -> ItemId {
    let item_id = ItemId::new();
    services
        .ledger
        .register_item(Item::new(item_id, name, "pcs"))
        .unwrap();
    if qty > 0 {
        let adjustment = services
            .adjustments
            .create(
                &clerk(),
                vec![AdjustmentSpec {
                    item_id,
                    method: AdjustmentMethod::DeltaQty {
                        direction: AdjustmentDirection::Increase,
                        qty,
                    },
                    note: Some("opening balance".to_string()),
                }],
                None,
            )
            .unwrap();
        services
            .adjustments
            .approve(&manager(), adjustment.document_id())
            .unwrap();
    }
    item_id
}

/// Drive one item through the full outbound workflow: draft, approve,
/// release `qty`.
fn release_stock(services: &InventoryServices, item_id: ItemId, qty: i64) {
    let creator = clerk();
    let release = services.outbound.create(&creator, None).unwrap();
    services
        .outbound
        .add_line(&creator, release.document_id(), item_id, qty)
        .unwrap();
    services
        .outbound
        .approve(&manager(), release.document_id())
        .unwrap();
    services
        .outbound
        .release(
            &creator,
            release.document_id(),
            vec![ReleaseInput {
                line_no: 1,
                released_qty: qty,
            }],
        )
        .unwrap();
}

#[test]
fn released_stock_decrements_and_records_one_entry() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 100);

    let creator = clerk();
    let release = services.outbound.create(&creator, None).unwrap();
    services
        .outbound
        .add_line(&creator, release.document_id(), item_id, 30)
        .unwrap();
    services
        .outbound
        .approve(&manager(), release.document_id())
        .unwrap();
    let outcome = services
        .outbound
        .release(
            &creator,
            release.document_id(),
            vec![ReleaseInput {
                line_no: 1,
                released_qty: 30,
            }],
        )
        .unwrap();

    assert_eq!(outcome.release.status(), OutboundReleaseStatus::Released);
    assert_eq!(outcome.ledger_entries.len(), 1);
    let entry = &outcome.ledger_entries[0];
    assert_eq!(entry.kind, MovementKind::Outbound);
    assert_eq!(entry.quantity_before, 100);
    assert_eq!(entry.quantity_change, -30);
    assert_eq!(entry.quantity_after, 70);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 70);
}

#[test]
fn real_qty_adjustment_applies_the_variance() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 70);

    let adjustment = services
        .adjustments
        .create(
            &clerk(),
            vec![AdjustmentSpec {
                item_id,
                method: AdjustmentMethod::RealQty { qty_input: 65 },
                note: None,
            }],
            None,
        )
        .unwrap();
    assert_eq!(adjustment.lines()[0].qty_system, 70);

    let outcome = services
        .adjustments
        .approve(&manager(), adjustment.document_id())
        .unwrap();
    assert_eq!(outcome.adjustment.status(), StockAdjustmentStatus::Approved);
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].kind, MovementKind::AdjustmentOut);
    assert_eq!(outcome.ledger_entries[0].quantity_change, -5);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 65);
}

#[test]
fn inbound_shortage_enters_only_accepted_goods() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item Y", 0);

    let receipt = services
        .receiving
        .create(
            &clerk(),
            vec![ExpectedLine {
                item_id,
                expected_qty: 50,
            }],
            None,
        )
        .unwrap();

    let outcome = services
        .receiving
        .verify(
            &clerk(),
            receipt.document_id(),
            vec![VerifyLine {
                line_no: 1,
                received_qty: 45,
                accepted_qty: 45,
                rejected_qty: 0,
                rejection_reason: None,
            }],
        )
        .unwrap();

    assert_eq!(outcome.receipt.status(), InboundReceiptStatus::Partial);
    let line = &outcome.receipt.lines()[0];
    assert_eq!(
        line.discrepancy.as_ref().map(|d| d.kind),
        Some(DiscrepancyKind::Shortage)
    );
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].quantity_change, 45);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 45);

    // The open issue is trackable and resolvable independently of the
    // header; resolution adds no ledger entries.
    assert_eq!(services.receiving.list_with_open_discrepancies().unwrap().len(), 1);
    let resolved = services
        .receiving
        .resolve_discrepancy(
            &clerk(),
            receipt.document_id(),
            1,
            DiscrepancyResolution::CloseShort,
        )
        .unwrap();
    assert_eq!(resolved.status(), InboundReceiptStatus::Partial);
    assert!(resolved.open_discrepancies().is_empty());
    assert_eq!(services.ledger.entries_for(item_id).unwrap().len(), 1);
}

#[test]
fn insufficient_stock_aborts_the_whole_release() {
    let services = InventoryServices::in_memory();
    let plentiful = seed_item(&services, "Plentiful", 50);
    let scarce = seed_item(&services, "Scarce", 5);

    let creator = clerk();
    let release = services.outbound.create(&creator, None).unwrap();
    services
        .outbound
        .add_line(&creator, release.document_id(), plentiful, 20)
        .unwrap();
    services
        .outbound
        .add_line(&creator, release.document_id(), scarce, 10)
        .unwrap();
    services
        .outbound
        .approve(&manager(), release.document_id())
        .unwrap();

    let err = services
        .outbound
        .release(
            &creator,
            release.document_id(),
            vec![
                ReleaseInput { line_no: 1, released_qty: 20 },
                ReleaseInput { line_no: 2, released_qty: 10 },
            ],
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientStock { .. }));

    // All-or-nothing: no entries landed, quantities untouched, header
    // still approved.
    assert_eq!(services.ledger.current_stock(plentiful).unwrap(), 50);
    assert_eq!(services.ledger.current_stock(scarce).unwrap(), 5);
    let release = services.outbound.get(release.document_id()).unwrap();
    assert_eq!(release.status(), OutboundReleaseStatus::Approved);
}

#[test]
fn all_zero_release_is_rejected_as_a_no_op() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 10);

    let creator = clerk();
    let release = services.outbound.create(&creator, None).unwrap();
    services
        .outbound
        .add_line(&creator, release.document_id(), item_id, 10)
        .unwrap();
    services
        .outbound
        .approve(&manager(), release.document_id())
        .unwrap();

    let err = services
        .outbound
        .release(
            &creator,
            release.document_id(),
            vec![ReleaseInput { line_no: 1, released_qty: 0 }],
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::QuantityOutOfRange(_)));
}

#[test]
fn creator_cannot_approve_their_own_release() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 10);

    // The creator holds the approving role too; the gate still refuses.
    let creator = Actor::new(
        UserId::new(),
        vec![
            kardex_approval::Role::new("warehouse"),
            kardex_approval::Role::new("manager"),
        ],
    );
    let release = services.outbound.create(&creator, None).unwrap();
    services
        .outbound
        .add_line(&creator, release.document_id(), item_id, 5)
        .unwrap();

    let err = services
        .outbound
        .approve(&creator, release.document_id())
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
    let release = services.outbound.get(release.document_id()).unwrap();
    assert_eq!(release.status(), OutboundReleaseStatus::Draft);
}

#[test]
fn approver_cannot_release_unless_elevated() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 10);

    let creator = clerk();
    let approver = Actor::new(
        UserId::new(),
        vec![
            kardex_approval::Role::new("manager"),
            kardex_approval::Role::new("warehouse"),
        ],
    );
    let release = services.outbound.create(&creator, None).unwrap();
    services
        .outbound
        .add_line(&creator, release.document_id(), item_id, 5)
        .unwrap();
    services
        .outbound
        .approve(&approver, release.document_id())
        .unwrap();

    let lines = vec![ReleaseInput { line_no: 1, released_qty: 5 }];
    let err = services
        .outbound
        .release(&approver, release.document_id(), lines.clone())
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));

    // The wildcard role bypasses segregation of duties.
    let admin = Actor::with_role(approver.user_id, "admin");
    services
        .outbound
        .release(&admin, release.document_id(), lines)
        .unwrap();
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 5);
}

#[test]
fn negative_driving_adjustment_is_rejected_whole() {
    let services = InventoryServices::in_memory();
    let steady = seed_item(&services, "Steady", 10);
    let tight = seed_item(&services, "Tight", 3);

    let adjustment = services
        .adjustments
        .create(
            &clerk(),
            vec![
                AdjustmentSpec {
                    item_id: steady,
                    method: AdjustmentMethod::DeltaQty {
                        direction: AdjustmentDirection::Increase,
                        qty: 2,
                    },
                    note: None,
                },
                AdjustmentSpec {
                    item_id: tight,
                    method: AdjustmentMethod::DeltaQty {
                        direction: AdjustmentDirection::Decrease,
                        qty: 4,
                    },
                    note: None,
                },
            ],
            None,
        )
        .unwrap();

    let err = services
        .adjustments
        .approve(&manager(), adjustment.document_id())
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientStock { .. }));

    let adjustment = services.adjustments.get(adjustment.document_id()).unwrap();
    assert_eq!(adjustment.status(), StockAdjustmentStatus::Pending);
    assert_eq!(services.ledger.current_stock(steady).unwrap(), 10);
    assert_eq!(services.ledger.current_stock(tight).unwrap(), 3);
}

#[test]
fn adjustment_approval_checks_live_stock_not_the_snapshot() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 20);

    // Snapshot 20, target 15: variance -5 was fine when created.
    let adjustment = services
        .adjustments
        .create(
            &clerk(),
            vec![AdjustmentSpec {
                item_id,
                method: AdjustmentMethod::RealQty { qty_input: 15 },
                note: None,
            }],
            None,
        )
        .unwrap();

    // Stock drifts to 2 before anyone approves.
    release_stock(&services, item_id, 18);

    let err = services
        .adjustments
        .approve(&manager(), adjustment.document_id())
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientStock { .. }));
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 2);
}

#[test]
fn zero_variance_adjustment_approves_without_entries() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 40);
    let before = services.ledger.entries_for(item_id).unwrap().len();

    let adjustment = services
        .adjustments
        .create(
            &clerk(),
            vec![AdjustmentSpec {
                item_id,
                method: AdjustmentMethod::RealQty { qty_input: 40 },
                note: None,
            }],
            None,
        )
        .unwrap();
    let outcome = services
        .adjustments
        .approve(&manager(), adjustment.document_id())
        .unwrap();

    assert_eq!(outcome.adjustment.status(), StockAdjustmentStatus::Approved);
    assert!(outcome.ledger_entries.is_empty());
    assert_eq!(services.ledger.entries_for(item_id).unwrap().len(), before);
}

#[test]
fn issuing_a_po_opens_the_matching_receipt_without_stock_movement() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 0);

    let creator = clerk();
    let request = services
        .purchasing
        .create(&creator, VendorId::new(), None)
        .unwrap();
    services
        .purchasing
        .add_line(&creator, request.document_id(), item_id, 50, 1200)
        .unwrap();
    let request = services
        .purchasing
        .submit(&creator, request.document_id())
        .unwrap();
    assert_eq!(request.total_amount(), 60_000);
    assert_eq!(request.total_amount(), request.recompute_total());

    services
        .purchasing
        .manager_approve(&manager(), request.document_id())
        .unwrap();
    let buyer = purchaser();
    let request = services
        .purchasing
        .confirm(&buyer, request.document_id(), false)
        .unwrap();
    assert_eq!(request.status(), PurchaseRequestStatus::Confirmed);

    let outcome = services
        .purchasing
        .issue_po(&buyer, request.document_id())
        .unwrap();
    assert_eq!(outcome.request.status(), PurchaseRequestStatus::PoIssued);
    assert_eq!(
        outcome.receipt.status(),
        InboundReceiptStatus::PendingVerification
    );
    assert_eq!(outcome.receipt.source_request(), Some(request.document_id()));
    assert_eq!(outcome.receipt.lines().len(), 1);
    assert_eq!(outcome.receipt.lines()[0].expected_qty, 50);

    // Nothing has arrived: no stock moved yet.
    assert!(services.ledger.entries_for(item_id).unwrap().is_empty());

    // Goods arrive complete; verification brings them into stock.
    let verify = services
        .receiving
        .verify(
            &clerk(),
            outcome.receipt.document_id(),
            vec![VerifyLine {
                line_no: 1,
                received_qty: 50,
                accepted_qty: 50,
                rejected_qty: 0,
                rejection_reason: None,
            }],
        )
        .unwrap();
    assert_eq!(verify.receipt.status(), InboundReceiptStatus::Completed);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 50);
}

#[test]
fn prepayment_confirmation_requires_an_independent_payment_release() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 0);

    let creator = clerk();
    let request = services
        .purchasing
        .create(&creator, VendorId::new(), None)
        .unwrap();
    services
        .purchasing
        .add_line(&creator, request.document_id(), item_id, 5, 400)
        .unwrap();
    services
        .purchasing
        .submit(&creator, request.document_id())
        .unwrap();
    services
        .purchasing
        .manager_approve(&manager(), request.document_id())
        .unwrap();

    // The confirmer happens to hold the finance role too.
    let confirmer = Actor::new(
        UserId::new(),
        vec![
            kardex_approval::Role::new("purchasing"),
            kardex_approval::Role::new("finance"),
        ],
    );
    let request = services
        .purchasing
        .confirm(&confirmer, request.document_id(), true)
        .unwrap();
    assert_eq!(request.status(), PurchaseRequestStatus::WaitingPayment);

    // Segregation of duties: the confirmer cannot release the payment.
    let err = services
        .purchasing
        .release_payment(&confirmer, request.document_id())
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));

    let finance = Actor::with_role(UserId::new(), "finance");
    let request = services
        .purchasing
        .release_payment(&finance, request.document_id())
        .unwrap();
    assert_eq!(request.status(), PurchaseRequestStatus::PaymentReleased);
}

#[test]
fn draft_requests_are_deletable_by_their_creator_only() {
    let services = InventoryServices::in_memory();
    let creator = clerk();
    let request = services
        .purchasing
        .create(&creator, VendorId::new(), None)
        .unwrap();

    let err = services
        .purchasing
        .delete(&clerk(), request.document_id())
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));

    services
        .purchasing
        .delete(&creator, request.document_id())
        .unwrap();
    assert!(matches!(
        services.purchasing.get(request.document_id()),
        Err(DomainError::NotFound)
    ));
}

#[test]
fn matched_opname_variance_spawns_a_pending_adjustment() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item Z", 195);

    let session = services
        .opname
        .open_session(&manager(), vec![item_id], None)
        .unwrap();
    let s1 = services.opname.add_sheet(session.document_id()).unwrap();
    let s2 = services.opname.add_sheet(session.document_id()).unwrap();

    let counter_a = auditor();
    let counter_b = auditor();
    for (sheet, counter) in [(s1, &counter_a), (s2, &counter_b)] {
        services
            .opname
            .record_count(counter, session.document_id(), sheet, item_id, 200)
            .unwrap();
        services
            .opname
            .submit_sheet(counter, session.document_id(), sheet)
            .unwrap();
    }

    let compared = services
        .opname
        .compare_sheets(&counter_a, session.document_id(), s1, s2)
        .unwrap();
    assert!(compared.matched);

    let outcome = services
        .opname
        .finalize(&manager(), session.document_id())
        .unwrap();
    assert_eq!(
        outcome.session.status(),
        OpnameSessionStatus::CompletedWithAdjustment
    );
    assert_eq!(outcome.variances.len(), 1);
    assert_eq!(outcome.variances[0].qty_system, 195);
    assert_eq!(outcome.variances[0].qty_input, 200);
    assert_eq!(outcome.variances[0].qty_variance, 5);

    // The adjustment is pending, carries the session's snapshot, and has
    // moved no stock yet.
    let adjustment = outcome.adjustment.expect("nonzero variance spawns an adjustment");
    assert_eq!(adjustment.status(), StockAdjustmentStatus::Pending);
    assert_eq!(adjustment.lines().len(), 1);
    assert_eq!(adjustment.lines()[0].qty_system, 195);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 195);

    // Only its independent approval applies the variance.
    let outcome = services
        .adjustments
        .approve(&manager(), adjustment.document_id())
        .unwrap();
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].kind, MovementKind::AdjustmentIn);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 200);
}

#[test]
fn zero_variance_opname_completes_without_an_adjustment() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item Z", 200);

    let session = services
        .opname
        .open_session(&manager(), vec![item_id], None)
        .unwrap();
    let s1 = services.opname.add_sheet(session.document_id()).unwrap();
    let s2 = services.opname.add_sheet(session.document_id()).unwrap();
    for sheet in [s1, s2] {
        let counter = auditor();
        services
            .opname
            .record_count(&counter, session.document_id(), sheet, item_id, 200)
            .unwrap();
        services
            .opname
            .submit_sheet(&counter, session.document_id(), sheet)
            .unwrap();
    }
    services
        .opname
        .compare_sheets(&auditor(), session.document_id(), s1, s2)
        .unwrap();

    let outcome = services
        .opname
        .finalize(&manager(), session.document_id())
        .unwrap();
    assert_eq!(outcome.session.status(), OpnameSessionStatus::Completed);
    assert!(outcome.adjustment.is_none());
}

#[test]
fn disagreeing_sheets_force_an_explicit_recount() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item Z", 195);

    let session = services
        .opname
        .open_session(&manager(), vec![item_id], None)
        .unwrap();
    let s1 = services.opname.add_sheet(session.document_id()).unwrap();
    let s2 = services.opname.add_sheet(session.document_id()).unwrap();

    let counter_a = auditor();
    services
        .opname
        .record_count(&counter_a, session.document_id(), s1, item_id, 180)
        .unwrap();
    services
        .opname
        .submit_sheet(&counter_a, session.document_id(), s1)
        .unwrap();
    let counter_b = auditor();
    services
        .opname
        .record_count(&counter_b, session.document_id(), s2, item_id, 185)
        .unwrap();
    services
        .opname
        .submit_sheet(&counter_b, session.document_id(), s2)
        .unwrap();

    let compared = services
        .opname
        .compare_sheets(&counter_a, session.document_id(), s1, s2)
        .unwrap();
    assert!(!compared.matched);
    assert_eq!(compared.mismatches.len(), 1);
    assert_eq!(compared.mismatches[0].counted_a, 180);
    assert_eq!(compared.mismatches[0].counted_b, 185);

    // Disagreement blocks finalization until a recount matches.
    let err = services
        .opname
        .finalize(&manager(), session.document_id())
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    // Rejecting sheet 1 wipes it for an independent recount; sheet 2 stays
    // submitted.
    let session_state = services
        .opname
        .reject_sheet(&counter_a, session.document_id(), s1)
        .unwrap();
    let rejected = session_state.sheet(s1).unwrap();
    assert_eq!(rejected.status, CountingSheetStatus::Draft);
    assert_eq!(rejected.counter, None);
    assert!(rejected.counts.iter().all(|c| c.counted_qty.is_none()));
    assert_eq!(
        session_state.sheet(s2).unwrap().status,
        CountingSheetStatus::Submitted
    );
}

#[test]
fn completed_return_sends_stock_out_and_keep_items_brings_it_back() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 50);

    let creator = clerk();
    let vendor_return = services
        .returns
        .create(&creator, VendorId::new(), None)
        .unwrap();
    services
        .returns
        .add_line(&creator, vendor_return.document_id(), item_id, 20)
        .unwrap();
    services
        .returns
        .submit(&creator, vendor_return.document_id())
        .unwrap();
    services
        .returns
        .approve(&manager(), vendor_return.document_id())
        .unwrap();
    services
        .returns
        .mark_sent(&creator, vendor_return.document_id())
        .unwrap();

    let outcome = services
        .returns
        .complete(&creator, vendor_return.document_id())
        .unwrap();
    assert_eq!(
        outcome.vendor_return.status(),
        VendorReturnStatus::Completed
    );
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].kind, MovementKind::ReturnOut);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 30);

    // The vendor declines the return; taking the goods back is its own
    // transition with its own inbound movement, not an undo.
    let outcome = services
        .returns
        .keep_items(&creator, vendor_return.document_id())
        .unwrap();
    assert_eq!(
        outcome.vendor_return.status(),
        VendorReturnStatus::ClosedKeptItems
    );
    assert_eq!(outcome.ledger_entries.len(), 1);
    assert_eq!(outcome.ledger_entries[0].kind, MovementKind::ReturnIn);
    assert_eq!(services.ledger.current_stock(item_id).unwrap(), 50);
}

#[test]
fn ledger_replay_matches_current_stock_after_mixed_workflows() {
    let services = InventoryServices::in_memory();
    let item_id = seed_item(&services, "Item X", 100);

    release_stock(&services, item_id, 30);

    let adjustment = services
        .adjustments
        .create(
            &clerk(),
            vec![AdjustmentSpec {
                item_id,
                method: AdjustmentMethod::RealQty { qty_input: 65 },
                note: None,
            }],
            None,
        )
        .unwrap();
    services
        .adjustments
        .approve(&manager(), adjustment.document_id())
        .unwrap();

    let current = services.ledger.current_stock(item_id).unwrap();
    assert_eq!(current, 65);
    assert_eq!(services.ledger.replayed_stock(item_id).unwrap(), current);

    // Every entry chains onto the previous one without gaps.
    let entries = services.ledger.entries_for(item_id).unwrap();
    assert_eq!(entries.len(), 3);
    for pair in entries.windows(2) {
        assert_eq!(pair[0].quantity_after, pair[1].quantity_before);
    }
    for entry in &entries {
        assert_eq!(entry.quantity_after, entry.quantity_before + entry.quantity_change);
    }
}
