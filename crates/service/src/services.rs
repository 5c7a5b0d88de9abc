use std::sync::Arc;

use kardex_adjustment::StockAdjustment;
use kardex_approval::ApprovalGate;
use kardex_ledger::StockLedger;
use kardex_opname::OpnameSession;
use kardex_outbound::OutboundRelease;
use kardex_purchasing::PurchaseRequest;
use kardex_receiving::InboundReceipt;
use kardex_returns::VendorReturn;

use crate::adjustment::AdjustmentService;
use crate::numbering::{DocumentNumbering, SequentialNumbering};
use crate::opname::OpnameService;
use crate::outbound::OutboundService;
use crate::purchasing::PurchasingService;
use crate::receiving::ReceivingService;
use crate::returns::ReturnsService;
use crate::store::DocumentStore;

/// All per-family services wired over one shared ledger, gate and numbering
/// source. Stores shared where workflows create each other's documents
/// (PO issuance opens a receipt; opname finalization opens an adjustment).
pub struct InventoryServices {
    pub ledger: Arc<StockLedger>,
    pub gate: Arc<ApprovalGate>,
    pub purchasing: PurchasingService,
    pub receiving: ReceivingService,
    pub outbound: OutboundService,
    pub adjustments: Arc<AdjustmentService>,
    pub returns: ReturnsService,
    pub opname: OpnameService,
}

impl InventoryServices {
    pub fn new(
        ledger: Arc<StockLedger>,
        gate: Arc<ApprovalGate>,
        numbering: Arc<dyn DocumentNumbering>,
    ) -> Self {
        let requests = Arc::new(DocumentStore::<PurchaseRequest>::new());
        let receipts = Arc::new(DocumentStore::<InboundReceipt>::new());
        let releases = Arc::new(DocumentStore::<OutboundRelease>::new());
        let adjustment_docs = Arc::new(DocumentStore::<StockAdjustment>::new());
        let returns = Arc::new(DocumentStore::<VendorReturn>::new());
        let sessions = Arc::new(DocumentStore::<OpnameSession>::new());

        let adjustments = Arc::new(AdjustmentService::new(
            adjustment_docs,
            ledger.clone(),
            gate.clone(),
            numbering.clone(),
        ));

        Self {
            purchasing: PurchasingService::new(
                requests,
                receipts.clone(),
                gate.clone(),
                numbering.clone(),
            ),
            receiving: ReceivingService::new(
                receipts,
                ledger.clone(),
                gate.clone(),
                numbering.clone(),
            ),
            outbound: OutboundService::new(
                releases,
                ledger.clone(),
                gate.clone(),
                numbering.clone(),
            ),
            returns: ReturnsService::new(
                returns,
                ledger.clone(),
                gate.clone(),
                numbering.clone(),
            ),
            opname: OpnameService::new(
                sessions,
                ledger.clone(),
                gate.clone(),
                numbering,
                adjustments.clone(),
            ),
            adjustments,
            ledger,
            gate,
        }
    }

    /// Fully in-memory wiring with the default role policy and sequential
    /// numbering. The usual entry point for tests and dev.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(StockLedger::new()),
            Arc::new(ApprovalGate::default()),
            Arc::new(SequentialNumbering::new()),
        )
    }
}
