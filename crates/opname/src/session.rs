use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{
    Aggregate, AggregateRoot, Document, DocumentCode, DocumentId, DocumentType, DomainError,
    ItemId, UserId,
};

/// Opname session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpnameSessionStatus {
    Open,
    /// Finalized with every variance zero; no adjustment needed.
    Completed,
    /// Finalized with nonzero variances; a pending stock adjustment was
    /// spawned to carry them through the independent-approval workflow.
    CompletedWithAdjustment,
}

impl OpnameSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpnameSessionStatus::Open => "open",
            OpnameSessionStatus::Completed => "completed",
            OpnameSessionStatus::CompletedWithAdjustment => "completed_with_adjustment",
        }
    }
}

/// Counting sheet status.
///
/// A rejected sheet is reset to `Draft` with its counts and counter cleared,
/// ready for a fresh independent count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingSheetStatus {
    Draft,
    Counting,
    Submitted,
    Matched,
}

impl CountingSheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountingSheetStatus::Draft => "draft",
            CountingSheetStatus::Counting => "counting",
            CountingSheetStatus::Submitted => "submitted",
            CountingSheetStatus::Matched => "matched",
        }
    }
}

/// One counted-quantity slot on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetCount {
    pub item_id: ItemId,
    pub counted_qty: Option<i64>,
}

/// One independent counter's submission for a session.
///
/// Sheets for the same session stay independent until explicitly compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingSheet {
    pub sheet_no: u32,
    pub status: CountingSheetStatus,
    /// Attached at submission.
    pub counter: Option<UserId>,
    pub counts: Vec<SheetCount>,
}

impl CountingSheet {
    fn count_for(&self, item_id: ItemId) -> Option<i64> {
        self.counts
            .iter()
            .find(|c| c.item_id == item_id)
            .and_then(|c| c.counted_qty)
    }
}

/// Per-item audit record: the system quantity snapshot taken at session
/// start (never refreshed mid-session), later the reconciled final quantity
/// and its signed variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpnameCount {
    pub item_id: ItemId,
    pub qty_system: i64,
    pub qty_final: Option<i64>,
    pub variance: Option<i64>,
}

/// Per-item snapshot input at session open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInput {
    pub item_id: ItemId,
    pub qty_system: i64,
}

/// One line of a comparison mismatch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountMismatch {
    pub item_id: ItemId,
    pub counted_a: i64,
    pub counted_b: i64,
}

/// One line of the finalization variance list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpnameVariance {
    pub item_id: ItemId,
    pub qty_system: i64,
    pub qty_input: i64,
    pub qty_variance: i64,
}

/// Aggregate root: OpnameSession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpnameSession {
    id: DocumentId,
    code: DocumentCode,
    status: OpnameSessionStatus,
    created_by: UserId,
    items: Vec<OpnameCount>,
    sheets: Vec<CountingSheet>,
    note: Option<String>,
    finalized_by: Option<UserId>,
    finalized_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl OpnameSession {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            code: DocumentCode::new(""),
            status: OpnameSessionStatus::Open,
            created_by: UserId::nil(),
            items: Vec::new(),
            sheets: Vec::new(),
            note: None,
            finalized_by: None,
            finalized_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> OpnameSessionStatus {
        self.status
    }

    pub fn items(&self) -> &[OpnameCount] {
        &self.items
    }

    pub fn sheets(&self) -> &[CountingSheet] {
        &self.sheets
    }

    pub fn sheet(&self, sheet_no: u32) -> Option<&CountingSheet> {
        self.sheets.iter().find(|s| s.sheet_no == sheet_no)
    }
}

impl AggregateRoot for OpnameSession {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Document for OpnameSession {
    fn document_id(&self) -> DocumentId {
        self.id
    }

    fn document_type(&self) -> DocumentType {
        DocumentType::StockOpname
    }

    fn code(&self) -> &DocumentCode {
        &self.code
    }

    fn created_by(&self) -> UserId {
        self.created_by
    }
}

/// Command: OpenSession. Items carry the one-time system-quantity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSession {
    pub session_id: DocumentId,
    pub code: DocumentCode,
    pub created_by: UserId,
    pub items: Vec<SnapshotInput>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddSheet — opens a fresh independent counting sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSheet {
    pub session_id: DocumentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCount — saves one counted quantity on a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub session_id: DocumentId,
    pub sheet_no: u32,
    pub item_id: ItemId,
    pub counted_qty: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitSheet — every audited item counted, counter attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitSheet {
    pub session_id: DocumentId,
    pub sheet_no: u32,
    pub counter: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompareSheets — line-by-line comparison of two submitted sheets.
///
/// All lines equal moves both sheets to `Matched`. Any mismatch produces a
/// report and changes nothing: the engine never auto-resolves a
/// disagreement, the operator must reject one or both sheets for a recount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareSheets {
    pub session_id: DocumentId,
    pub sheet_a: u32,
    pub sheet_b: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectSheet — resets a submitted sheet to `Draft`, clearing its
/// counts and counter for a fresh independent count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectSheet {
    pub session_id: DocumentId,
    pub sheet_no: u32,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Finalize — compares a matched sheet's counts against the session
/// snapshot, producing the variance list. Stock itself is untouched; nonzero
/// variances travel through a separately-approved stock adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalize {
    pub session_id: DocumentId,
    pub finalized_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpnameSessionCommand {
    OpenSession(OpenSession),
    AddSheet(AddSheet),
    RecordCount(RecordCount),
    SubmitSheet(SubmitSheet),
    CompareSheets(CompareSheets),
    RejectSheet(RejectSheet),
    Finalize(Finalize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpnameSessionEvent {
    SessionOpened {
        session_id: DocumentId,
        code: DocumentCode,
        created_by: UserId,
        items: Vec<SnapshotInput>,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    SheetAdded {
        session_id: DocumentId,
        sheet_no: u32,
        occurred_at: DateTime<Utc>,
    },
    CountRecorded {
        session_id: DocumentId,
        sheet_no: u32,
        item_id: ItemId,
        counted_qty: i64,
        occurred_at: DateTime<Utc>,
    },
    SheetSubmitted {
        session_id: DocumentId,
        sheet_no: u32,
        counter: UserId,
        occurred_at: DateTime<Utc>,
    },
    SheetsMatched {
        session_id: DocumentId,
        sheet_a: u32,
        sheet_b: u32,
        occurred_at: DateTime<Utc>,
    },
    /// Audit record of a failed comparison; sheet states are unchanged.
    SheetsMismatched {
        session_id: DocumentId,
        sheet_a: u32,
        sheet_b: u32,
        mismatches: Vec<CountMismatch>,
        occurred_at: DateTime<Utc>,
    },
    SheetRejected {
        session_id: DocumentId,
        sheet_no: u32,
        rejected_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    SessionFinalized {
        session_id: DocumentId,
        finalized_by: UserId,
        variances: Vec<OpnameVariance>,
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for OpnameSession {
    type Command = OpnameSessionCommand;
    type Event = OpnameSessionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OpnameSessionEvent::SessionOpened {
                session_id,
                code,
                created_by,
                items,
                note,
                ..
            } => {
                self.id = *session_id;
                self.code = code.clone();
                self.created_by = *created_by;
                self.note = note.clone();
                self.status = OpnameSessionStatus::Open;
                self.items = items
                    .iter()
                    .map(|s| OpnameCount {
                        item_id: s.item_id,
                        qty_system: s.qty_system,
                        qty_final: None,
                        variance: None,
                    })
                    .collect();
                self.sheets.clear();
                self.created = true;
            }
            OpnameSessionEvent::SheetAdded { sheet_no, .. } => {
                self.sheets.push(CountingSheet {
                    sheet_no: *sheet_no,
                    status: CountingSheetStatus::Draft,
                    counter: None,
                    counts: self
                        .items
                        .iter()
                        .map(|i| SheetCount {
                            item_id: i.item_id,
                            counted_qty: None,
                        })
                        .collect(),
                });
            }
            OpnameSessionEvent::CountRecorded {
                sheet_no,
                item_id,
                counted_qty,
                ..
            } => {
                if let Some(sheet) = self.sheets.iter_mut().find(|s| s.sheet_no == *sheet_no) {
                    if let Some(slot) = sheet.counts.iter_mut().find(|c| c.item_id == *item_id) {
                        slot.counted_qty = Some(*counted_qty);
                    }
                    sheet.status = CountingSheetStatus::Counting;
                }
            }
            OpnameSessionEvent::SheetSubmitted {
                sheet_no, counter, ..
            } => {
                if let Some(sheet) = self.sheets.iter_mut().find(|s| s.sheet_no == *sheet_no) {
                    sheet.status = CountingSheetStatus::Submitted;
                    sheet.counter = Some(*counter);
                }
            }
            OpnameSessionEvent::SheetsMatched { sheet_a, sheet_b, .. } => {
                for sheet in self.sheets.iter_mut() {
                    if sheet.sheet_no == *sheet_a || sheet.sheet_no == *sheet_b {
                        sheet.status = CountingSheetStatus::Matched;
                    }
                }
            }
            OpnameSessionEvent::SheetsMismatched { .. } => {
                // Recorded for audit; no state change. The operator decides
                // which sheet(s) to reject for a recount.
            }
            OpnameSessionEvent::SheetRejected { sheet_no, .. } => {
                if let Some(sheet) = self.sheets.iter_mut().find(|s| s.sheet_no == *sheet_no) {
                    sheet.status = CountingSheetStatus::Draft;
                    sheet.counter = None;
                    for slot in sheet.counts.iter_mut() {
                        slot.counted_qty = None;
                    }
                }
            }
            OpnameSessionEvent::SessionFinalized {
                finalized_by,
                variances,
                occurred_at,
                ..
            } => {
                let mut any_nonzero = false;
                for variance in variances {
                    if let Some(item) = self
                        .items
                        .iter_mut()
                        .find(|i| i.item_id == variance.item_id)
                    {
                        item.qty_final = Some(variance.qty_input);
                        item.variance = Some(variance.qty_variance);
                    }
                    if variance.qty_variance != 0 {
                        any_nonzero = true;
                    }
                }
                self.status = if any_nonzero {
                    OpnameSessionStatus::CompletedWithAdjustment
                } else {
                    OpnameSessionStatus::Completed
                };
                self.finalized_by = Some(*finalized_by);
                self.finalized_at = Some(*occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OpnameSessionCommand::OpenSession(cmd) => self.handle_open(cmd),
            OpnameSessionCommand::AddSheet(cmd) => self.handle_add_sheet(cmd),
            OpnameSessionCommand::RecordCount(cmd) => self.handle_record_count(cmd),
            OpnameSessionCommand::SubmitSheet(cmd) => self.handle_submit_sheet(cmd),
            OpnameSessionCommand::CompareSheets(cmd) => self.handle_compare(cmd),
            OpnameSessionCommand::RejectSheet(cmd) => self.handle_reject_sheet(cmd),
            OpnameSessionCommand::Finalize(cmd) => self.handle_finalize(cmd),
        }
    }
}

impl OpnameSession {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_session_id(&self, session_id: DocumentId) -> Result<(), DomainError> {
        if self.id != session_id {
            return Err(DomainError::conflict("session_id mismatch"));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.status != OpnameSessionStatus::Open {
            return Err(DomainError::validation(format!(
                "session is {}, no further counting operations allowed",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn sheet_or_not_found(&self, sheet_no: u32) -> Result<&CountingSheet, DomainError> {
        self.sheet(sheet_no).ok_or(DomainError::NotFound)
    }

    fn handle_open(&self, cmd: &OpenSession) -> Result<Vec<OpnameSessionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("opname session already exists"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "an opname session must audit at least one item",
            ));
        }
        for (i, snapshot) in cmd.items.iter().enumerate() {
            if snapshot.qty_system < 0 {
                return Err(DomainError::quantity("system quantity cannot be negative"));
            }
            if cmd.items[..i].iter().any(|s| s.item_id == snapshot.item_id) {
                return Err(DomainError::validation(format!(
                    "item {} audited twice in one session",
                    snapshot.item_id
                )));
            }
        }

        Ok(vec![OpnameSessionEvent::SessionOpened {
            session_id: cmd.session_id,
            code: cmd.code.clone(),
            created_by: cmd.created_by,
            items: cmd.items.clone(),
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_sheet(&self, cmd: &AddSheet) -> Result<Vec<OpnameSessionEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_open()?;

        let next_sheet_no = self.sheets.iter().map(|s| s.sheet_no).max().unwrap_or(0) + 1;
        Ok(vec![OpnameSessionEvent::SheetAdded {
            session_id: cmd.session_id,
            sheet_no: next_sheet_no,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_record_count(
        &self,
        cmd: &RecordCount,
    ) -> Result<Vec<OpnameSessionEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_open()?;

        let sheet = self.sheet_or_not_found(cmd.sheet_no)?;
        let accepting = matches!(
            sheet.status,
            CountingSheetStatus::Draft | CountingSheetStatus::Counting
        );
        if !accepting {
            return Err(DomainError::invalid_transition(
                sheet.status.as_str(),
                CountingSheetStatus::Counting.as_str(),
            ));
        }
        if !self.items.iter().any(|i| i.item_id == cmd.item_id) {
            return Err(DomainError::validation(format!(
                "item {} is not under audit in this session",
                cmd.item_id
            )));
        }
        if cmd.counted_qty < 0 {
            return Err(DomainError::quantity("counted quantity cannot be negative"));
        }

        Ok(vec![OpnameSessionEvent::CountRecorded {
            session_id: cmd.session_id,
            sheet_no: cmd.sheet_no,
            item_id: cmd.item_id,
            counted_qty: cmd.counted_qty,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_submit_sheet(
        &self,
        cmd: &SubmitSheet,
    ) -> Result<Vec<OpnameSessionEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_open()?;

        let sheet = self.sheet_or_not_found(cmd.sheet_no)?;
        if sheet.status != CountingSheetStatus::Counting {
            return Err(DomainError::invalid_transition(
                sheet.status.as_str(),
                CountingSheetStatus::Submitted.as_str(),
            ));
        }
        let uncounted = sheet
            .counts
            .iter()
            .filter(|c| c.counted_qty.is_none())
            .count();
        if uncounted > 0 {
            return Err(DomainError::validation(format!(
                "sheet {} still has {} uncounted item(s)",
                cmd.sheet_no, uncounted
            )));
        }

        Ok(vec![OpnameSessionEvent::SheetSubmitted {
            session_id: cmd.session_id,
            sheet_no: cmd.sheet_no,
            counter: cmd.counter,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_compare(&self, cmd: &CompareSheets) -> Result<Vec<OpnameSessionEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_open()?;

        if cmd.sheet_a == cmd.sheet_b {
            return Err(DomainError::validation(
                "a sheet cannot be compared with itself",
            ));
        }
        let a = self.sheet_or_not_found(cmd.sheet_a)?;
        let b = self.sheet_or_not_found(cmd.sheet_b)?;
        for sheet in [a, b] {
            if sheet.status != CountingSheetStatus::Submitted {
                return Err(DomainError::validation(format!(
                    "sheet {} is {}, only submitted sheets can be compared",
                    sheet.sheet_no,
                    sheet.status.as_str()
                )));
            }
        }

        let mut mismatches = Vec::new();
        for item in &self.items {
            // Submitted sheets have every slot counted.
            let counted_a = a.count_for(item.item_id).unwrap_or(0);
            let counted_b = b.count_for(item.item_id).unwrap_or(0);
            if counted_a != counted_b {
                mismatches.push(CountMismatch {
                    item_id: item.item_id,
                    counted_a,
                    counted_b,
                });
            }
        }

        if mismatches.is_empty() {
            Ok(vec![OpnameSessionEvent::SheetsMatched {
                session_id: cmd.session_id,
                sheet_a: cmd.sheet_a,
                sheet_b: cmd.sheet_b,
                occurred_at: cmd.occurred_at,
            }])
        } else {
            Ok(vec![OpnameSessionEvent::SheetsMismatched {
                session_id: cmd.session_id,
                sheet_a: cmd.sheet_a,
                sheet_b: cmd.sheet_b,
                mismatches,
                occurred_at: cmd.occurred_at,
            }])
        }
    }

    fn handle_reject_sheet(
        &self,
        cmd: &RejectSheet,
    ) -> Result<Vec<OpnameSessionEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_open()?;

        let sheet = self.sheet_or_not_found(cmd.sheet_no)?;
        if sheet.status != CountingSheetStatus::Submitted {
            return Err(DomainError::invalid_transition(
                sheet.status.as_str(),
                CountingSheetStatus::Draft.as_str(),
            ));
        }

        Ok(vec![OpnameSessionEvent::SheetRejected {
            session_id: cmd.session_id,
            sheet_no: cmd.sheet_no,
            rejected_by: cmd.rejected_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_finalize(&self, cmd: &Finalize) -> Result<Vec<OpnameSessionEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_open()?;

        let matched = self
            .sheets
            .iter()
            .find(|s| s.status == CountingSheetStatus::Matched)
            .ok_or_else(|| {
                DomainError::validation(
                    "finalization requires a matched counting sheet: no single count is \
                     trusted without independent corroboration",
                )
            })?;

        let mut variances = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let qty_input = matched.count_for(item.item_id).unwrap_or(0);
            variances.push(OpnameVariance {
                item_id: item.item_id,
                qty_system: item.qty_system,
                qty_input,
                qty_variance: qty_input - item.qty_system,
            });
        }

        Ok(vec![OpnameSessionEvent::SessionFinalized {
            session_id: cmd.session_id,
            finalized_by: cmd.finalized_by,
            variances,
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

    fn open_session(snapshots: Vec<(ItemId, i64)>) -> (OpnameSession, DocumentId) {
        let session_id = DocumentId::new();
        let mut session = OpnameSession::empty(session_id);
        let events = session
            .handle(&OpnameSessionCommand::OpenSession(OpenSession {
                session_id,
                code: DocumentCode::new("SO-0001"),
                created_by: UserId::new(),
                items: snapshots
                    .into_iter()
                    .map(|(item_id, qty_system)| SnapshotInput { item_id, qty_system })
                    .collect(),
                note: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);
        (session, session_id)
    }

    fn add_sheet(session: &mut OpnameSession, session_id: DocumentId) -> u32 {
        let events = session
            .handle(&OpnameSessionCommand::AddSheet(AddSheet {
                session_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        let sheet_no = match &events[0] {
            OpnameSessionEvent::SheetAdded { sheet_no, .. } => *sheet_no,
            other => panic!("expected SheetAdded, got {other:?}"),
        };
        session.apply(&events[0]);
        sheet_no
    }

    fn count_and_submit(
        session: &mut OpnameSession,
        session_id: DocumentId,
        sheet_no: u32,
        counts: &[(ItemId, i64)],
    ) -> UserId {
        for (item_id, qty) in counts {
            let events = session
                .handle(&OpnameSessionCommand::RecordCount(RecordCount {
                    session_id,
                    sheet_no,
                    item_id: *item_id,
                    counted_qty: *qty,
                    occurred_at: test_time(),
                }))
                .unwrap();
            session.apply(&events[0]);
        }
        let counter = UserId::new();
        let events = session
            .handle(&OpnameSessionCommand::SubmitSheet(SubmitSheet {
                session_id,
                sheet_no,
                counter,
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);
        counter
    }

    #[test]
    fn agreeing_sheets_both_match() {
        let item = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item, 195)]);
        let s1 = add_sheet(&mut session, session_id);
        let s2 = add_sheet(&mut session, session_id);
        count_and_submit(&mut session, session_id, s1, &[(item, 200)]);
        count_and_submit(&mut session, session_id, s2, &[(item, 200)]);

        let events = session
            .handle(&OpnameSessionCommand::CompareSheets(CompareSheets {
                session_id,
                sheet_a: s1,
                sheet_b: s2,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(matches!(&events[0], OpnameSessionEvent::SheetsMatched { .. }));
        session.apply(&events[0]);
        assert_eq!(session.sheet(s1).unwrap().status, CountingSheetStatus::Matched);
        assert_eq!(session.sheet(s2).unwrap().status, CountingSheetStatus::Matched);
    }

    #[test]
    fn disagreeing_sheets_report_and_keep_their_states() {
        let item = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item, 195)]);
        let s1 = add_sheet(&mut session, session_id);
        let s2 = add_sheet(&mut session, session_id);
        count_and_submit(&mut session, session_id, s1, &[(item, 180)]);
        count_and_submit(&mut session, session_id, s2, &[(item, 185)]);

        let events = session
            .handle(&OpnameSessionCommand::CompareSheets(CompareSheets {
                session_id,
                sheet_a: s1,
                sheet_b: s2,
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            OpnameSessionEvent::SheetsMismatched { mismatches, .. } => {
                assert_eq!(mismatches.len(), 1);
                assert_eq!(mismatches[0].counted_a, 180);
                assert_eq!(mismatches[0].counted_b, 185);
            }
            other => panic!("expected SheetsMismatched, got {other:?}"),
        }
        session.apply(&events[0]);
        // The engine never auto-resolves: both sheets stay submitted.
        assert_eq!(session.sheet(s1).unwrap().status, CountingSheetStatus::Submitted);
        assert_eq!(session.sheet(s2).unwrap().status, CountingSheetStatus::Submitted);
    }

    #[test]
    fn rejecting_a_sheet_clears_counts_and_counter() {
        let item = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item, 195)]);
        let s1 = add_sheet(&mut session, session_id);
        let s2 = add_sheet(&mut session, session_id);
        count_and_submit(&mut session, session_id, s1, &[(item, 180)]);
        count_and_submit(&mut session, session_id, s2, &[(item, 185)]);

        let events = session
            .handle(&OpnameSessionCommand::RejectSheet(RejectSheet {
                session_id,
                sheet_no: s1,
                rejected_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);

        let rejected = session.sheet(s1).unwrap();
        assert_eq!(rejected.status, CountingSheetStatus::Draft);
        assert_eq!(rejected.counter, None);
        assert!(rejected.counts.iter().all(|c| c.counted_qty.is_none()));
        // The other sheet is untouched.
        assert_eq!(session.sheet(s2).unwrap().status, CountingSheetStatus::Submitted);
    }

    #[test]
    fn submit_requires_every_item_counted() {
        let item_a = ItemId::new();
        let item_b = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item_a, 10), (item_b, 20)]);
        let s1 = add_sheet(&mut session, session_id);

        let events = session
            .handle(&OpnameSessionCommand::RecordCount(RecordCount {
                session_id,
                sheet_no: s1,
                item_id: item_a,
                counted_qty: 10,
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);

        let err = session
            .handle(&OpnameSessionCommand::SubmitSheet(SubmitSheet {
                session_id,
                sheet_no: s1,
                counter: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn finalize_requires_a_matched_sheet() {
        let item = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item, 195)]);
        let s1 = add_sheet(&mut session, session_id);
        count_and_submit(&mut session, session_id, s1, &[(item, 200)]);

        let err = session
            .handle(&OpnameSessionCommand::Finalize(Finalize {
                session_id,
                finalized_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn finalize_compares_matched_count_against_snapshot() {
        let item = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item, 195)]);
        let s1 = add_sheet(&mut session, session_id);
        let s2 = add_sheet(&mut session, session_id);
        count_and_submit(&mut session, session_id, s1, &[(item, 200)]);
        count_and_submit(&mut session, session_id, s2, &[(item, 200)]);
        let events = session
            .handle(&OpnameSessionCommand::CompareSheets(CompareSheets {
                session_id,
                sheet_a: s1,
                sheet_b: s2,
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);

        let events = session
            .handle(&OpnameSessionCommand::Finalize(Finalize {
                session_id,
                finalized_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            OpnameSessionEvent::SessionFinalized { variances, .. } => {
                assert_eq!(variances.len(), 1);
                assert_eq!(variances[0].qty_system, 195);
                assert_eq!(variances[0].qty_input, 200);
                assert_eq!(variances[0].qty_variance, 5);
            }
            other => panic!("expected SessionFinalized, got {other:?}"),
        }
        session.apply(&events[0]);
        assert_eq!(session.status(), OpnameSessionStatus::CompletedWithAdjustment);
        assert_eq!(session.items()[0].qty_final, Some(200));
        assert_eq!(session.items()[0].variance, Some(5));
    }

    #[test]
    fn zero_variance_finalizes_without_adjustment() {
        let item = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item, 200)]);
        let s1 = add_sheet(&mut session, session_id);
        let s2 = add_sheet(&mut session, session_id);
        count_and_submit(&mut session, session_id, s1, &[(item, 200)]);
        count_and_submit(&mut session, session_id, s2, &[(item, 200)]);
        let events = session
            .handle(&OpnameSessionCommand::CompareSheets(CompareSheets {
                session_id,
                sheet_a: s1,
                sheet_b: s2,
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);

        let events = session
            .handle(&OpnameSessionCommand::Finalize(Finalize {
                session_id,
                finalized_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        session.apply(&events[0]);
        assert_eq!(session.status(), OpnameSessionStatus::Completed);
    }

    #[test]
    fn finalized_session_refuses_further_operations() {
        let item = ItemId::new();
        let (mut session, session_id) = open_session(vec![(item, 200)]);
        let s1 = add_sheet(&mut session, session_id);
        let s2 = add_sheet(&mut session, session_id);
        count_and_submit(&mut session, session_id, s1, &[(item, 200)]);
        count_and_submit(&mut session, session_id, s2, &[(item, 200)]);
        for command in [
            OpnameSessionCommand::CompareSheets(CompareSheets {
                session_id,
                sheet_a: s1,
                sheet_b: s2,
                occurred_at: test_time(),
            }),
            OpnameSessionCommand::Finalize(Finalize {
                session_id,
                finalized_by: UserId::new(),
                occurred_at: test_time(),
            }),
        ] {
            let events = session.handle(&command).unwrap();
            session.apply(&events[0]);
        }

        let err = session
            .handle(&OpnameSessionCommand::AddSheet(AddSheet {
                session_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
