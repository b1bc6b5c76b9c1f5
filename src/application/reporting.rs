use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, BatchStatus, FeeStatus, RecordId, Standing};

/// Half-open time window: `from` inclusive, `to` exclusive. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at < to)
    }

    /// Undated entries only fall inside an unbounded range.
    pub fn contains_opt(&self, at: Option<DateTime<Utc>>) -> bool {
        match at {
            Some(at) => self.contains(at),
            None => self.is_unbounded(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: RecordId,
    pub name: String,
    pub course: Option<String>,
    pub status: BatchStatus,
    pub fee: Amount,
    pub student_count: usize,
    pub expected: Amount,
    pub paid: Amount,
    pub due: Amount,
    pub clear_count: usize,
    pub due_count: usize,
    pub collection_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batches: Vec<BatchSummary>,
    pub total_expected: Amount,
    pub total_due: Amount,
    /// Students not assigned to any batch.
    pub unassigned_students: usize,
    /// Students pointing at a batch the backend no longer has.
    pub unresolved_students: usize,
}

/// What one student owes against their batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDue {
    pub student_id: RecordId,
    pub name: String,
    pub phone: Option<String>,
    pub batch_id: RecordId,
    pub batch_name: String,
    pub expected: Amount,
    pub paid: Amount,
    pub due: Amount,
    pub standing: Standing,
    /// Status stored on the student's fee records; `Due` wins over `Clear`.
    pub recorded_status: Option<FeeStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DueFilter {
    /// Batch id or name (case-insensitive).
    pub batch: Option<String>,
    pub only_due: bool,
    pub min_due: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMismatch {
    pub fee_record_id: Option<RecordId>,
    pub student_id: RecordId,
    pub student_name: String,
    pub recorded: FeeStatus,
    pub computed: Standing,
    pub due: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMismatch {
    pub fee_record_id: Option<RecordId>,
    pub student_id: Option<RecordId>,
    pub paid_amount: Amount,
    pub payments_total: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanedFeeRecord {
    pub fee_record_id: Option<RecordId>,
    pub student_id: Option<RecordId>,
    pub paid_amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanglingBatchRef {
    pub student_id: RecordId,
    pub student_name: String,
    pub batch_id: RecordId,
}

/// Places where the backend's denormalized fields disagree with recomputed figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub status_mismatches: Vec<StatusMismatch>,
    pub payment_mismatches: Vec<PaymentMismatch>,
    pub orphaned_fee_records: Vec<OrphanedFeeRecord>,
    pub dangling_batch_refs: Vec<DanglingBatchRef>,
}

impl ReconciliationReport {
    pub fn issue_count(&self) -> usize {
        self.status_mismatches.len()
            + self.payment_mismatches.len()
            + self.orphaned_fee_records.len()
            + self.dangling_batch_refs.len()
    }

    pub fn is_consistent(&self) -> bool {
        self.issue_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub total: Amount,
    pub count: usize,
    pub average: Amount,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseReport {
    pub range: DateRange,
    pub categories: Vec<CategorySummary>,
    pub total: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitLossReport {
    pub range: DateRange,
    pub income: Amount,
    pub expenses: Amount,
    pub net: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowReport {
    pub range: DateRange,
    pub periods: Vec<CashFlowPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub inflow: Amount,
    pub outflow: Amount,
    pub net: Amount,
}
