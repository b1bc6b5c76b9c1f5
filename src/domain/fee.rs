use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, RecordId};

/// Status the backend stores on a fee record. It is denormalized and may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Clear,
    Due,
    Unknown,
}

impl FeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeStatus::Clear => "clear",
            FeeStatus::Due => "due",
            FeeStatus::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "clear" => Some(FeeStatus::Clear),
            "due" => Some(FeeStatus::Due),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One payment posted against a fee record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub amount: Amount,
    pub date: Option<DateTime<Utc>>,
    pub method: Option<String>,
    pub note: Option<String>,
}

impl PaymentEntry {
    pub fn new(amount: Amount) -> Self {
        Self {
            amount,
            date: None,
            method: None,
            note: None,
        }
    }

    pub fn on(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

/// A student's fee ledger against one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub id: Option<RecordId>,
    /// `None` when the backend sent no usable reference; the payment still counts.
    pub student_id: Option<RecordId>,
    pub batch_id: Option<RecordId>,
    pub fees: Amount,
    /// Running total of `payments`, as denormalized by the backend.
    pub paid_amount: Amount,
    pub payment_method: Option<String>,
    pub status: FeeStatus,
    pub payments: Vec<PaymentEntry>,
}

impl FeeRecord {
    pub fn new(student_id: impl Into<RecordId>, paid_amount: Amount) -> Self {
        Self {
            id: None,
            student_id: Some(student_id.into()),
            batch_id: None,
            fees: 0.0,
            paid_amount,
            payment_method: None,
            status: FeeStatus::Unknown,
            payments: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: FeeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_payment(mut self, payment: PaymentEntry) -> Self {
        self.payments.push(payment);
        self
    }

    /// Sum of the individual payment entries.
    pub fn payments_total(&self) -> Amount {
        self.payments.iter().map(|p| p.amount).sum()
    }
}
