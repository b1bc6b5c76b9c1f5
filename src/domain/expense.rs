use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, RecordId};

/// Category used for expenses the backend served without one.
pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Option<RecordId>,
    pub title: String,
    pub category: Option<String>,
    pub amount: Amount,
    pub date: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl Expense {
    pub fn new(title: impl Into<String>, amount: Amount) -> Self {
        Self {
            id: None,
            title: title.into(),
            category: None,
            amount,
            date: None,
            note: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }
}
