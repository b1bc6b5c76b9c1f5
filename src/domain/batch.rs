use serde::{Deserialize, Serialize};

use super::{Amount, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Classes are running
    Active,
    /// Course finished; fees may still be outstanding
    Completed,
    /// Missing or unrecognized status from the backend
    Unknown,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Completed => "completed",
            BatchStatus::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(BatchStatus::Active),
            "completed" => Some(BatchStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A teaching batch. Every student in it owes the same flat `fees`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: RecordId,
    pub name: String,
    pub course: Option<String>,
    pub fees: Amount,
    pub status: BatchStatus,
}

impl Batch {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, fees: Amount) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            course: None,
            fees,
            status: BatchStatus::Active,
        }
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    pub fn with_status(mut self, status: BatchStatus) -> Self {
        self.status = status;
        self
    }
}
