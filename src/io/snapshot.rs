use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::AppError;
use crate::domain::{Batch, Expense, FeeRecord, Student};

use super::normalize::{
    normalize_batches, normalize_expenses, normalize_fees, normalize_students,
};

pub const FEES_FILE: &str = "fees.json";
pub const STUDENTS_FILE: &str = "students.json";
pub const BATCHES_FILE: &str = "batches.json";
pub const EXPENSES_FILE: &str = "expenses.json";
pub const META_FILE: &str = "meta.json";

/// Where and when a snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub fetched_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

/// Collections exactly as the backend served them, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnapshot {
    pub fees: Value,
    pub students: Value,
    pub batches: Value,
    pub expenses: Value,
    pub meta: SnapshotMeta,
}

impl RawSnapshot {
    /// Read a snapshot directory. Fees, students and batches are required;
    /// expenses and metadata are optional.
    pub fn load_dir(dir: &Path) -> Result<Self, AppError> {
        let fees = read_json(&dir.join(FEES_FILE))?;
        let students = read_json(&dir.join(STUDENTS_FILE))?;
        let batches = read_json(&dir.join(BATCHES_FILE))?;

        let expenses = match read_json(&dir.join(EXPENSES_FILE)) {
            Ok(value) => value,
            Err(AppError::SnapshotFileMissing(path)) => {
                debug!(path = %path.display(), "no expenses in snapshot");
                Value::Array(Vec::new())
            }
            Err(e) => return Err(e),
        };

        let meta = match read_json(&dir.join(META_FILE)) {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("ignoring unreadable snapshot metadata: {}", e);
                SnapshotMeta::default()
            }),
            Err(AppError::SnapshotFileMissing(_)) => SnapshotMeta::default(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            fees,
            students,
            batches,
            expenses,
            meta,
        })
    }

    /// Write every collection plus `meta.json` into `dir`, creating it if needed.
    pub fn save_dir(&self, dir: &Path) -> Result<(), AppError> {
        fs::create_dir_all(dir)?;
        write_json(&dir.join(FEES_FILE), &self.fees)?;
        write_json(&dir.join(STUDENTS_FILE), &self.students)?;
        write_json(&dir.join(BATCHES_FILE), &self.batches)?;
        write_json(&dir.join(EXPENSES_FILE), &self.expenses)?;

        let meta = serde_json::to_value(&self.meta).map_err(std::io::Error::from)?;
        write_json(&dir.join(META_FILE), &meta)?;
        Ok(())
    }

    /// Run every collection through the normalization boundary.
    pub fn normalize(&self) -> Snapshot {
        let fees = normalize_fees(&self.fees);
        let students = normalize_students(&self.students);
        let batches = normalize_batches(&self.batches);
        let expenses = normalize_expenses(&self.expenses);

        let skipped = fees.skipped + students.skipped + batches.skipped + expenses.skipped;
        if skipped > 0 {
            warn!(skipped, "some backend records could not be used");
        }

        Snapshot {
            fees: fees.records,
            students: students.records,
            batches: batches.records,
            expenses: expenses.records,
            fetched_at: self.meta.fetched_at,
            skipped,
        }
    }
}

/// Typed, normalized view of the backend collections at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub fees: Vec<FeeRecord>,
    pub students: Vec<Student>,
    pub batches: Vec<Batch>,
    pub expenses: Vec<Expense>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Records dropped during normalization.
    pub skipped: usize,
}

impl Snapshot {
    pub fn new(fees: Vec<FeeRecord>, students: Vec<Student>, batches: Vec<Batch>) -> Self {
        Self {
            fees,
            students,
            batches,
            ..Self::default()
        }
    }

    pub fn with_expenses(mut self, expenses: Vec<Expense>) -> Self {
        self.expenses = expenses;
        self
    }

    /// Load and normalize a snapshot directory.
    pub fn load_dir(dir: &Path) -> Result<Self, AppError> {
        Ok(RawSnapshot::load_dir(dir)?.normalize())
    }
}

fn read_json(path: &Path) -> Result<Value, AppError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::SnapshotFileMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|source| AppError::InvalidSnapshot {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json(path: &Path, value: &Value) -> Result<(), AppError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(std::io::Error::from)?;
    writer.flush()?;
    Ok(())
}
