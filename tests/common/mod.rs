// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use coachbook::application::FinanceService;
use coachbook::io::{RawSnapshot, Snapshot, SnapshotMeta};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Raw collections shaped like the coaching-center backend's responses.
pub struct BackendFixture;

impl BackendFixture {
    /// Two batches, four students (one without a batch, one in a deleted batch),
    /// fee records including an orphan and a stale status.
    pub fn center() -> RawSnapshot {
        RawSnapshot {
            batches: json!({"success": true, "data": [
                {"_id": "b1", "name": "JEE Morning", "course": "JEE", "fees": 12000, "status": "active"},
                {"_id": "b2", "name": "Foundation", "course": "Class 9", "fees": "8000", "status": "Completed"},
                {"_id": "b3", "name": "Demo Class", "fees": 0, "status": "active"}
            ]}),
            students: json!([
                {"_id": "s1", "name": "Asha Rao", "phone": "9800000001", "batchId": "b1", "status": "active"},
                {"_id": "s2", "name": "Bilal Khan", "phone": "9800000002", "batchId": {"_id": "b1", "name": "JEE Morning"}, "status": "Active"},
                {"_id": "s3", "name": "Chitra Iyer", "batchId": "b2", "status": "inactive"},
                {"_id": "s4", "name": "Dev Patel", "batchId": null},
                {"_id": "s5", "name": "Esha Nair", "batchId": "b9"},
                {"_id": "s6", "name": "Farhan Ali", "batchId": "b3"}
            ]),
            fees: json!([
                {
                    "_id": "f1", "studentId": "s1", "batchId": "b1", "fees": 12000,
                    "paidAmount": 12000, "paymentMethod": "upi", "status": "clear",
                    "payments": [
                        {"amount": 6000, "date": "2024-01-10"},
                        {"amount": 6000, "date": "2024-03-10"}
                    ]
                },
                {
                    "_id": "f2", "studentId": {"_id": "s2", "name": "Bilal Khan"}, "batchId": "b1",
                    "fees": 12000, "paidAmount": "5000", "status": "Clear",
                    "payments": [{"amount": 5000, "date": "2024-01-20T09:30:00Z"}]
                },
                {
                    "_id": "f3", "studentId": "s3", "batchId": "b2", "fees": 8000,
                    "paidAmount": 9000, "status": "clear",
                    "payments": [{"amount": 8000, "date": "2024-02-01"}]
                },
                {
                    "_id": "f4", "studentId": "s-deleted", "batchId": "b1", "fees": 12000,
                    "paidAmount": 2500, "status": "due",
                    "payments": [{"amount": 2500, "date": "2023-12-15"}]
                }
            ]),
            expenses: json!({"expenses": [
                {"_id": "e1", "title": "Rent", "category": "premises", "amount": 10000, "date": "2024-01-01"},
                {"_id": "e2", "title": "Markers", "category": "supplies", "amount": "450", "date": "2024-03-05"},
                {"_id": "e3", "title": "Projector repair", "amount": 1500}
            ]}),
            meta: SnapshotMeta {
                fetched_at: Some(parse_date("2024-03-31")),
                source: Some("http://localhost:5000/api".to_string()),
            },
        }
    }

    pub fn empty() -> RawSnapshot {
        RawSnapshot {
            fees: json!([]),
            students: json!([]),
            batches: json!([]),
            expenses: json!([]),
            meta: SnapshotMeta::default(),
        }
    }
}

/// Helper to build a service straight from raw collections.
pub fn service_from(raw: &RawSnapshot) -> FinanceService {
    FinanceService::new(raw.normalize())
}

/// Helper to write a raw snapshot into a temporary directory.
pub fn snapshot_dir(raw: &RawSnapshot) -> Result<TempDir> {
    let dir = TempDir::new()?;
    raw.save_dir(dir.path())?;
    Ok(dir)
}

/// Helper to write a single collection file, bypassing `RawSnapshot`.
pub fn write_collection(dir: &Path, file: &str, value: &Value) -> Result<()> {
    std::fs::write(dir.join(file), serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

/// Helper to load a snapshot directory.
pub fn load(dir: &Path) -> Result<Snapshot> {
    Ok(Snapshot::load_dir(dir)?)
}
