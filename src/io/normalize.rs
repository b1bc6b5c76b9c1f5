//! Boundary between raw backend JSON and typed records.
//!
//! The backend is an independently evolving service: fields go missing,
//! ids arrive as numbers or populated objects, statuses change casing and
//! amounts come back as strings. All of that is absorbed here, once, so
//! the aggregation code downstream only ever sees well-formed records.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{
    Amount, Batch, BatchStatus, Expense, FeeRecord, FeeStatus, PaymentEntry, RecordId, Student,
    StudentStatus, coerce_amount,
};

type Object = Map<String, Value>;

/// Records that survived normalization plus a count of the ones dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

/// Locate the array of records inside a list response.
///
/// Accepts a bare array or an object wrapping it under `data`, `items`,
/// `results` or the collection's own name. Anything else yields no records.
pub fn collection_items<'a>(value: &'a Value, collection: &str) -> &'a [Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => {
            for key in [collection, "data", "items", "results"] {
                match obj.get(key) {
                    Some(Value::Array(items)) => return items.as_slice(),
                    Some(nested @ Value::Object(_)) => {
                        let items = collection_items(nested, collection);
                        if !items.is_empty() {
                            return items;
                        }
                    }
                    _ => {}
                }
            }
            warn!(collection, "response object holds no record array");
            &[]
        }
        Value::Null => &[],
        _ => {
            warn!(collection, "response is neither an array nor an object");
            &[]
        }
    }
}

pub fn normalize_fees(value: &Value) -> Normalized<FeeRecord> {
    normalize_with(value, "fees", |obj| Some(fee_record(obj)))
}

pub fn normalize_students(value: &Value) -> Normalized<Student> {
    normalize_with(value, "students", student)
}

pub fn normalize_batches(value: &Value) -> Normalized<Batch> {
    normalize_with(value, "batches", batch)
}

pub fn normalize_expenses(value: &Value) -> Normalized<Expense> {
    normalize_with(value, "expenses", |obj| Some(expense(obj)))
}

fn normalize_with<T>(
    value: &Value,
    collection: &str,
    convert: impl Fn(&Object) -> Option<T>,
) -> Normalized<T> {
    let items = collection_items(value, collection);
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for (index, item) in items.iter().enumerate() {
        let converted = item.as_object().and_then(&convert);
        match converted {
            Some(record) => records.push(record),
            None => {
                warn!(collection, index, "skipping malformed record");
                skipped += 1;
            }
        }
    }

    debug!(collection, kept = records.len(), skipped, "normalized collection");
    Normalized { records, skipped }
}

fn fee_record(obj: &Object) -> FeeRecord {
    let payments = match field(obj, &["payments"]) {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_object)
            .map(payment_entry)
            .collect(),
        _ => Vec::new(),
    };

    FeeRecord {
        id: id_field(obj, &["id", "_id"]),
        student_id: id_field(obj, &["studentId", "student_id", "student"]),
        batch_id: id_field(obj, &["batchId", "batch_id", "batch"]),
        fees: amount_field(obj, &["fees"]),
        paid_amount: amount_field(obj, &["paidAmount", "paid_amount"]),
        payment_method: text_field(obj, &["paymentMethod", "payment_method"]),
        status: text_field(obj, &["status"])
            .and_then(|s| FeeStatus::from_str(&s))
            .unwrap_or(FeeStatus::Unknown),
        payments,
    }
}

fn payment_entry(obj: &Object) -> PaymentEntry {
    PaymentEntry {
        amount: amount_field(obj, &["amount"]),
        date: date_field(obj, &["date", "paidAt", "paid_at", "createdAt"]),
        method: text_field(obj, &["method", "paymentMethod", "payment_method"]),
        note: text_field(obj, &["note"]),
    }
}

fn student(obj: &Object) -> Option<Student> {
    let id = id_field(obj, &["id", "_id"])?;
    Some(Student {
        name: text_field(obj, &["name"]).unwrap_or_default(),
        phone: text_field(obj, &["phone"]),
        batch_id: id_field(obj, &["batchId", "batch_id", "batch"]),
        status: text_field(obj, &["status"])
            .and_then(|s| StudentStatus::from_str(&s))
            .unwrap_or(StudentStatus::Unknown),
        id,
    })
}

fn batch(obj: &Object) -> Option<Batch> {
    let id = id_field(obj, &["id", "_id"])?;
    Some(Batch {
        name: text_field(obj, &["name"]).unwrap_or_else(|| id.to_string()),
        course: text_field(obj, &["course"]),
        fees: amount_field(obj, &["fees"]),
        status: text_field(obj, &["status"])
            .and_then(|s| BatchStatus::from_str(&s))
            .unwrap_or(BatchStatus::Unknown),
        id,
    })
}

fn expense(obj: &Object) -> Expense {
    Expense {
        id: id_field(obj, &["id", "_id"]),
        title: text_field(obj, &["title", "name", "description"]).unwrap_or_default(),
        category: text_field(obj, &["category"]),
        amount: amount_field(obj, &["amount"]),
        date: date_field(obj, &["date", "expenseDate", "expense_date"]),
        note: text_field(obj, &["note"]),
    }
}

/// First of `keys` present with a non-null value.
fn field<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn amount_field(obj: &Object, keys: &[&str]) -> Amount {
    field(obj, keys).map(coerce_amount).unwrap_or(0.0)
}

fn id_field(obj: &Object, keys: &[&str]) -> Option<RecordId> {
    field(obj, keys).and_then(coerce_id)
}

fn text_field(obj: &Object, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn date_field(obj: &Object, keys: &[&str]) -> Option<DateTime<Utc>> {
    match field(obj, keys)? {
        Value::String(s) => parse_date(s),
        _ => None,
    }
}

/// Resolve an id from a string, a number, or a populated reference object.
pub fn coerce_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| RecordId::new(s))
        }
        Value::Number(n) => Some(RecordId::new(n.to_string())),
        Value::Object(obj) => id_field(obj, &["_id", "id"]),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
