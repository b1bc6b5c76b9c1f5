use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Amount, Batch, FeeRecord, RecordId, Student, clamp_due, percentage};

/// Where a student stands against their batch fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    /// Owes nothing against a non-zero fee
    Clear,
    /// Still owes part of the fee
    Due,
    /// Batch fee is zero or unknown; counted as neither clear nor due
    NoFee,
}

impl Standing {
    pub fn of(expected: Amount, due: Amount) -> Self {
        if expected <= 0.0 {
            Standing::NoFee
        } else if due <= 0.0 {
            Standing::Clear
        } else {
            Standing::Due
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Standing::Clear => "clear",
            Standing::Due => "due",
            Standing::NoFee => "no-fee",
        }
    }
}

impl std::fmt::Display for Standing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Headline fee figures derived from the fee, student and batch collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub total_expected_fees: Amount,
    /// Every recorded payment, including those of students no longer on the books.
    pub total_paid: Amount,
    pub total_due: Amount,
    pub clear_count: usize,
    pub due_count: usize,
    /// Due per student; only students assigned to a batch appear.
    pub student_dues: BTreeMap<RecordId, Amount>,
    /// Portion of `total_paid` whose fee record does not resolve to a student.
    pub orphaned_paid: Amount,
}

impl FinancialSummary {
    /// Share of the expected fees already collected, in percent.
    pub fn collection_rate(&self) -> f64 {
        percentage(
            self.total_expected_fees - self.total_due,
            self.total_expected_fees,
        )
    }

    /// Payments attributable to students that still exist.
    pub fn known_paid(&self) -> Amount {
        self.total_paid - self.orphaned_paid
    }
}

/// Flat fee per batch id. Duplicate ids resolve to the last batch listed.
pub fn batch_fee_index(batches: &[Batch]) -> HashMap<&RecordId, Amount> {
    batches.iter().map(|b| (&b.id, b.fees)).collect()
}

/// Total paid per student id across all of that student's fee records.
/// Records without a student reference are left out of the index.
pub fn student_paid_index(fees: &[FeeRecord]) -> HashMap<&RecordId, Amount> {
    let mut paid: HashMap<&RecordId, Amount> = HashMap::new();
    for record in fees {
        if let Some(student_id) = &record.student_id {
            *paid.entry(student_id).or_insert(0.0) += record.paid_amount;
        }
    }
    paid
}

/// Compute the financial summary over one snapshot of the three collections.
///
/// Never fails: a missing batch contributes a zero fee, a missing student
/// simply has no due, and payments of unknown students still count toward
/// `total_paid`.
pub fn aggregate(
    fees: &[FeeRecord],
    students: &[Student],
    batches: &[Batch],
) -> FinancialSummary {
    let batch_fee = batch_fee_index(batches);
    let student_paid = student_paid_index(fees);

    let mut summary = FinancialSummary::default();

    for student in students {
        let Some(batch_id) = &student.batch_id else {
            continue;
        };

        let expected = batch_fee.get(batch_id).copied().unwrap_or(0.0);
        let paid = student_paid.get(&student.id).copied().unwrap_or(0.0);
        let due = clamp_due(expected, paid);

        summary.total_expected_fees += expected;
        summary.total_due += due;

        match Standing::of(expected, due) {
            Standing::Clear => summary.clear_count += 1,
            Standing::Due => summary.due_count += 1,
            Standing::NoFee => {}
        }

        summary.student_dues.insert(student.id.clone(), due);
    }

    let known: HashSet<&RecordId> = students.iter().map(|s| &s.id).collect();
    for record in fees {
        summary.total_paid += record.paid_amount;
        let resolves = record
            .student_id
            .as_ref()
            .is_some_and(|id| known.contains(id));
        if !resolves {
            summary.orphaned_paid += record.paid_amount;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> (Vec<FeeRecord>, Vec<Student>, Vec<Batch>) {
        let batches = vec![Batch::new("b1", "Morning JEE", 1000.0)];
        let students = vec![
            Student::new("s1", "Asha").with_batch("b1"),
            Student::new("s2", "Bilal").with_batch("b1"),
            Student::new("s3", "Chitra"),
        ];
        let fees = vec![
            FeeRecord::new("s1", 1000.0),
            FeeRecord::new("s2", 400.0),
            FeeRecord::new("s4", 50.0),
        ];
        (fees, students, batches)
    }

    #[test]
    fn test_scenario() {
        let (fees, students, batches) = scenario();
        let summary = aggregate(&fees, &students, &batches);

        assert_eq!(summary.total_expected_fees, 2000.0);
        assert_eq!(summary.total_paid, 1450.0);
        assert_eq!(summary.total_due, 600.0);
        assert_eq!(summary.clear_count, 1);
        assert_eq!(summary.due_count, 1);
        assert_eq!(summary.student_dues.len(), 2);
        assert_eq!(summary.student_dues[&RecordId::from("s1")], 0.0);
        assert_eq!(summary.student_dues[&RecordId::from("s2")], 600.0);
        assert_eq!(summary.orphaned_paid, 50.0);
        assert_eq!(summary.known_paid(), 1400.0);
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregate(&[], &[], &[]);
        assert_eq!(summary, FinancialSummary::default());
        assert!(summary.student_dues.is_empty());
        assert_eq!(summary.collection_rate(), 0.0);
    }

    #[test]
    fn test_missing_batch_contributes_nothing() {
        let students = vec![Student::new("s1", "Asha").with_batch("gone")];
        let fees = vec![FeeRecord::new("s1", 300.0)];

        let summary = aggregate(&fees, &students, &[]);

        assert_eq!(summary.total_expected_fees, 0.0);
        assert_eq!(summary.total_due, 0.0);
        assert_eq!(summary.clear_count + summary.due_count, 0);
        assert_eq!(summary.student_dues[&RecordId::from("s1")], 0.0);
        assert_eq!(summary.total_paid, 300.0);
    }

    #[test]
    fn test_multiple_records_per_student_accumulate() {
        let batches = vec![Batch::new("b1", "Evening", 1000.0)];
        let students = vec![Student::new("s1", "Asha").with_batch("b1")];
        let fees = vec![FeeRecord::new("s1", 300.0), FeeRecord::new("s1", 450.0)];

        let summary = aggregate(&fees, &students, &batches);

        assert_eq!(summary.student_dues[&RecordId::from("s1")], 250.0);
        assert_eq!(summary.due_count, 1);
    }

    #[test]
    fn test_fee_record_without_student_still_counts_as_paid() {
        let mut record = FeeRecord::new("ignored", 75.0);
        record.student_id = None;

        let summary = aggregate(&[record], &[], &[]);

        assert_eq!(summary.total_paid, 75.0);
        assert_eq!(summary.orphaned_paid, 75.0);
    }

    #[test]
    fn test_collection_rate() {
        let (fees, students, batches) = scenario();
        let summary = aggregate(&fees, &students, &batches);
        assert_eq!(summary.collection_rate(), 70.0);
    }

    #[test]
    fn test_standing() {
        assert_eq!(Standing::of(0.0, 0.0), Standing::NoFee);
        assert_eq!(Standing::of(1000.0, 0.0), Standing::Clear);
        assert_eq!(Standing::of(1000.0, 1.0), Standing::Due);
    }

    #[test]
    fn test_standing_display_honors_width() {
        assert_eq!(format!("{:<8}|", Standing::Due), "due     |");
        assert_eq!(format!("{}", Standing::NoFee), "no-fee");
    }
}
