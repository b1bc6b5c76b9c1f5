use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::domain::{
    AMOUNT_EPSILON, Amount, Batch, FeeStatus, FinancialSummary, RecordId, Standing, Student,
    aggregate, batch_fee_index, clamp_due, percentage, student_paid_index,
};
use crate::io::Snapshot;

use super::{
    BatchReport, BatchSummary, CashFlowPeriod, CashFlowReport, CategorySummary, DanglingBatchRef,
    DateRange, DueFilter, ExpenseReport, OrphanedFeeRecord, PaymentMismatch, ProfitLossReport,
    ReconciliationReport, StatusMismatch, StudentDue,
};

/// Report builder over one snapshot of the backend collections.
/// This is the primary interface for any client (CLI, export, tests).
pub struct FinanceService {
    snapshot: Snapshot,
}

/// A batch-assigned student's figures, shared by every per-student report.
struct Position<'a> {
    student: &'a Student,
    batch_id: &'a RecordId,
    batch: Option<&'a Batch>,
    expected: Amount,
    paid: Amount,
    due: Amount,
    standing: Standing,
}

impl FinanceService {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    // ========================
    // Fee operations
    // ========================

    /// Headline figures across all fee records, students and batches.
    pub fn summary(&self) -> FinancialSummary {
        aggregate(
            &self.snapshot.fees,
            &self.snapshot.students,
            &self.snapshot.batches,
        )
    }

    /// Per-batch breakdown of expected, paid and due fees.
    pub fn batch_report(&self) -> BatchReport {
        let positions = self.positions();

        let mut by_batch: HashMap<&RecordId, Vec<&Position>> = HashMap::new();
        let mut unresolved_students = 0;
        for position in &positions {
            if position.batch.is_some() {
                by_batch.entry(position.batch_id).or_default().push(position);
            } else {
                unresolved_students += 1;
            }
        }

        let mut batches: Vec<BatchSummary> = self
            .batch_index()
            .into_values()
            .map(|batch| {
                let members = by_batch.get(&batch.id).map(Vec::as_slice).unwrap_or(&[]);
                let expected: Amount = members.iter().map(|p| p.expected).sum();
                let due: Amount = members.iter().map(|p| p.due).sum();
                BatchSummary {
                    batch_id: batch.id.clone(),
                    name: batch.name.clone(),
                    course: batch.course.clone(),
                    status: batch.status,
                    fee: batch.fees,
                    student_count: members.len(),
                    expected,
                    paid: members.iter().map(|p| p.paid).sum(),
                    due,
                    clear_count: count_standing(members, Standing::Clear),
                    due_count: count_standing(members, Standing::Due),
                    collection_rate: percentage(expected - due, expected),
                }
            })
            .collect();

        batches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.batch_id.cmp(&b.batch_id)));

        BatchReport {
            total_expected: positions.iter().map(|p| p.expected).sum(),
            total_due: positions.iter().map(|p| p.due).sum(),
            unassigned_students: self
                .snapshot
                .students
                .iter()
                .filter(|s| s.batch_id.is_none())
                .count(),
            unresolved_students,
            batches,
        }
    }

    /// Per-student dues, largest first.
    pub fn student_dues(&self, filter: &DueFilter) -> Vec<StudentDue> {
        let recorded = self.recorded_statuses();

        let mut rows: Vec<StudentDue> = self
            .positions()
            .into_iter()
            .filter(|p| matches_batch(p, filter.batch.as_deref()))
            .filter(|p| !filter.only_due || p.standing == Standing::Due)
            .filter(|p| filter.min_due.is_none_or(|min| p.due >= min))
            .map(|p| StudentDue {
                student_id: p.student.id.clone(),
                name: p.student.name.clone(),
                phone: p.student.phone.clone(),
                batch_id: p.batch_id.clone(),
                batch_name: p
                    .batch
                    .map(|b| b.name.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                expected: p.expected,
                paid: p.paid,
                due: p.due,
                standing: p.standing,
                recorded_status: recorded.get(&p.student.id).copied(),
            })
            .collect();

        rows.sort_by(|a, b| b.due.total_cmp(&a.due).then_with(|| a.name.cmp(&b.name)));
        rows
    }

    // ========================
    // Integrity operations
    // ========================

    /// Compare the backend's stored statuses and totals against recomputed figures.
    pub fn reconcile(&self) -> ReconciliationReport {
        let positions = self.positions();
        let standing_of: HashMap<&RecordId, &Position> =
            positions.iter().map(|p| (&p.student.id, p)).collect();
        let known: HashSet<&RecordId> = self.snapshot.students.iter().map(|s| &s.id).collect();
        let batches = self.batch_index();

        let mut report = ReconciliationReport::default();

        for record in &self.snapshot.fees {
            if !record.payments.is_empty() {
                let payments_total = record.payments_total();
                if (payments_total - record.paid_amount).abs() > AMOUNT_EPSILON {
                    report.payment_mismatches.push(PaymentMismatch {
                        fee_record_id: record.id.clone(),
                        student_id: record.student_id.clone(),
                        paid_amount: record.paid_amount,
                        payments_total,
                    });
                }
            }

            let student_id = record.student_id.as_ref().filter(|id| known.contains(id));

            let Some(student_id) = student_id else {
                report.orphaned_fee_records.push(OrphanedFeeRecord {
                    fee_record_id: record.id.clone(),
                    student_id: record.student_id.clone(),
                    paid_amount: record.paid_amount,
                });
                continue;
            };

            if let Some(position) = standing_of.get(student_id) {
                let disagrees = matches!(
                    (record.status, position.standing),
                    (FeeStatus::Clear, Standing::Due) | (FeeStatus::Due, Standing::Clear)
                );
                if disagrees {
                    report.status_mismatches.push(StatusMismatch {
                        fee_record_id: record.id.clone(),
                        student_id: student_id.clone(),
                        student_name: position.student.name.clone(),
                        recorded: record.status,
                        computed: position.standing,
                        due: position.due,
                    });
                }
            }
        }

        for student in &self.snapshot.students {
            if let Some(batch_id) = &student.batch_id {
                if !batches.contains_key(batch_id) {
                    report.dangling_batch_refs.push(DanglingBatchRef {
                        student_id: student.id.clone(),
                        student_name: student.name.clone(),
                        batch_id: batch_id.clone(),
                    });
                }
            }
        }

        report
    }

    // ========================
    // Income & expense operations
    // ========================

    /// Expenses inside `range`, grouped by category, largest first.
    pub fn expense_report(&self, range: &DateRange) -> ExpenseReport {
        let mut groups: BTreeMap<&str, (Amount, usize)> = BTreeMap::new();
        for expense in &self.snapshot.expenses {
            if range.contains_opt(expense.date) {
                let entry = groups.entry(expense.category_or_default()).or_insert((0.0, 0));
                entry.0 += expense.amount;
                entry.1 += 1;
            }
        }

        let total: Amount = groups.values().map(|(amount, _)| amount).sum();
        let mut categories: Vec<CategorySummary> = groups
            .into_iter()
            .map(|(category, (amount, count))| CategorySummary {
                category: category.to_string(),
                total: amount,
                count,
                average: amount / count as f64,
                percentage: percentage(amount, total),
            })
            .collect();

        categories.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.category.cmp(&b.category))
        });

        ExpenseReport {
            range: *range,
            categories,
            total,
        }
    }

    /// Fees collected against expenses. Without a range, income is the
    /// headline `total_paid`; with one, it is the dated payments inside it.
    pub fn profit_loss(&self, range: &DateRange) -> ProfitLossReport {
        let income: Amount = if range.is_unbounded() {
            self.summary().total_paid
        } else {
            self.dated_payments()
                .filter(|(at, _)| range.contains(*at))
                .map(|(_, amount)| amount)
                .sum()
        };

        let expenses: Amount = self
            .snapshot
            .expenses
            .iter()
            .filter(|e| range.contains_opt(e.date))
            .map(|e| e.amount)
            .sum();

        ProfitLossReport {
            range: *range,
            income,
            expenses,
            net: income - expenses,
        }
    }

    /// Monthly inflow (payments) and outflow (expenses). Months without
    /// activity between the first and last dated entry are reported as zero.
    pub fn cash_flow(&self, range: &DateRange) -> CashFlowReport {
        let mut months: BTreeMap<(i32, u32), (Amount, Amount)> = BTreeMap::new();

        for (at, amount) in self.dated_payments().filter(|(at, _)| range.contains(*at)) {
            months.entry((at.year(), at.month())).or_default().0 += amount;
        }
        for expense in &self.snapshot.expenses {
            if let Some(at) = expense.date.filter(|at| range.contains(*at)) {
                months.entry((at.year(), at.month())).or_default().1 += expense.amount;
            }
        }

        let mut periods = Vec::new();
        let (Some(&first), Some(&last)) = (months.keys().next(), months.keys().next_back())
        else {
            return CashFlowReport {
                range: *range,
                periods,
            };
        };

        let mut key = first;
        while key <= last {
            let next = next_month(key);
            let (Some(period_start), Some(period_end)) = (month_start(key), month_start(next))
            else {
                break;
            };
            let (inflow, outflow) = months.get(&key).copied().unwrap_or_default();
            periods.push(CashFlowPeriod {
                period_start,
                period_end,
                inflow,
                outflow,
                net: inflow - outflow,
            });
            key = next;
        }

        CashFlowReport {
            range: *range,
            periods,
        }
    }

    // ========================
    // Helpers
    // ========================

    /// Batches by id; duplicate ids resolve to the last one listed.
    fn batch_index(&self) -> HashMap<&RecordId, &Batch> {
        self.snapshot.batches.iter().map(|b| (&b.id, b)).collect()
    }

    fn positions(&self) -> Vec<Position<'_>> {
        let batches = self.batch_index();
        let batch_fee = batch_fee_index(&self.snapshot.batches);
        let student_paid = student_paid_index(&self.snapshot.fees);

        self.snapshot
            .students
            .iter()
            .filter_map(|student| {
                let batch_id = student.batch_id.as_ref()?;
                let expected = batch_fee.get(batch_id).copied().unwrap_or(0.0);
                let paid = student_paid.get(&student.id).copied().unwrap_or(0.0);
                let due = clamp_due(expected, paid);
                Some(Position {
                    student,
                    batch_id,
                    batch: batches.get(batch_id).copied(),
                    expected,
                    paid,
                    due,
                    standing: Standing::of(expected, due),
                })
            })
            .collect()
    }

    /// Stored fee status per student; any `Due` record outweighs `Clear` ones.
    fn recorded_statuses(&self) -> HashMap<&RecordId, FeeStatus> {
        let mut statuses: HashMap<&RecordId, FeeStatus> = HashMap::new();
        for record in &self.snapshot.fees {
            let Some(student_id) = &record.student_id else {
                continue;
            };
            let current = statuses.get(student_id).copied();
            match (record.status, current) {
                (FeeStatus::Unknown, _) => {}
                (FeeStatus::Due, _) | (FeeStatus::Clear, None) => {
                    statuses.insert(student_id, record.status);
                }
                (FeeStatus::Clear, Some(_)) => {}
            }
        }
        statuses
    }

    fn dated_payments(&self) -> impl Iterator<Item = (DateTime<Utc>, Amount)> + '_ {
        self.snapshot
            .fees
            .iter()
            .flat_map(|record| record.payments.iter())
            .filter_map(|payment| payment.date.map(|at| (at, payment.amount)))
    }
}

fn count_standing(members: &[&Position], standing: Standing) -> usize {
    members.iter().filter(|p| p.standing == standing).count()
}

fn matches_batch(position: &Position, batch: Option<&str>) -> bool {
    let Some(wanted) = batch else {
        return true;
    };
    position.batch_id.as_str() == wanted
        || position
            .batch
            .is_some_and(|b| b.name.eq_ignore_ascii_case(wanted))
}

fn next_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn month_start((year, month): (i32, u32)) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::{Expense, FeeRecord, PaymentEntry};

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn service() -> FinanceService {
        let batches = vec![
            Batch::new("b1", "Morning JEE", 1000.0),
            Batch::new("b2", "Evening NEET", 0.0),
        ];
        let students = vec![
            Student::new("s1", "Asha").with_batch("b1"),
            Student::new("s2", "Bilal").with_batch("b1"),
            Student::new("s3", "Chitra").with_batch("b2"),
            Student::new("s5", "Dev").with_batch("gone"),
            Student::new("s6", "Esha"),
        ];
        let fees = vec![
            FeeRecord::new("s1", 1000.0)
                .with_status(FeeStatus::Clear)
                .with_payment(PaymentEntry::new(600.0).on(day(2024, 1, 10)))
                .with_payment(PaymentEntry::new(400.0).on(day(2024, 3, 2))),
            FeeRecord::new("s2", 400.0)
                .with_status(FeeStatus::Clear)
                .with_payment(PaymentEntry::new(300.0).on(day(2024, 1, 15))),
            FeeRecord::new("s4", 50.0),
        ];
        let expenses = vec![
            Expense::new("Rent", 500.0)
                .with_category("premises")
                .with_date(day(2024, 1, 1)),
            Expense::new("Markers", 20.0)
                .with_category("supplies")
                .with_date(day(2024, 3, 5)),
            Expense::new("Chalk", 10.0).with_category("supplies"),
        ];
        FinanceService::new(Snapshot::new(fees, students, batches).with_expenses(expenses))
    }

    #[test]
    fn test_batch_report_totals_match_summary() {
        let service = service();
        let report = service.batch_report();
        let summary = service.summary();

        assert_eq!(report.total_due, summary.total_due);
        assert_eq!(report.total_expected, summary.total_expected_fees);
        let batch_due: Amount = report.batches.iter().map(|b| b.due).sum();
        assert_eq!(batch_due, summary.total_due);

        assert_eq!(report.batches.len(), 2);
        let neet = &report.batches[0];
        assert_eq!(neet.name, "Evening NEET");
        assert_eq!(neet.student_count, 1);
        assert_eq!(neet.clear_count + neet.due_count, 0);

        let jee = &report.batches[1];
        assert_eq!(jee.expected, 2000.0);
        assert_eq!(jee.paid, 1400.0);
        assert_eq!(jee.due, 600.0);
        assert_eq!(jee.collection_rate, 70.0);

        assert_eq!(report.unassigned_students, 1);
        assert_eq!(report.unresolved_students, 1);
    }

    #[test]
    fn test_student_dues_sorted_and_filtered() {
        let service = service();

        let rows = service.student_dues(&DueFilter::default());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].name, "Bilal");
        assert_eq!(rows[0].due, 600.0);
        assert_eq!(rows[0].recorded_status, Some(FeeStatus::Clear));

        let dev = rows.iter().find(|r| r.name == "Dev").unwrap();
        assert_eq!(dev.batch_name, "unknown");
        assert_eq!(dev.standing, Standing::NoFee);
        assert_eq!(dev.recorded_status, None);

        let only_due = service.student_dues(&DueFilter {
            only_due: true,
            ..DueFilter::default()
        });
        assert_eq!(only_due.len(), 1);

        let by_name = service.student_dues(&DueFilter {
            batch: Some("morning jee".to_string()),
            ..DueFilter::default()
        });
        assert_eq!(by_name.len(), 2);

        let by_min = service.student_dues(&DueFilter {
            min_due: Some(601.0),
            ..DueFilter::default()
        });
        assert!(by_min.is_empty());
    }

    #[test]
    fn test_reconcile_finds_each_issue_kind() {
        let report = service().reconcile();

        assert_eq!(report.status_mismatches.len(), 1);
        assert_eq!(report.status_mismatches[0].student_id, RecordId::from("s2"));
        assert_eq!(report.status_mismatches[0].computed, Standing::Due);

        assert_eq!(report.payment_mismatches.len(), 1);
        assert_eq!(report.payment_mismatches[0].payments_total, 300.0);

        assert_eq!(report.orphaned_fee_records.len(), 1);
        assert_eq!(report.orphaned_fee_records[0].paid_amount, 50.0);

        assert_eq!(report.dangling_batch_refs.len(), 1);
        assert_eq!(report.dangling_batch_refs[0].batch_id, RecordId::from("gone"));

        assert_eq!(report.issue_count(), 4);
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_expense_report() {
        let service = service();

        let all = service.expense_report(&DateRange::all());
        assert_eq!(all.total, 530.0);
        assert_eq!(all.categories[0].category, "premises");
        assert_eq!(all.categories[1].count, 2);
        assert_eq!(all.categories[1].average, 15.0);

        let march = service.expense_report(&DateRange::new(Some(day(2024, 3, 1)), None));
        assert_eq!(march.total, 20.0);
        assert_eq!(march.categories.len(), 1);
    }

    #[test]
    fn test_profit_loss() {
        let service = service();

        let all = service.profit_loss(&DateRange::all());
        assert_eq!(all.income, 1450.0);
        assert_eq!(all.expenses, 530.0);
        assert_eq!(all.net, 920.0);

        let january = service.profit_loss(&DateRange::new(
            Some(day(2024, 1, 1)),
            Some(day(2024, 2, 1)),
        ));
        assert_eq!(january.income, 900.0);
        assert_eq!(january.expenses, 500.0);
        assert_eq!(january.net, 400.0);
    }

    #[test]
    fn test_cash_flow_fills_quiet_months() {
        let report = service().cash_flow(&DateRange::all());

        assert_eq!(report.periods.len(), 3);
        assert_eq!(report.periods[0].period_start, day(2024, 1, 1));
        assert_eq!(report.periods[0].inflow, 900.0);
        assert_eq!(report.periods[0].outflow, 500.0);
        assert_eq!(report.periods[1].inflow, 0.0);
        assert_eq!(report.periods[1].period_end, day(2024, 3, 1));
        assert_eq!(report.periods[2].net, 380.0);
    }

    #[test]
    fn test_cash_flow_empty() {
        let service = FinanceService::new(Snapshot::default());
        assert!(service.cash_flow(&DateRange::all()).periods.is_empty());
    }

    #[test]
    fn test_month_rollover() {
        assert_eq!(next_month((2024, 12)), (2025, 1));
        assert_eq!(month_start((2024, 2)), Some(day(2024, 2, 1)));
    }
}
