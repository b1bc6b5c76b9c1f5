use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::application::{DateRange, DueFilter, FinanceService};
use crate::domain::{FinancialSummary, format_amount};

/// Summary document written by `export summary`.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryExport {
    pub version: String,
    pub fetched_at: Option<chrono::DateTime<chrono::Utc>>,
    pub collection_rate: f64,
    #[serde(flatten)]
    pub summary: FinancialSummary,
}

/// Exporter for writing computed reports to CSV or JSON.
pub struct Exporter<'a> {
    service: &'a FinanceService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a FinanceService) -> Self {
        Self { service }
    }

    /// Export per-student dues to CSV format
    pub fn export_student_dues_csv<W: Write>(
        &self,
        writer: W,
        filter: &DueFilter,
    ) -> Result<usize> {
        let rows = self.service.student_dues(filter);
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "student_id",
            "name",
            "phone",
            "batch",
            "expected",
            "paid",
            "due",
            "standing",
            "recorded_status",
        ])?;

        for row in &rows {
            csv_writer.write_record([
                row.student_id.as_str(),
                row.name.as_str(),
                row.phone.as_deref().unwrap_or_default(),
                row.batch_name.as_str(),
                format_amount(row.expected).as_str(),
                format_amount(row.paid).as_str(),
                format_amount(row.due).as_str(),
                row.standing.as_str(),
                row.recorded_status.map(|s| s.as_str()).unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(rows.len())
    }

    /// Export the per-batch breakdown to CSV format
    pub fn export_batches_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let report = self.service.batch_report();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "batch_id",
            "name",
            "course",
            "status",
            "fee",
            "students",
            "expected",
            "paid",
            "due",
            "clear",
            "due_students",
            "collection_rate",
        ])?;

        for batch in &report.batches {
            csv_writer.write_record([
                batch.batch_id.as_str(),
                batch.name.as_str(),
                batch.course.as_deref().unwrap_or_default(),
                batch.status.as_str(),
                format_amount(batch.fee).as_str(),
                batch.student_count.to_string().as_str(),
                format_amount(batch.expected).as_str(),
                format_amount(batch.paid).as_str(),
                format_amount(batch.due).as_str(),
                batch.clear_count.to_string().as_str(),
                batch.due_count.to_string().as_str(),
                format!("{:.1}", batch.collection_rate).as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(report.batches.len())
    }

    /// Export the headline summary as pretty-printed JSON
    pub fn export_summary_json<W: Write>(&self, mut writer: W) -> Result<SummaryExport> {
        let summary = self.service.summary();
        let export = SummaryExport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            fetched_at: self.service.snapshot().fetched_at,
            collection_rate: summary.collection_rate(),
            summary,
        };

        serde_json::to_writer_pretty(&mut writer, &export)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(export)
    }

    /// Export the headline summary as `metric,value` rows
    pub fn export_summary_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let summary = self.service.summary();
        let rows = [
            ("total_expected_fees", format_amount(summary.total_expected_fees)),
            ("total_paid", format_amount(summary.total_paid)),
            ("total_due", format_amount(summary.total_due)),
            ("orphaned_paid", format_amount(summary.orphaned_paid)),
            ("clear_count", summary.clear_count.to_string()),
            ("due_count", summary.due_count.to_string()),
            ("collection_rate", format!("{:.2}", summary.collection_rate())),
        ];

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["metric", "value"])?;
        for (metric, value) in &rows {
            csv_writer.write_record([*metric, value.as_str()])?;
        }

        csv_writer.flush()?;
        Ok(rows.len())
    }

    /// Export expenses grouped by category to CSV format
    pub fn export_expenses_csv<W: Write>(&self, writer: W, range: &DateRange) -> Result<usize> {
        let report = self.service.expense_report(range);
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["category", "total", "count", "average", "percentage"])?;

        for cat in &report.categories {
            csv_writer.write_record([
                cat.category.as_str(),
                format_amount(cat.total).as_str(),
                cat.count.to_string().as_str(),
                format_amount(cat.average).as_str(),
                format!("{:.2}", cat.percentage).as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(report.categories.len())
    }

    /// Export income, expenses and net for a period to CSV format
    pub fn export_profit_loss_csv<W: Write>(&self, writer: W, range: &DateRange) -> Result<usize> {
        let report = self.service.profit_loss(range);
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["type", "amount"])?;
        csv_writer.write_record(["income", format_amount(report.income).as_str()])?;
        csv_writer.write_record(["expenses", format_amount(report.expenses).as_str()])?;
        csv_writer.write_record(["net", format_amount(report.net).as_str()])?;

        csv_writer.flush()?;
        Ok(3)
    }

    /// Export monthly cash flow periods to CSV format
    pub fn export_cash_flow_csv<W: Write>(&self, writer: W, range: &DateRange) -> Result<usize> {
        let report = self.service.cash_flow(range);
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["period_start", "period_end", "inflow", "outflow", "net"])?;

        for p in &report.periods {
            csv_writer.write_record([
                p.period_start.format("%Y-%m-%d").to_string().as_str(),
                p.period_end.format("%Y-%m-%d").to_string().as_str(),
                format_amount(p.inflow).as_str(),
                format_amount(p.outflow).as_str(),
                format_amount(p.net).as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(report.periods.len())
    }
}
