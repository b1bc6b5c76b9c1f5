use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::application::{AppError, DateRange, DueFilter, FinanceService};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::domain::{Amount, RecordId, format_currency, parse_amount};
use crate::io::{ApiClient, Exporter, Snapshot, parse_date};

/// Coachbook - fee and expense reporting for a coaching center
#[derive(Parser)]
#[command(name = "coachbook")]
#[command(about = "Fee, due and expense reports over a coaching-center backend")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to .coachbook.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot directory (overrides the configured one)
    #[arg(short, long, global = true, env = "COACHBOOK_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    InitConfig,

    /// Download fees, students, batches and expenses into a snapshot directory
    Fetch {
        /// Target directory (defaults to the snapshot directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Headline fee figures
    Summary {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Per-student dues, largest first
    Dues {
        /// Only students of this batch (id or name)
        #[arg(long)]
        batch: Option<String>,

        /// Only students who still owe something
        #[arg(long)]
        only_due: bool,

        /// Only dues of at least this amount (e.g. "500")
        #[arg(long)]
        min_due: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Per-batch breakdown of expected, paid and due fees
    Batches {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Reconcile stored statuses and totals against recomputed figures
    Check {
        /// Output format (table or json)
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Expense and income reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export a report to CSV or JSON
    Export {
        /// What to export: dues, batches, summary
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only students of this batch (dues export)
        #[arg(long)]
        batch: Option<String>,

        /// Only students who still owe something (dues export)
        #[arg(long)]
        only_due: bool,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Expenses grouped by category
    Expenses {
        /// Start date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, exclusive)
        #[arg(long)]
        to: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Fees collected against expenses
    Pnl {
        /// Start date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, exclusive)
        #[arg(long)]
        to: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Monthly collections and expenses
    Cashflow {
        /// Start date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, exclusive)
        #[arg(long)]
        to: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    pub async fn run(self) -> Result<()> {
        if matches!(self.command, Commands::InitConfig) {
            return init_config(self.config.as_deref());
        }

        let config = Config::resolve(self.config.as_deref())?;
        let snapshot_dir = self
            .snapshot
            .clone()
            .unwrap_or_else(|| config.snapshot.dir.clone());
        let currency = config.display.currency.clone();

        match self.command {
            // Written before any configuration is loaded.
            Commands::InitConfig => {}
            Commands::Fetch { out } => {
                let dir = out.unwrap_or(snapshot_dir);
                run_fetch_command(&config, &dir).await?;
            }
            Commands::Summary { format } => {
                let service = load_service(&snapshot_dir)?;
                run_summary_command(&service, format, &currency)?;
            }
            Commands::Dues {
                batch,
                only_due,
                min_due,
                format,
            } => {
                let min_due = min_due.as_deref().map(parse_amount_arg).transpose()?;
                let filter = DueFilter {
                    batch,
                    only_due,
                    min_due,
                };
                let service = load_service(&snapshot_dir)?;
                run_dues_command(&service, &filter, format, &currency)?;
            }
            Commands::Batches { format } => {
                let service = load_service(&snapshot_dir)?;
                run_batches_command(&service, format, &currency)?;
            }
            Commands::Check { format } => {
                let service = load_service(&snapshot_dir)?;
                run_check_command(&service, format, &currency)?;
            }
            Commands::Report(report_cmd) => {
                let service = load_service(&snapshot_dir)?;
                run_report_command(&service, report_cmd, &currency)?;
            }
            Commands::Export {
                export_type,
                output,
                batch,
                only_due,
            } => {
                let service = load_service(&snapshot_dir)?;
                let filter = DueFilter {
                    batch,
                    only_due,
                    min_due: None,
                };
                run_export_command(&service, &export_type, output.as_deref(), &filter)?;
            }
        }

        Ok(())
    }
}

fn init_config(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            path.display()
        );
    }

    let content = Config::default_toml()?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {} with default settings.", path.display());
    Ok(())
}

fn load_service(dir: &Path) -> Result<FinanceService> {
    let snapshot = Snapshot::load_dir(dir)
        .with_context(|| format!("Failed to load snapshot from {}", dir.display()))?;
    info!(
        fees = snapshot.fees.len(),
        students = snapshot.students.len(),
        batches = snapshot.batches.len(),
        expenses = snapshot.expenses.len(),
        "snapshot loaded"
    );
    Ok(FinanceService::new(snapshot))
}

async fn run_fetch_command(config: &Config, dir: &Path) -> Result<()> {
    let client = ApiClient::new(&config.api)?;
    let raw = client.fetch_snapshot().await?;
    raw.save_dir(dir)
        .with_context(|| format!("Failed to write snapshot to {}", dir.display()))?;

    let snapshot = raw.normalize();
    println!("Snapshot written to {}", dir.display());
    println!("  Fee records: {}", snapshot.fees.len());
    println!("  Students:    {}", snapshot.students.len());
    println!("  Batches:     {}", snapshot.batches.len());
    println!("  Expenses:    {}", snapshot.expenses.len());
    if snapshot.skipped > 0 {
        println!("  Skipped:     {} malformed record(s)", snapshot.skipped);
    }
    Ok(())
}

fn run_summary_command(
    service: &FinanceService,
    format: OutputFormat,
    currency: &str,
) -> Result<()> {
    let summary = service.summary();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Csv => {
            Exporter::new(service).export_summary_csv(std::io::stdout())?;
        }
        OutputFormat::Table => {
            println!("Fee Summary");
            if let Some(at) = service.snapshot().fetched_at {
                println!("Snapshot: {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
            println!();
            println!(
                "Expected fees:    {:>15}",
                format_currency(currency, summary.total_expected_fees)
            );
            println!(
                "Collected:        {:>15}",
                format_currency(currency, summary.total_paid)
            );
            if summary.orphaned_paid > 0.0 {
                println!(
                    "  from removed students: {}",
                    format_currency(currency, summary.orphaned_paid)
                );
            }
            println!(
                "Outstanding:      {:>15}",
                format_currency(currency, summary.total_due)
            );
            println!("{}", "-".repeat(34));
            println!("Collection rate:  {:>14.1}%", summary.collection_rate());
            println!("Students clear:   {:>15}", summary.clear_count);
            println!("Students due:     {:>15}", summary.due_count);
        }
    }

    Ok(())
}

fn run_dues_command(
    service: &FinanceService,
    filter: &DueFilter,
    format: OutputFormat,
    currency: &str,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let rows = service.student_dues(filter);
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Csv => {
            Exporter::new(service).export_student_dues_csv(std::io::stdout(), filter)?;
        }
        OutputFormat::Table => {
            let rows = service.student_dues(filter);
            if rows.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            println!(
                "{:<22} {:<18} {:>12} {:>12} {:>12} {:<8}",
                "STUDENT", "BATCH", "EXPECTED", "PAID", "DUE", "STATUS"
            );
            println!("{}", "-".repeat(89));
            for row in &rows {
                println!(
                    "{:<22} {:<18} {:>12} {:>12} {:>12} {:<8}",
                    truncate(&row.name, 22),
                    truncate(&row.batch_name, 18),
                    format_currency(currency, row.expected),
                    format_currency(currency, row.paid),
                    format_currency(currency, row.due),
                    row.standing
                );
            }
            println!("{}", "-".repeat(89));
            let total: Amount = rows.iter().map(|r| r.due).sum();
            println!(
                "{:<22} {:<18} {:>12} {:>12} {:>12}",
                "TOTAL",
                "",
                "",
                "",
                format_currency(currency, total)
            );
        }
    }

    Ok(())
}

fn run_batches_command(
    service: &FinanceService,
    format: OutputFormat,
    currency: &str,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&service.batch_report())?);
        }
        OutputFormat::Csv => {
            Exporter::new(service).export_batches_csv(std::io::stdout())?;
        }
        OutputFormat::Table => {
            let report = service.batch_report();
            if report.batches.is_empty() {
                println!("No batches found.");
                return Ok(());
            }

            println!(
                "{:<20} {:<10} {:>8} {:>12} {:>12} {:>12} {:>7}",
                "BATCH", "STATUS", "STUDENTS", "EXPECTED", "PAID", "DUE", "RATE"
            );
            println!("{}", "-".repeat(87));
            for batch in &report.batches {
                println!(
                    "{:<20} {:<10} {:>8} {:>12} {:>12} {:>12} {:>6.1}%",
                    truncate(&batch.name, 20),
                    batch.status,
                    batch.student_count,
                    format_currency(currency, batch.expected),
                    format_currency(currency, batch.paid),
                    format_currency(currency, batch.due),
                    batch.collection_rate
                );
            }
            println!("{}", "-".repeat(87));
            println!(
                "{:<20} {:<10} {:>8} {:>12} {:>12} {:>12}",
                "TOTAL",
                "",
                "",
                format_currency(currency, report.total_expected),
                "",
                format_currency(currency, report.total_due)
            );

            if report.unassigned_students > 0 {
                println!();
                println!("Students without a batch: {}", report.unassigned_students);
            }
            if report.unresolved_students > 0 {
                println!(
                    "Students in unknown batches: {}",
                    report.unresolved_students
                );
            }
        }
    }

    Ok(())
}

fn run_check_command(
    service: &FinanceService,
    format: OutputFormat,
    currency: &str,
) -> Result<()> {
    if format == OutputFormat::Csv {
        anyhow::bail!("check does not support CSV output; use --format table or --format json");
    }

    let report = service.reconcile();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Reconciling fee records...\n");
        println!("Fee records: {}", service.snapshot().fees.len());
        println!("Students:    {}", service.snapshot().students.len());
        println!("Batches:     {}", service.snapshot().batches.len());
        if service.snapshot().skipped > 0 {
            println!("Skipped:     {}", service.snapshot().skipped);
        }
        println!();

        if report.is_consistent() {
            println!("Fee records are consistent.");
            return Ok(());
        }

        println!("Issues found:");
        for m in &report.status_mismatches {
            println!(
                "  - {} ({}): stored status '{}' but computed '{}' (due {})",
                m.student_name,
                m.student_id,
                m.recorded,
                m.computed,
                format_currency(currency, m.due)
            );
        }
        for m in &report.payment_mismatches {
            println!(
                "  - fee record {}: paid amount {} but payments sum to {}",
                display_id(m.fee_record_id.as_ref()),
                format_currency(currency, m.paid_amount),
                format_currency(currency, m.payments_total)
            );
        }
        for o in &report.orphaned_fee_records {
            println!(
                "  - fee record {} references missing student {} (paid {})",
                display_id(o.fee_record_id.as_ref()),
                display_id(o.student_id.as_ref()),
                format_currency(currency, o.paid_amount)
            );
        }
        for d in &report.dangling_batch_refs {
            println!(
                "  - {} ({}) is assigned to missing batch {}",
                d.student_name, d.student_id, d.batch_id
            );
        }
    }

    if !report.is_consistent() {
        anyhow::bail!("{} reconciliation issue(s) found", report.issue_count());
    }
    Ok(())
}

fn run_report_command(
    service: &FinanceService,
    cmd: ReportCommands,
    currency: &str,
) -> Result<()> {
    match cmd {
        ReportCommands::Expenses { from, to, format } => {
            let range = parse_date_range(from, to)?;
            let report = service.expense_report(&range);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Csv => {
                    Exporter::new(service).export_expenses_csv(std::io::stdout(), &range)?;
                }
                OutputFormat::Table => {
                    println!("Expense Report");
                    println!("Period: {}", describe_range(&range));
                    println!();
                    println!(
                        "{:<20} {:>12} {:>8} {:>12} {:>8}",
                        "CATEGORY", "TOTAL", "COUNT", "AVERAGE", "PERCENT"
                    );
                    println!("{}", "-".repeat(65));

                    for cat in &report.categories {
                        println!(
                            "{:<20} {:>12} {:>8} {:>12} {:>7.1}%",
                            truncate(&cat.category, 20),
                            format_currency(currency, cat.total),
                            cat.count,
                            format_currency(currency, cat.average),
                            cat.percentage
                        );
                    }

                    println!("{}", "-".repeat(65));
                    println!(
                        "{:<20} {:>12}",
                        "TOTAL",
                        format_currency(currency, report.total)
                    );
                }
            }
        }

        ReportCommands::Pnl { from, to, format } => {
            let range = parse_date_range(from, to)?;
            let report = service.profit_loss(&range);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Csv => {
                    Exporter::new(service).export_profit_loss_csv(std::io::stdout(), &range)?;
                }
                OutputFormat::Table => {
                    println!("Income vs Expenses");
                    println!("Period: {}", describe_range(&range));
                    println!();
                    println!(
                        "Fees collected: {:>15}",
                        format_currency(currency, report.income)
                    );
                    println!(
                        "Expenses:       {:>15}",
                        format_currency(currency, report.expenses)
                    );
                    println!("{}", "-".repeat(32));
                    println!("Net:            {:>15}", format_currency(currency, report.net));
                }
            }
        }

        ReportCommands::Cashflow { from, to, format } => {
            let range = parse_date_range(from, to)?;
            let report = service.cash_flow(&range);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Csv => {
                    Exporter::new(service).export_cash_flow_csv(std::io::stdout(), &range)?;
                }
                OutputFormat::Table => {
                    if report.periods.is_empty() {
                        println!("No dated payments or expenses found.");
                        return Ok(());
                    }

                    println!("Cash Flow Report");
                    println!("Period: {}", describe_range(&range));
                    println!();
                    println!(
                        "{:<10} {:>14} {:>14} {:>14}",
                        "MONTH", "COLLECTED", "SPENT", "NET"
                    );
                    println!("{}", "-".repeat(55));
                    for p in &report.periods {
                        println!(
                            "{:<10} {:>14} {:>14} {:>14}",
                            p.period_start.format("%Y-%m"),
                            format_currency(currency, p.inflow),
                            format_currency(currency, p.outflow),
                            format_currency(currency, p.net)
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn run_export_command(
    service: &FinanceService,
    export_type: &str,
    output: Option<&Path>,
    filter: &DueFilter,
) -> Result<()> {
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "dues" => {
            let count = exporter.export_student_dues_csv(writer, filter)?;
            if output.is_some() {
                eprintln!("Exported {} student dues", count);
            }
        }
        "batches" => {
            let count = exporter.export_batches_csv(writer)?;
            if output.is_some() {
                eprintln!("Exported {} batches", count);
            }
        }
        "summary" => {
            let export = exporter.export_summary_json(writer)?;
            if output.is_some() {
                eprintln!(
                    "Exported summary: {} students with dues recorded",
                    export.summary.student_dues.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: dues, batches, summary",
                export_type
            );
        }
    }

    Ok(())
}

fn parse_date_range(from: Option<String>, to: Option<String>) -> Result<DateRange> {
    let from = from.as_deref().map(parse_date_arg).transpose()?;
    let to = to.as_deref().map(parse_date_arg).transpose()?;
    Ok(DateRange::new(from, to))
}

fn parse_date_arg(s: &str) -> Result<DateTime<Utc>> {
    parse_date(s).ok_or_else(|| {
        AppError::InvalidDate(format!("'{}' (expected YYYY-MM-DD or RFC 3339)", s)).into()
    })
}

fn parse_amount_arg(s: &str) -> Result<Amount> {
    parse_amount(s).map_err(|e| AppError::InvalidAmount(format!("'{}': {}", s, e)).into())
}

fn describe_range(range: &DateRange) -> String {
    match (range.from, range.to) {
        (None, None) => "all time".to_string(),
        (Some(from), None) => format!("from {}", from.format("%Y-%m-%d")),
        (None, Some(to)) => format!("before {}", to.format("%Y-%m-%d")),
        (Some(from), Some(to)) => {
            format!("{} to {}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d"))
        }
    }
}

fn display_id(id: Option<&RecordId>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "(no id)".to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_dues_flags() {
        let cli = Cli::try_parse_from([
            "coachbook",
            "--snapshot",
            "/tmp/snap",
            "dues",
            "--batch",
            "b1",
            "--only-due",
            "--min-due",
            "500",
            "--format",
            "csv",
        ])
        .unwrap();

        assert_eq!(cli.snapshot, Some(PathBuf::from("/tmp/snap")));
        match cli.command {
            Commands::Dues {
                batch,
                only_due,
                min_due,
                format,
            } => {
                assert_eq!(batch.as_deref(), Some("b1"));
                assert!(only_due);
                assert_eq!(min_due.as_deref(), Some("500"));
                assert_eq!(format, OutputFormat::Csv);
            }
            _ => panic!("expected dues command"),
        }
    }

    #[test]
    fn test_log_filter() {
        let mut cli = Cli::try_parse_from(["coachbook", "summary"]).unwrap();
        assert_eq!(cli.log_filter(), "warn");
        cli.verbose = true;
        assert_eq!(cli.log_filter(), "debug");
        cli.verbose = false;
        cli.quiet = true;
        assert_eq!(cli.log_filter(), "error");
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["coachbook", "-v", "-q", "summary"]).is_err());
    }

    #[test]
    fn test_parse_date_range() {
        let range = parse_date_range(Some("2024-01-01".into()), None).unwrap();
        assert!(range.from.is_some());
        assert!(range.to.is_none());
        assert!(parse_date_range(Some("01/01/2024".into()), None).is_err());
    }

    #[test]
    fn test_parse_amount_arg() {
        assert_eq!(parse_amount_arg("500").unwrap(), 500.0);
        assert!(parse_amount_arg("lots").is_err());
    }

    #[test]
    fn test_check_rejects_csv() {
        let service = FinanceService::new(Snapshot::default());

        let err = run_check_command(&service, OutputFormat::Csv, "₹").unwrap_err();

        assert!(err.to_string().contains("does not support CSV"));
        assert!(run_check_command(&service, OutputFormat::Json, "₹").is_ok());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Asha", 10), "Asha");
        assert_eq!(truncate("Morning JEE Advanced", 10), "Morning...");
    }
}
