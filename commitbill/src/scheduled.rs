//! commitbill-scheduled - one scheduler pass over every invoice configuration
//!
//! Meant to run daily from cron or a systemd timer. Each configuration due
//! on the given date is generated, stored and emailed; a failing
//! configuration does not stop the others. Exits non-zero if any failed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use commitbill_core::format::format_hours;
use commitbill_core::invoice_config::InvoiceConfigFile;
use commitbill_core::runner::{BatchReport, RunStatus, Runner};
use commitbill_core::Config;

#[derive(Parser)]
#[command(name = "commitbill-scheduled")]
#[command(about = "Generate and send every invoice due today")]
#[command(version)]
struct Args {
    /// Evaluate schedules for this date instead of today (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Generate due invoices but neither save nor send them
    #[arg(long)]
    dry_run: bool,

    /// Also log to stderr at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Invoice definitions file (overrides invoices_path from config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = commitbill_core::logging::init(&config.logging, args.verbose)
        .context("failed to initialize logging")?;

    let today = args.date.unwrap_or_else(|| Local::now().date_naive());
    tracing::info!(date = %today, dry_run = args.dry_run, "commitbill-scheduled starting");

    let invoices_path = args.config.clone().unwrap_or_else(|| config.invoices_path());
    let invoices = InvoiceConfigFile::load_from(&invoices_path).with_context(|| {
        format!(
            "failed to load invoice definitions from {}",
            invoices_path.display()
        )
    })?;

    let runner = Runner::from_settings(&config, &invoices.global)
        .context("failed to initialize invoice runner")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create async runtime")?;

    let report = runtime.block_on(runner.run_scheduled(&invoices, today, args.dry_run));
    print_report(&report);

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_report(report: &BatchReport) {
    println!("Schedule pass for {}", report.date);

    if report.due() == 0 {
        println!("No invoices due.");
    }

    for outcome in &report.outcomes {
        match &outcome.status {
            RunStatus::NotDue => {}
            RunStatus::Sent { invoice_id } => {
                println!("  {:<16} sent ({})", outcome.config_id, invoice_id);
            }
            RunStatus::Generated { invoice } => {
                println!(
                    "  {:<16} would send {}hrs to {}",
                    outcome.config_id,
                    format_hours(invoice.total_hours),
                    invoice.customer
                );
                println!("\n{}\n", invoice.formatted_text);
            }
            RunStatus::Failed { reason } => {
                println!("  {:<16} FAILED: {}", outcome.config_id, reason);
            }
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        println!("{} of {} due invoice(s) failed", failed, report.due());
    }
}
