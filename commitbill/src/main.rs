//! commitbill - weekly client invoices from git history
//!
//! Generates an invoice for one configured customer, shows it, stores it and
//! optionally emails it.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Settings: $XDG_CONFIG_HOME/commitbill/config.toml
//! - Invoice definitions: $XDG_CONFIG_HOME/commitbill/invoices.json
//! - Saved invoices: $XDG_DATA_HOME/commitbill/invoices.db
//! - Logs: $XDG_STATE_HOME/commitbill/commitbill.log

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use commitbill_core::format::format_hours;
use commitbill_core::invoice::GenerateRequest;
use commitbill_core::invoice_config::InvoiceConfigFile;
use commitbill_core::runner::Runner;
use commitbill_core::{Config, InvoiceData, InvoiceStore, SavedInvoice};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "commitbill")]
#[command(about = "Generate client invoices from git history")]
#[command(version)]
struct Args {
    /// Invoice configuration id
    config_id: Option<String>,

    /// List invoice configurations and exit
    #[arg(long)]
    list_configs: bool,

    /// List saved invoices (for CONFIG_ID if given) and exit
    #[arg(long)]
    list_saved: bool,

    /// Send a test email to the sender address only
    #[arg(long, conflicts_with = "send")]
    test: bool,

    /// Email the invoice to the configured recipients
    #[arg(long)]
    send: bool,

    /// Deliver a saved invoice by id instead of generating a new one
    #[arg(long, value_name = "INVOICE_ID", conflicts_with_all = ["customer", "list_configs", "list_saved"])]
    send_existing: Option<String>,

    /// Bill a customer by name, searching local clones (no configuration entry)
    #[arg(long, value_name = "NAME", requires = "hours", conflicts_with = "config_id")]
    customer: Option<String>,

    /// Number of weeks to bill (with --customer)
    #[arg(long, default_value_t = 1)]
    weeks: u32,

    /// Hours per week (with --customer)
    #[arg(long)]
    hours: Option<f64>,

    /// First day to bill (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day to bill (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Do not store the generated invoice
    #[arg(long)]
    no_save: bool,

    /// Also log to stderr at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Invoice definitions file (overrides invoices_path from config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = commitbill_core::logging::init(&config.logging, args.verbose)
        .context("failed to initialize logging")?;

    tracing::info!("commitbill starting");

    if args.list_saved {
        return list_saved(args.config_id.as_deref());
    }

    let invoices_path = args.config.clone().unwrap_or_else(|| config.invoices_path());

    if args.list_configs {
        let invoices = load_invoices(&invoices_path)?;
        list_configs(&invoices);
        return Ok(());
    }

    if args.customer.is_none() && args.config_id.is_none() && args.send_existing.is_none() {
        bail!("no invoice configuration given (use --list-configs to see available ids)");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create async runtime")?;

    runtime.block_on(run(&args, &config, &invoices_path))
}

async fn run(args: &Args, config: &Config, invoices_path: &Path) -> Result<()> {
    let today = Local::now().date_naive();

    if let Some(id) = args.send_existing.as_deref() {
        let invoices = load_invoices(invoices_path)?;
        let runner = Runner::from_settings(config, &invoices.global)
            .context("failed to initialize invoice runner")?;

        let saved = runner
            .send_saved(id, &invoices, args.test)
            .await
            .with_context(|| format!("failed to send saved invoice {}", id))?;
        print_sent(&saved.invoice.customer, args.test);
        return Ok(());
    }

    if let Some(customer) = args.customer.as_deref() {
        let hours = args.hours.context("--hours is required with --customer")?;
        if args.send || args.test {
            bail!("--customer invoices have no recipients; add a configuration entry to send");
        }

        let runner = Runner::from_settings(config, &Default::default())
            .context("failed to initialize invoice runner")?;
        let mut request = GenerateRequest::for_customer(customer, args.weeks, hours, today);
        request.start = args.start;
        request.end = args.end;

        let invoice = generate(&runner, &request)
            .await
            .with_context(|| format!("no repositories found for customer {}", customer))?;
        print_invoice(&invoice);
        if !args.no_save {
            let saved = runner
                .store()
                .save(&format!("customer:{}", customer), &invoice)
                .context("failed to save invoice")?;
            println!("\nSaved as {}", saved.id);
        }
        return Ok(());
    }

    let Some(config_id) = args.config_id.as_deref() else {
        bail!("no invoice configuration given");
    };
    let invoices = load_invoices(invoices_path)?;
    let invoice_config = invoices.find(config_id)?;

    let runner = Runner::from_settings(config, &invoices.global)
        .context("failed to initialize invoice runner")?;
    let mut request = GenerateRequest::from_config(invoice_config, today);
    request.start = args.start;
    request.end = args.end;

    let invoice = generate(&runner, &request)
        .await
        .with_context(|| format!("no repositories found for {}", invoice_config.customer))?;
    print_invoice(&invoice);

    let saved = if args.no_save {
        None
    } else {
        let saved = runner
            .store()
            .save(config_id, &invoice)
            .context("failed to save invoice")?;
        println!("\nSaved as {}", saved.id);
        Some(saved)
    };

    if !(args.send || args.test) {
        return Ok(());
    }

    runner
        .deliver(invoice_config, &invoices.global, &invoice, args.test)
        .await
        .with_context(|| format!("failed to send invoice for {}", invoice_config.customer))?;
    if args.send {
        if let Some(saved) = &saved {
            runner
                .store()
                .mark_sent(&saved.id)
                .context("failed to mark invoice as sent")?;
        }
    }
    print_sent(&invoice.customer, args.test);

    Ok(())
}

/// Generate with a spinner on the terminal
async fn generate(runner: &Runner, request: &GenerateRequest) -> Option<InvoiceData> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Reading commits for {}...", request.customer));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let invoice = runner.generate(request).await;

    spinner.finish_and_clear();
    invoice
}

fn load_invoices(path: &Path) -> Result<InvoiceConfigFile> {
    InvoiceConfigFile::load_from(path)
        .with_context(|| format!("failed to load invoice definitions from {}", path.display()))
}

fn list_configs(invoices: &InvoiceConfigFile) {
    if invoices.invoices.is_empty() {
        println!("No invoice configurations.");
        return;
    }

    println!("Invoice configurations:");
    for invoice in &invoices.invoices {
        let sources = if invoice.git.is_customer_driven() {
            "local search".to_string()
        } else {
            let mut sources = invoice.git.repos.clone();
            sources.extend(invoice.git.repo_dirs.iter().cloned());
            sources.join(", ")
        };
        println!(
            "  {:<16} {:<24} {:<18} {}w x {}h  [{}]",
            invoice.id,
            invoice.customer,
            invoice.schedule.kind.as_str(),
            invoice.git.weeks,
            format_hours(invoice.git.hours_per_week),
            sources
        );
    }
}

fn list_saved(config_id: Option<&str>) -> Result<()> {
    let db_path = Config::database_path();
    let store = InvoiceStore::open(&db_path).context("failed to open invoice store")?;
    store.migrate().context("failed to run database migrations")?;

    let saved = store.list(config_id).context("failed to list invoices")?;
    if saved.is_empty() {
        println!("No saved invoices.");
        return Ok(());
    }

    for invoice in &saved {
        print_saved_row(invoice);
    }
    Ok(())
}

fn print_saved_row(saved: &SavedInvoice) {
    let local_time = |ts: &chrono::DateTime<chrono::Utc>| {
        ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    };
    let status = match &saved.sent_at {
        Some(sent_at) => format!("sent {}", local_time(sent_at)),
        None => "not sent".to_string(),
    };
    println!(
        "{}  {:<16} {}  {} - {}  {}hrs  {}",
        saved.id,
        saved.config_id,
        local_time(&saved.generated_at),
        saved.invoice.start_date_label,
        saved.invoice.end_date_label,
        format_hours(saved.invoice.total_hours),
        status
    );
}

fn print_invoice(invoice: &InvoiceData) {
    println!(
        "Invoice for {} ({} - {})\n",
        invoice.customer, invoice.start_date_label, invoice.end_date_label
    );
    println!("{}", invoice.formatted_text);
    println!("\nTotal: {}hrs", format_hours(invoice.total_hours));
}

fn print_sent(customer: &str, test_mode: bool) {
    if test_mode {
        println!("Test invoice for {} sent to sender address", customer);
    } else {
        println!("Invoice for {} sent", customer);
    }
}
