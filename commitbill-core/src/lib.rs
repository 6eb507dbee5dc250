//! # commitbill-core
//!
//! Core library for commitbill - turns git history into weekly invoices.
//!
//! This library provides:
//! - Commit source resolution (GitHub first, local clones as fallback)
//! - Keyword categorization and half-hour allocation of weekly budgets
//! - Optional AI rewrite of line items
//! - Invoice schedules, storage and email delivery
//! - Configuration management and logging infrastructure
//!
//! ## Pipeline
//!
//! For every Sunday-to-Saturday week of the billing window:
//! commits are resolved, grouped into categories, and the weekly hours are
//! split across the categories. The weeks are then rendered as one text block.
//!
//! ## Example
//!
//! ```rust,no_run
//! use commitbill_core::invoice_config::InvoiceConfigFile;
//! use commitbill_core::runner::Runner;
//! use commitbill_core::Config;
//!
//! # async fn run() -> commitbill_core::Result<()> {
//! let config = Config::load()?;
//! let invoices = InvoiceConfigFile::load_from(&config.invoices_path())?;
//! let runner = Runner::from_settings(&config, &invoices.global)?;
//!
//! let today = chrono::Local::now().date_naive();
//! let report = runner.run_scheduled(&invoices, today, false).await;
//! println!("{} due, failures: {}", report.due(), report.has_failures());
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::InvoiceStore;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod ai;
pub mod allocate;
pub mod categorize;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod format;
pub mod invoice;
pub mod invoice_config;
pub mod logging;
pub mod runner;
pub mod schedule;
pub mod sources;
pub mod types;
