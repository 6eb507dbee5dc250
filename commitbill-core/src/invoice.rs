//! Invoice assembly.
//!
//! [`InvoiceAssembler::generate`] resolves the billing window, walks it week
//! by week (Sunday to Saturday), categorizes each week's commits and splits
//! the weekly budget across the categories. When AI stages are enabled the
//! whole window's commits go through [`crate::ai`] once at the end.

use chrono::{Datelike, Duration, NaiveDate};

use crate::ai::{self, AiStages, TextGenerator};
use crate::allocate::allocate;
use crate::categorize::categorize;
use crate::format::{format_date_label, format_invoice_text, format_week_range};
use crate::invoice_config::InvoiceConfig;
use crate::sources::{SourceResolver, SourceSpec};
use crate::types::{CommitWindow, InvoiceData, WeeklyWork};

/// Everything needed to generate one invoice
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub customer: String,
    /// Weeks to bill when no explicit start is given
    pub weeks: u32,
    pub hours_per_week: f64,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub sources: SourceSpec,
    pub ai: Option<AiStages>,
    /// Reference date for the default window
    pub today: NaiveDate,
}

impl GenerateRequest {
    /// Request for a configured invoice. The customer name is the fallback
    /// search key for local clones.
    pub fn from_config(config: &InvoiceConfig, today: NaiveDate) -> Self {
        Self {
            customer: config.customer.clone(),
            weeks: config.git.weeks,
            hours_per_week: config.git.hours_per_week,
            start: None,
            end: None,
            sources: SourceSpec {
                remote: config.git.repos.clone(),
                local_patterns: config.git.repo_dirs.clone(),
                author: config.git.author.clone(),
                fallback_key: Some(config.customer.clone()),
            },
            ai: config.ai.as_ref().and_then(AiStages::from_config),
            today,
        }
    }

    /// Request driven only by a customer name (local search, no AI)
    pub fn for_customer(customer: &str, weeks: u32, hours_per_week: f64, today: NaiveDate) -> Self {
        Self {
            customer: customer.to_string(),
            weeks,
            hours_per_week,
            start: None,
            end: None,
            sources: SourceSpec {
                fallback_key: Some(customer.to_string()),
                ..Default::default()
            },
            ai: None,
            today,
        }
    }

    /// No remote repos and no local patterns configured
    pub fn is_customer_driven(&self) -> bool {
        self.sources.remote.is_empty() && self.sources.local_patterns.is_empty()
    }
}

/// Sunday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Billing window for a request.
///
/// End defaults to the Saturday closing the previous calendar week; start
/// defaults to the Sunday `weeks - 1` weeks before the end's week.
pub fn resolve_window(
    weeks: u32,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> CommitWindow {
    let end = end.unwrap_or_else(|| week_start(today) - Duration::days(1));
    let start = start.unwrap_or_else(|| {
        week_start(end) - Duration::weeks(weeks.saturating_sub(1) as i64)
    });
    CommitWindow::new(start, end)
}

/// Split a window into Sunday-to-Saturday slices, clipped to the window.
pub fn week_windows(window: &CommitWindow) -> Vec<CommitWindow> {
    let mut weeks = Vec::new();
    let mut cursor = window.start;

    while cursor <= window.end {
        let saturday = week_start(cursor) + Duration::days(6);
        let end = saturday.min(window.end);
        weeks.push(CommitWindow::new(cursor, end));
        cursor = end + Duration::days(1);
    }

    weeks
}

/// Drives source resolution, categorization, allocation and the AI stages.
pub struct InvoiceAssembler {
    resolver: SourceResolver,
    generator: Option<Box<dyn TextGenerator>>,
}

impl InvoiceAssembler {
    pub fn new(resolver: SourceResolver, generator: Option<Box<dyn TextGenerator>>) -> Self {
        Self {
            resolver,
            generator,
        }
    }

    /// Generate an invoice.
    ///
    /// Returns `None` only for customer-driven requests where no repository
    /// could be found in any week. Source and AI failures degrade the result
    /// instead of failing it.
    pub async fn generate(&self, request: &GenerateRequest) -> Option<InvoiceData> {
        let window = resolve_window(request.weeks, request.start, request.end, request.today);
        tracing::info!(
            customer = %request.customer,
            start = %window.start,
            end = %window.end,
            "Generating invoice"
        );

        let mut weeks = Vec::new();
        let mut all_commits = Vec::new();
        let mut any_source = false;

        for week in week_windows(&window) {
            let resolution = self.resolver.resolve(&week, &request.sources).await;
            any_source |= resolution.sources_resolved > 0;

            let tasks = allocate(categorize(&resolution.commits), request.hours_per_week);
            tracing::debug!(
                week_start = %week.start,
                commits = resolution.commits.len(),
                origin = ?resolution.origin,
                tasks = tasks.len(),
                "Week processed"
            );

            weeks.push(WeeklyWork {
                week_start: week.start,
                week_end: week.end,
                date_range_label: format_week_range(week.start, week.end),
                total_hours: request.hours_per_week,
                tasks,
            });
            all_commits.extend(resolution.commits);
        }

        if request.is_customer_driven() && !any_source {
            tracing::warn!(
                customer = %request.customer,
                "No repositories found for customer"
            );
            return None;
        }

        if let Some(stages) = request.ai.as_ref() {
            match self.generator.as_deref() {
                Some(generator) if !all_commits.is_empty() => {
                    ai::apply_overrides(generator, stages, &all_commits, &mut weeks).await;
                }
                Some(_) => {}
                None => tracing::warn!("AI stages enabled but no [ai] backend is configured"),
            }
        }

        let total_hours = weeks.iter().map(|w| w.total_hours).sum();
        Some(InvoiceData {
            customer: request.customer.clone(),
            start_date_label: format_date_label(window.start),
            end_date_label: format_date_label(window.end),
            formatted_text: format_invoice_text(&weeks),
            total_hours,
            weeks,
        })
    }
}
