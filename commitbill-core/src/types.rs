//! Core domain types for commitbill
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Commit window** | Inclusive date range `[start, end]` bounding a commit query |
//! | **Task** | One billing line: a category (or AI-written description) with hours |
//! | **Week** | Sunday-to-Saturday slice of an invoice carrying the fixed weekly budget |
//! | **Line item** | One printed invoice row, `"<hours>hr - <description>"` |
//!
//! Hours are `f64` values on a 0.5 grid. Halves are exact in binary floating
//! point, so sums and differences of allocated hours compare exactly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Commits
// ============================================

/// One commit as seen by the categorizer.
///
/// Created per fetch and consumed immediately; never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Subject line (remote sources: first line of the message)
    pub message: String,
    /// Author date
    pub date: DateTime<Utc>,
    /// Repo label: `owner/name` for remotes, directory basename for local clones
    pub repo: String,
}

/// Inclusive date range used to bound commit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CommitWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether `date` falls inside the window (both ends inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

// ============================================
// Source resolution
// ============================================

/// Result of querying a single commit source.
///
/// Source failures never abort a run; they are kept here so callers and tests
/// can see why a source contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The source answered (possibly with zero commits)
    Fetched { source: String, count: usize },
    /// The source failed and contributed zero commits
    Failed { source: String, reason: String },
}

impl FetchOutcome {
    pub fn source(&self) -> &str {
        match self {
            FetchOutcome::Fetched { source, .. } | FetchOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }
}

/// Which kind of source produced a week's commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Remote,
    Local,
    None,
}

/// Commits for one window plus how they were obtained.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub commits: Vec<CommitRecord>,
    pub outcomes: Vec<FetchOutcome>,
    pub origin: SourceOrigin,
    /// Remote repos queried plus local directories found
    pub sources_resolved: usize,
}

// ============================================
// Invoice
// ============================================

/// One billing line within a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub description: String,
    pub hours: f64,
    pub commit_count: usize,
}

impl TaskSummary {
    /// A task with a commit count and no hours yet
    pub fn counted(description: impl Into<String>, commit_count: usize) -> Self {
        Self {
            description: description.into(),
            hours: 0.0,
            commit_count,
        }
    }
}

/// The tasks billed for one Sunday-to-Saturday week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyWork {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub date_range_label: String,
    /// Always the configured hours-per-week
    pub total_hours: f64,
    pub tasks: Vec<TaskSummary>,
}

impl WeeklyWork {
    /// Sum of the task hours (equals `total_hours` on the heuristic path)
    pub fn allocated_hours(&self) -> f64 {
        self.tasks.iter().map(|t| t.hours).sum()
    }
}

/// A generated invoice. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    pub customer: String,
    pub start_date_label: String,
    pub end_date_label: String,
    pub formatted_text: String,
    pub total_hours: f64,
    pub weeks: Vec<WeeklyWork>,
}

/// An invoice as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedInvoice {
    pub id: String,
    pub config_id: String,
    pub invoice: InvoiceData,
    pub generated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl SavedInvoice {
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let window = CommitWindow::new(date(2024, 1, 7), date(2024, 1, 13));
        assert!(window.contains(date(2024, 1, 7)));
        assert!(window.contains(date(2024, 1, 13)));
        assert!(!window.contains(date(2024, 1, 6)));
        assert!(!window.contains(date(2024, 1, 14)));
    }

    #[test]
    fn test_invoice_serializes_camel_case() {
        let week = WeeklyWork {
            week_start: date(2024, 1, 7),
            week_end: date(2024, 1, 13),
            date_range_label: "January 7 - January 13, 2024".to_string(),
            total_hours: 10.0,
            tasks: vec![TaskSummary {
                description: "X".to_string(),
                hours: 10.0,
                commit_count: 2,
            }],
        };
        let json = serde_json::to_value(&week).unwrap();
        assert_eq!(json["weekStart"], "2024-01-07");
        assert_eq!(json["dateRangeLabel"], "January 7 - January 13, 2024");
        assert_eq!(json["tasks"][0]["commitCount"], 2);
        assert_eq!(week.allocated_hours(), 10.0);
    }

    #[test]
    fn test_fetch_outcome_accessors() {
        let failed = FetchOutcome::Failed {
            source: "acme/api".to_string(),
            reason: "404".to_string(),
        };
        assert!(failed.is_failed());
        assert_eq!(failed.source(), "acme/api");
    }
}
