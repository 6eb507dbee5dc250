//! Heuristic commit categorization.
//!
//! Each commit message is lower-cased and tested against [`CATEGORY_RULES`] in
//! order; the first rule with a matching keyword wins. Keywords are plain
//! substrings, so `"prefix"` counts as a fix and `"guide"` as UI work.

use crate::types::{CommitRecord, TaskSummary};

/// A keyword rule mapping commit messages to a billing category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRule {
    pub keywords: &'static [&'static str],
    pub label: &'static str,
}

impl CategoryRule {
    /// Whether the (already lower-cased) message contains any keyword
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Label for commits no rule matches
pub const GENERAL_LABEL: &str = "General development and maintenance";

/// Ordered rule table. Order is the tie-break for messages matching several rules.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        keywords: &["fix", "bug", "error"],
        label: "Bug fixes and error resolution",
    },
    CategoryRule {
        keywords: &["feat", "add", "implement"],
        label: "New feature development",
    },
    CategoryRule {
        keywords: &["refactor", "clean", "optimize"],
        label: "Code refactoring and optimization",
    },
    CategoryRule {
        keywords: &["test", "spec"],
        label: "Testing and quality assurance",
    },
    CategoryRule {
        keywords: &["doc", "readme"],
        label: "Documentation updates",
    },
    CategoryRule {
        keywords: &["ui", "style", "css"],
        label: "UI/UX improvements",
    },
    CategoryRule {
        keywords: &["data", "database", "migration"],
        label: "Database and data management",
    },
    CategoryRule {
        keywords: &["api", "endpoint", "route"],
        label: "API development and updates",
    },
    CategoryRule {
        keywords: &["deploy", "build", "ci"],
        label: "Deployment and DevOps",
    },
    CategoryRule {
        keywords: &["fax"],
        label: "Fax system development",
    },
    CategoryRule {
        keywords: &["dashboard", "insight", "report"],
        label: "Dashboard and reporting features",
    },
    CategoryRule {
        keywords: &["transfer", "patient"],
        label: "Patient transfer workflow",
    },
];

/// Category label for a single commit message.
pub fn categorize_message(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.label)
        .unwrap_or(GENERAL_LABEL)
}

/// Group commits by category.
///
/// Returns one task per category with its commit count and zero hours,
/// sorted by count descending. Equal counts keep first-seen order.
pub fn categorize(commits: &[CommitRecord]) -> Vec<TaskSummary> {
    let mut tasks: Vec<TaskSummary> = Vec::new();

    for commit in commits {
        let label = categorize_message(&commit.message);
        match tasks.iter_mut().find(|t| t.description == label) {
            Some(task) => task.commit_count += 1,
            None => tasks.push(TaskSummary::counted(label, 1)),
        }
    }

    // sort_by is stable, so tied counts keep first-seen order
    tasks.sort_by(|a, b| b.commit_count.cmp(&a.commit_count));
    tasks
}
