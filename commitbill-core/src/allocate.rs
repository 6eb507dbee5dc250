//! Hour allocation across categories.
//!
//! A week's budget is fixed; categories receive shares proportional to their
//! commit counts, rounded to the nearest half hour. The last category absorbs
//! the rounding error so the shares always sum to the budget.

use crate::types::TaskSummary;

/// Description used when a week has no categorized work
pub const FALLBACK_TASK: &str = "Development and maintenance";

/// Round to the nearest 0.5 (halves round away from zero).
pub fn round_to_half(hours: f64) -> f64 {
    (hours * 2.0).round() / 2.0
}

/// Fill in hours for `tasks` (ordered by commit count, descending).
///
/// Tasks that end up with zero hours are dropped.
pub fn allocate(tasks: Vec<TaskSummary>, total_hours: f64) -> Vec<TaskSummary> {
    if tasks.is_empty() {
        return vec![TaskSummary {
            description: FALLBACK_TASK.to_string(),
            hours: total_hours,
            commit_count: 0,
        }];
    }

    let total_commits: usize = tasks.iter().map(|t| t.commit_count).sum();

    let allocated: Vec<TaskSummary> = if total_commits == 0 {
        let even = round_to_half(total_hours / tasks.len() as f64);
        tasks
            .into_iter()
            .map(|t| TaskSummary { hours: even, ..t })
            .collect()
    } else {
        let last = tasks.len() - 1;
        let mut remaining = total_hours;

        tasks
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let hours = if i == last {
                    remaining
                } else {
                    let share = total_hours * t.commit_count as f64 / total_commits as f64;
                    let hours = round_to_half(share).min(remaining);
                    remaining -= hours;
                    hours
                };
                TaskSummary { hours, ..t }
            })
            .collect()
    };

    allocated.into_iter().filter(|t| t.hours > 0.0).collect()
}
