//! Text formatting for invoices.

use chrono::{Datelike, NaiveDate};

use crate::types::WeeklyWork;

/// Render hours without a trailing `.0` for whole numbers (`21`, `2.5`).
pub fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{:.0}", hours)
    } else {
        format!("{}", hours)
    }
}

/// Format a date as `January 1, 2024`.
pub fn format_date_label(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Format an inclusive week range as `January 1 - January 7, 2024`.
///
/// The year is repeated on the start when the range crosses a year boundary.
pub fn format_week_range(start: NaiveDate, end: NaiveDate) -> String {
    if start.year() == end.year() {
        format!(
            "{} - {}",
            start.format("%B %-d"),
            format_date_label(end)
        )
    } else {
        format!("{} - {}", format_date_label(start), format_date_label(end))
    }
}

/// Render one line item, `"<hours>hr - <description>"`.
pub fn format_line_item(hours: f64, description: &str) -> String {
    format!("{}hr - {}", format_hours(hours), description)
}

/// Render the invoice body.
///
/// Each week is a `"<label> ----- <hours>hrs"` header, one line per non-zero
/// task and a blank separator line; trailing whitespace is trimmed.
pub fn format_invoice_text(weeks: &[WeeklyWork]) -> String {
    let mut text = String::new();

    for week in weeks {
        text.push_str(&format!(
            "{} ----- {}hrs\n",
            week.date_range_label,
            format_hours(week.total_hours)
        ));
        for task in week.tasks.iter().filter(|t| t.hours > 0.0) {
            text.push_str(&format_line_item(task.hours, &task.description));
            text.push('\n');
        }
        text.push('\n');
    }

    text.trim_end().to_string()
}
