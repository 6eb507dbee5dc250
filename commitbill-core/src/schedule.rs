//! Schedule evaluation.
//!
//! [`should_run`] answers "is an invoice due today" for a schedule
//! descriptor. It holds no state; the scheduler calls it once per
//! configuration per pass.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// When an invoice configuration is due.
///
/// Unrecognized names deserialize to `Unknown` so that one mistyped entry
/// fails at evaluation time instead of rejecting the whole invoices file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScheduleType {
    WeeklySunday,
    BiWeeklySunday,
    MonthlyFirst,
    MonthlyLast,
    Custom,
    Unknown(String),
}

impl ScheduleType {
    pub fn as_str(&self) -> &str {
        match self {
            ScheduleType::WeeklySunday => "weekly-sunday",
            ScheduleType::BiWeeklySunday => "bi-weekly-sunday",
            ScheduleType::MonthlyFirst => "monthly-first",
            ScheduleType::MonthlyLast => "monthly-last",
            ScheduleType::Custom => "custom",
            ScheduleType::Unknown(name) => name,
        }
    }
}

impl From<String> for ScheduleType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "weekly-sunday" => ScheduleType::WeeklySunday,
            "bi-weekly-sunday" => ScheduleType::BiWeeklySunday,
            "monthly-first" => ScheduleType::MonthlyFirst,
            "monthly-last" => ScheduleType::MonthlyLast,
            "custom" => ScheduleType::Custom,
            _ => ScheduleType::Unknown(name),
        }
    }
}

impl From<ScheduleType> for String {
    fn from(kind: ScheduleType) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schedule descriptor from an invoice configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(rename = "type")]
    pub kind: ScheduleType,
    /// Anchor Sunday for `bi-weekly-sunday` (`YYYY-MM-DD`), checked when evaluated
    #[serde(default)]
    pub start_date: Option<String>,
}

impl Schedule {
    /// Parsed `startDate`, if one is set
    pub fn anchor(&self) -> Result<Option<NaiveDate>> {
        self.start_date
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                    Error::Schedule(format!("invalid startDate {:?}: {}", raw, e))
                })
            })
            .transpose()
    }
}

/// Whether an invoice with `schedule` is due on `today`.
///
/// Errors are configuration errors for that schedule only: an unknown type,
/// a malformed `startDate`, a bi-weekly schedule without one, or the
/// unimplemented `custom` type.
pub fn should_run(schedule: &Schedule, today: NaiveDate) -> Result<bool> {
    let anchor = schedule.anchor()?;
    match &schedule.kind {
        ScheduleType::WeeklySunday => Ok(today.weekday() == Weekday::Sun),
        ScheduleType::BiWeeklySunday => {
            let start = anchor.ok_or_else(|| {
                Error::Schedule("bi-weekly-sunday schedule requires startDate".to_string())
            })?;
            if today.weekday() != Weekday::Sun {
                return Ok(false);
            }
            let weeks = (today - start).num_days().div_euclid(7);
            Ok(weeks.rem_euclid(2) == 0)
        }
        ScheduleType::MonthlyFirst => Ok(today.day() == 1),
        ScheduleType::MonthlyLast => {
            let tomorrow = today + Duration::days(1);
            Ok(tomorrow.month() != today.month())
        }
        ScheduleType::Custom => Err(Error::Schedule(
            "custom schedules are not implemented".to_string(),
        )),
        ScheduleType::Unknown(name) => Err(Error::Schedule(format!(
            "unknown schedule type: {}",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule(kind: ScheduleType, start_date: Option<NaiveDate>) -> Schedule {
        Schedule {
            kind,
            start_date: start_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }

    #[test]
    fn test_weekly_sunday() {
        let s = schedule(ScheduleType::WeeklySunday, None);
        assert!(should_run(&s, date(2024, 9, 15)).unwrap());
        assert!(!should_run(&s, date(2024, 9, 16)).unwrap());
        assert!(!should_run(&s, date(2024, 9, 21)).unwrap());
    }

    #[test]
    fn test_bi_weekly_sunday() {
        let s = schedule(ScheduleType::BiWeeklySunday, Some(date(2024, 9, 15)));
        assert!(should_run(&s, date(2024, 9, 15)).unwrap());
        assert!(!should_run(&s, date(2024, 9, 22)).unwrap());
        assert!(should_run(&s, date(2024, 9, 29)).unwrap());
        assert!(!should_run(&s, date(2024, 9, 30)).unwrap());
    }

    #[test]
    fn test_bi_weekly_before_start_date() {
        let s = schedule(ScheduleType::BiWeeklySunday, Some(date(2024, 9, 15)));
        assert!(!should_run(&s, date(2024, 9, 8)).unwrap());
        assert!(should_run(&s, date(2024, 9, 1)).unwrap());
    }

    #[test]
    fn test_bi_weekly_requires_start_date() {
        let s = schedule(ScheduleType::BiWeeklySunday, None);
        let err = should_run(&s, date(2024, 9, 15)).unwrap_err();
        assert!(matches!(err, Error::Schedule(_)));
    }

    #[test]
    fn test_monthly_first_and_last() {
        let first = schedule(ScheduleType::MonthlyFirst, None);
        assert!(should_run(&first, date(2024, 3, 1)).unwrap());
        assert!(!should_run(&first, date(2024, 3, 2)).unwrap());

        let last = schedule(ScheduleType::MonthlyLast, None);
        assert!(should_run(&last, date(2024, 2, 29)).unwrap());
        assert!(!should_run(&last, date(2024, 2, 28)).unwrap());
        assert!(should_run(&last, date(2023, 2, 28)).unwrap());
        assert!(should_run(&last, date(2024, 12, 31)).unwrap());
    }

    #[test]
    fn test_custom_is_an_error() {
        let s = schedule(ScheduleType::Custom, None);
        assert!(should_run(&s, date(2024, 9, 15)).is_err());
    }

    #[test]
    fn test_parse_schedule_json() {
        let s: Schedule =
            serde_json::from_str(r#"{"type":"bi-weekly-sunday","startDate":"2024-09-15"}"#)
                .unwrap();
        assert_eq!(s.kind, ScheduleType::BiWeeklySunday);
        assert_eq!(s.anchor().unwrap(), Some(date(2024, 9, 15)));

        let s: Schedule = serde_json::from_str(r#"{"type":"monthly-last"}"#).unwrap();
        assert_eq!(s.kind, ScheduleType::MonthlyLast);
        assert_eq!(s.kind.to_string(), "monthly-last");
    }

    #[test]
    fn test_unknown_type_fails_at_evaluation() {
        let s: Schedule = serde_json::from_str(r#"{"type":"weekly-monday"}"#).unwrap();
        assert_eq!(s.kind, ScheduleType::Unknown("weekly-monday".to_string()));
        assert_eq!(s.kind.to_string(), "weekly-monday");

        let err = should_run(&s, date(2024, 9, 15)).unwrap_err();
        assert!(matches!(err, Error::Schedule(ref m) if m.contains("weekly-monday")));
    }

    #[test]
    fn test_malformed_start_date_fails_at_evaluation() {
        let s: Schedule =
            serde_json::from_str(r#"{"type":"bi-weekly-sunday","startDate":"2024-13-40"}"#)
                .unwrap();
        let err = should_run(&s, date(2024, 9, 15)).unwrap_err();
        assert!(matches!(err, Error::Schedule(ref m) if m.contains("startDate")));
    }

    #[test]
    fn test_schedule_type_serializes_by_name() {
        let s = schedule(ScheduleType::MonthlyFirst, None);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"type":"monthly-first","startDate":null}"#);
    }
}
