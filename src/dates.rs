use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

const ISO_DATE: &str = "%Y-%m-%d";
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Parses `YYYY-MM-DD`, or the date part of an ISO / RFC 3339 timestamp.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_DATE) {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(stamp.date_naive());
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(stamp.date());
    }
    None
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(ISO_DATE).to_string()
}

/// `dd/mm/yyyy`, empty when there is no date to show.
pub fn format_date_fr(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// Last millisecond of `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last)
}

pub fn hours_between(later: NaiveDateTime, earlier: NaiveDateTime) -> f64 {
    (later - earlier).num_milliseconds() as f64 / MS_PER_HOUR
}

/// Effort must be a finite, strictly positive number of hours.
pub fn is_valid_effort(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0
}

/// Coarse urgency of a due date relative to today, for row highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStatus {
    Overdue,
    DueSoon,
    Normal,
}

pub fn date_status(date: NaiveDate, today: NaiveDate) -> DateStatus {
    let days = (date - today).num_days();
    if days < 0 {
        DateStatus::Overdue
    } else if days <= 7 {
        DateStatus::DueSoon
    } else {
        DateStatus::Normal
    }
}
