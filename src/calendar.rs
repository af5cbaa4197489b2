use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub type OperatorId = i32;

/// Hours assumed for a working day whose entry does not say otherwise.
pub const DEFAULT_WORKING_HOURS: f64 = 8.0;

/// Upper bound for the hours an exception can make available on a day the
/// weekly template marks as non-working.
pub const MAX_DAY_HOURS: f64 = 24.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalendarError {
    #[error("weekly schedule requires exactly 7 entries (got {0})")]
    WrongEntryCount(usize),
    #[error("day_of_week {0} is outside 0 (Monday) ..= 6 (Sunday)")]
    DayOutOfRange(u8),
    #[error("day_of_week {0} appears more than once in the weekly schedule")]
    DuplicateWeekday(u8),
    #[error("invalid working hours {hours} for {context}")]
    InvalidHours { context: String, hours: f64 },
    #[error("more than one calendar exception on {0}")]
    DuplicateException(NaiveDate),
    #[error("unknown exception type '{0}'")]
    UnknownExceptionType(String),
    #[error("calendar snapshot belongs to operator {expected}, not {actual}")]
    OperatorMismatch {
        expected: OperatorId,
        actual: OperatorId,
    },
}

fn check_hours(hours: f64, context: impl FnOnce() -> String) -> Result<(), CalendarError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(CalendarError::InvalidHours {
            context: context(),
            hours,
        });
    }
    Ok(())
}

/// Normal working hours for one weekday (Monday = 0 ... Sunday = 6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScheduleEntryRecord")]
pub struct WeeklyScheduleEntry {
    pub day_of_week: u8,
    pub is_working_day: bool,
    pub working_hours: f64,
}

#[derive(Deserialize)]
struct ScheduleEntryRecord {
    day_of_week: u8,
    is_working_day: bool,
    #[serde(default)]
    working_hours: Option<f64>,
}

impl From<ScheduleEntryRecord> for WeeklyScheduleEntry {
    fn from(record: ScheduleEntryRecord) -> Self {
        Self::new(
            record.day_of_week,
            record.is_working_day,
            record.working_hours,
        )
    }
}

impl WeeklyScheduleEntry {
    /// Builds an entry, defaulting to 8h on working days. Non-working days
    /// always carry 0 hours.
    pub fn new(day_of_week: u8, is_working_day: bool, working_hours: Option<f64>) -> Self {
        let working_hours = if is_working_day {
            working_hours.unwrap_or(DEFAULT_WORKING_HOURS)
        } else {
            0.0
        };
        Self {
            day_of_week,
            is_working_day,
            working_hours,
        }
    }

    pub fn working(day_of_week: u8, hours: f64) -> Self {
        Self::new(day_of_week, true, Some(hours))
    }

    pub fn day_off(day_of_week: u8) -> Self {
        Self::new(day_of_week, false, None)
    }

    pub fn weekday(&self) -> Option<Weekday> {
        weekday_from_index(self.day_of_week)
    }

    /// Hours the template makes available on this weekday.
    pub fn capacity(&self) -> f64 {
        if self.is_working_day {
            self.working_hours
        } else {
            0.0
        }
    }
}

pub fn weekday_from_index(day_of_week: u8) -> Option<Weekday> {
    match day_of_week {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}

/// An operator's weekly template: exactly one entry per weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<WeeklyScheduleEntry>",
    into = "Vec<WeeklyScheduleEntry>"
)]
pub struct WeeklySchedule {
    entries: [WeeklyScheduleEntry; 7],
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self::standard()
    }
}

impl WeeklySchedule {
    /// Monday to Friday at 8h, weekend off. Used for operators with no
    /// stored template.
    pub fn standard() -> Self {
        let mut entries = [WeeklyScheduleEntry::day_off(0); 7];
        for (idx, entry) in entries.iter_mut().enumerate() {
            let day = idx as u8;
            *entry = if day < 5 {
                WeeklyScheduleEntry::working(day, DEFAULT_WORKING_HOURS)
            } else {
                WeeklyScheduleEntry::day_off(day)
            };
        }
        Self { entries }
    }

    /// Same hours on every working weekday.
    pub fn uniform<I>(working_days: I, hours: f64) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = Weekday>,
    {
        let working: Vec<Weekday> = working_days.into_iter().collect();
        let entries = (0u8..7).map(|day| {
            let is_working = weekday_from_index(day)
                .map(|wd| working.contains(&wd))
                .unwrap_or(false);
            WeeklyScheduleEntry::new(day, is_working, Some(hours))
        });
        Self::from_entries(entries)
    }

    pub fn from_entries<I>(entries: I) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = WeeklyScheduleEntry>,
    {
        let mut slots: [Option<WeeklyScheduleEntry>; 7] = [None; 7];
        let mut count = 0usize;
        for entry in entries {
            count += 1;
            if entry.day_of_week > 6 {
                return Err(CalendarError::DayOutOfRange(entry.day_of_week));
            }
            check_hours(entry.working_hours, || {
                format!("weekday {}", entry.day_of_week)
            })?;
            let slot = &mut slots[entry.day_of_week as usize];
            if slot.is_some() {
                return Err(CalendarError::DuplicateWeekday(entry.day_of_week));
            }
            // Re-normalise in case the caller built the struct literally.
            *slot = Some(WeeklyScheduleEntry::new(
                entry.day_of_week,
                entry.is_working_day,
                Some(entry.working_hours),
            ));
        }
        if count != 7 {
            return Err(CalendarError::WrongEntryCount(count));
        }

        let mut entries = [WeeklyScheduleEntry::day_off(0); 7];
        for (idx, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(entry) => entries[idx] = entry,
                None => return Err(CalendarError::WrongEntryCount(count)),
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WeeklyScheduleEntry; 7] {
        &self.entries
    }

    pub fn entry(&self, weekday: Weekday) -> &WeeklyScheduleEntry {
        &self.entries[weekday_index(weekday)]
    }

    pub fn hours_for(&self, weekday: Weekday) -> f64 {
        self.entry(weekday).capacity()
    }

    pub fn weekly_hours(&self) -> f64 {
        self.entries.iter().map(WeeklyScheduleEntry::capacity).sum()
    }

    pub fn has_capacity(&self) -> bool {
        self.entries.iter().any(|entry| entry.capacity() > 0.0)
    }

    /// Mean hours over working days that have hours, or 8h when the
    /// template has none.
    pub fn average_working_hours(&self) -> f64 {
        let (total, days) = self
            .entries
            .iter()
            .filter(|entry| entry.is_working_day && entry.working_hours > 0.0)
            .fold((0.0, 0u32), |(total, days), entry| {
                (total + entry.working_hours, days + 1)
            });
        if days == 0 {
            DEFAULT_WORKING_HOURS
        } else {
            total / f64::from(days)
        }
    }

    /// Returns a copy with one weekday replaced.
    pub fn with_entry(&self, entry: WeeklyScheduleEntry) -> Result<Self, CalendarError> {
        if entry.day_of_week > 6 {
            return Err(CalendarError::DayOutOfRange(entry.day_of_week));
        }
        let mut entries = self.entries;
        entries[entry.day_of_week as usize] = entry;
        Self::from_entries(entries)
    }
}

impl TryFrom<Vec<WeeklyScheduleEntry>> for WeeklySchedule {
    type Error = CalendarError;

    fn try_from(value: Vec<WeeklyScheduleEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(value)
    }
}

impl From<WeeklySchedule> for Vec<WeeklyScheduleEntry> {
    fn from(schedule: WeeklySchedule) -> Self {
        schedule.entries.to_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionType {
    Holiday,
    Vacation,
    Sick,
    Training,
    Other,
}

impl ExceptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionType::Holiday => "holiday",
            ExceptionType::Vacation => "vacation",
            ExceptionType::Sick => "sick",
            ExceptionType::Training => "training",
            ExceptionType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExceptionType::Holiday => "Jour férié",
            ExceptionType::Vacation => "Congés",
            ExceptionType::Sick => "Maladie",
            ExceptionType::Training => "Formation",
            ExceptionType::Other => "Autre",
        }
    }

    pub fn variants() -> [(&'static str, &'static str); 5] {
        [
            ("holiday", "Public holiday"),
            ("vacation", "Paid leave"),
            ("sick", "Sick leave"),
            ("training", "Training day"),
            ("other", "Any other absence or override"),
        ]
    }
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ExceptionType {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "holiday" => Ok(ExceptionType::Holiday),
            "vacation" => Ok(ExceptionType::Vacation),
            "sick" => Ok(ExceptionType::Sick),
            "training" => Ok(ExceptionType::Training),
            "other" => Ok(ExceptionType::Other),
            _ => Err(CalendarError::UnknownExceptionType(s.to_string())),
        }
    }
}

/// A date-specific override of the weekly template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarException {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub exception_type: ExceptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hours actually available that day; 0 is a full-day absence.
    #[serde(default)]
    pub working_hours: f64,
}

impl CalendarException {
    /// Full-day absence.
    pub fn new(date: NaiveDate, exception_type: ExceptionType) -> Self {
        Self {
            date,
            exception_type,
            description: None,
            working_hours: 0.0,
        }
    }

    /// Partial absence expressed the way operators enter it: hours away
    /// from a day that normally has `normal_hours`.
    pub fn from_absence(
        date: NaiveDate,
        exception_type: ExceptionType,
        normal_hours: f64,
        absence_hours: f64,
    ) -> Self {
        Self::new(date, exception_type).with_working_hours((normal_hours - absence_hours).max(0.0))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }

    pub fn with_working_hours(mut self, hours: f64) -> Self {
        self.working_hours = hours;
        self
    }

    pub fn absence_hours(&self, normal_hours: f64) -> f64 {
        (normal_hours - self.working_hours).max(0.0)
    }

    pub fn is_full_day_absence(&self) -> bool {
        self.working_hours <= 0.0
    }

    pub fn validate(&self) -> Result<(), CalendarError> {
        check_hours(self.working_hours, || format!("exception on {}", self.date))
    }
}

/// Caps exception hours at what the weekly template allows for that weekday.
/// A non-working weekday may be turned into a working one, up to a full day.
pub fn clamp_exception_hours(
    schedule: &WeeklySchedule,
    exception: &CalendarException,
) -> CalendarException {
    let entry = schedule.entry(exception.date.weekday());
    let cap = if entry.is_working_day {
        entry.working_hours
    } else {
        MAX_DAY_HOURS
    };
    let mut clamped = exception.clone();
    if clamped.working_hours > cap {
        debug!(
            date = %exception.date,
            requested = exception.working_hours,
            cap,
            "clamping exception hours to the weekly template"
        );
        clamped.working_hours = cap;
    }
    clamped
}

/// Read-only view of one operator's capacity: weekly template plus the
/// exceptions fetched for a bounded horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord", into = "SnapshotRecord")]
pub struct CalendarSnapshot {
    operator_id: OperatorId,
    schedule: WeeklySchedule,
    exceptions: BTreeMap<NaiveDate, CalendarException>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    operator_id: OperatorId,
    schedule: WeeklySchedule,
    #[serde(default)]
    exceptions: Vec<CalendarException>,
}

impl CalendarSnapshot {
    /// Rejects duplicate dates and negative hours; clamps exception hours to
    /// the template.
    pub fn new<I>(
        operator_id: OperatorId,
        schedule: WeeklySchedule,
        exceptions: I,
    ) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = CalendarException>,
    {
        let mut by_date = BTreeMap::new();
        for exception in exceptions {
            exception.validate()?;
            let date = exception.date;
            let clamped = clamp_exception_hours(&schedule, &exception);
            if by_date.insert(date, clamped).is_some() {
                return Err(CalendarError::DuplicateException(date));
            }
        }
        Ok(Self {
            operator_id,
            schedule,
            exceptions: by_date,
        })
    }

    /// Standard 5 x 8h template without exceptions.
    pub fn standard(operator_id: OperatorId) -> Self {
        Self {
            operator_id,
            schedule: WeeklySchedule::standard(),
            exceptions: BTreeMap::new(),
        }
    }

    pub fn operator_id(&self) -> OperatorId {
        self.operator_id
    }

    pub fn schedule(&self) -> &WeeklySchedule {
        &self.schedule
    }

    /// Exceptions in ascending date order.
    pub fn exceptions(&self) -> impl Iterator<Item = &CalendarException> {
        self.exceptions.values()
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    pub fn exception_on(&self, date: NaiveDate) -> Option<&CalendarException> {
        self.exceptions.get(&date)
    }

    /// Hours available on `date`: the exception when there is one, the
    /// weekly template otherwise.
    pub fn capacity_on(&self, date: NaiveDate) -> f64 {
        match self.exceptions.get(&date) {
            Some(exception) => exception.working_hours,
            None => self.schedule.hours_for(date.weekday()),
        }
    }

    pub fn ensure_operator(&self, operator_id: OperatorId) -> Result<(), CalendarError> {
        if self.operator_id != operator_id {
            return Err(CalendarError::OperatorMismatch {
                expected: self.operator_id,
                actual: operator_id,
            });
        }
        Ok(())
    }
}

impl TryFrom<SnapshotRecord> for CalendarSnapshot {
    type Error = CalendarError;

    fn try_from(record: SnapshotRecord) -> Result<Self, Self::Error> {
        Self::new(record.operator_id, record.schedule, record.exceptions)
    }
}

impl From<CalendarSnapshot> for SnapshotRecord {
    fn from(snapshot: CalendarSnapshot) -> Self {
        Self {
            operator_id: snapshot.operator_id,
            schedule: snapshot.schedule,
            exceptions: snapshot.exceptions.into_values().collect(),
        }
    }
}
