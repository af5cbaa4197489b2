use crate::calendar::{
    CalendarError, CalendarException, CalendarSnapshot, ExceptionType, OperatorId, WeeklySchedule,
};
use crate::range::exceptions_for_range;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("calendar error: {0}")]
    Calendar(#[from] CalendarError),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Outcome of a multi-day exception request: conflicting dates are skipped,
/// not fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInsertReport {
    pub requested: usize,
    pub created: Vec<NaiveDate>,
    pub conflicts: Vec<NaiveDate>,
}

impl BulkInsertReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn is_complete(&self) -> bool {
        self.created.len() == self.requested
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} exceptions created",
            self.created.len(),
            self.requested
        )
    }
}

/// Storage contract the engine's callers fetch calendar data through.
pub trait CalendarStore {
    /// The operator's template, or the standard 5 x 8h week when none is
    /// stored.
    fn weekly_schedule(&self, operator_id: OperatorId) -> PersistenceResult<WeeklySchedule>;

    fn save_weekly_schedule(
        &self,
        operator_id: OperatorId,
        schedule: &WeeklySchedule,
    ) -> PersistenceResult<()>;

    /// Exceptions dated within `start..=end`, ascending.
    fn exceptions(
        &self,
        operator_id: OperatorId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PersistenceResult<Vec<CalendarException>>;

    /// Fails with [`PersistenceError::Conflict`] when the operator already has
    /// an exception on that date.
    fn add_exception(
        &self,
        operator_id: OperatorId,
        exception: &CalendarException,
    ) -> PersistenceResult<()>;

    /// Inserts or replaces the exception for `(operator, date)`.
    fn upsert_exception(
        &self,
        operator_id: OperatorId,
        exception: &CalendarException,
    ) -> PersistenceResult<()>;

    fn delete_exception(&self, operator_id: OperatorId, date: NaiveDate)
    -> PersistenceResult<bool>;

    /// Replaces the exception stored on `date` with `exception`, which may
    /// carry another date. Fails with [`PersistenceError::NotFound`] when
    /// nothing is stored on `date`, and with [`PersistenceError::Conflict`]
    /// when the target date is taken by a different exception.
    fn update_exception(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
        exception: &CalendarException,
    ) -> PersistenceResult<()> {
        exception.validate()?;
        if self.exceptions(operator_id, date, date)?.is_empty() {
            return Err(PersistenceError::NotFound(format!(
                "operator {operator_id} has no exception on {date}"
            )));
        }
        if exception.date != date
            && !self
                .exceptions(operator_id, exception.date, exception.date)?
                .is_empty()
        {
            return Err(conflict(operator_id, exception.date));
        }
        self.delete_exception(operator_id, date)?;
        self.upsert_exception(operator_id, exception)?;
        info!(operator_id, from = %date, to = %exception.date, "exception updated");
        Ok(())
    }

    /// Template plus the exceptions of `from ..= from + days`.
    fn snapshot(
        &self,
        operator_id: OperatorId,
        from: NaiveDate,
        days: u32,
    ) -> PersistenceResult<CalendarSnapshot> {
        let schedule = self.weekly_schedule(operator_id)?;
        let until = from
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        let exceptions = self.exceptions(operator_id, from, until)?;
        Ok(CalendarSnapshot::new(operator_id, schedule, exceptions)?)
    }

    /// One exception per date of `start..=end`; dates that already carry an
    /// exception are reported and skipped.
    fn add_exception_range(
        &self,
        operator_id: OperatorId,
        start: NaiveDate,
        end: NaiveDate,
        exception_type: ExceptionType,
        description: Option<&str>,
        working_hours: f64,
    ) -> PersistenceResult<BulkInsertReport> {
        if end < start {
            return Err(PersistenceError::InvalidData(format!(
                "range end {end} is before start {start}"
            )));
        }
        let mut report = BulkInsertReport::default();
        for exception in exceptions_for_range(start, end, exception_type, description, working_hours)
        {
            report.requested += 1;
            match self.add_exception(operator_id, &exception) {
                Ok(()) => report.created.push(exception.date),
                Err(PersistenceError::Conflict(reason)) => {
                    warn!(operator_id, date = %exception.date, %reason, "skipping exception");
                    report.conflicts.push(exception.date);
                }
                Err(err) => return Err(err),
            }
        }
        info!(operator_id, %start, %end, "{}", report.summary());
        Ok(report)
    }
}

pub(crate) fn conflict(operator_id: OperatorId, date: NaiveDate) -> PersistenceError {
    PersistenceError::Conflict(format!(
        "operator {operator_id} already has an exception on {date}"
    ))
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_exceptions_from_csv, load_snapshot_from_json, save_exceptions_to_csv,
    save_snapshot_to_json,
};
pub use memory::InMemoryCalendarStore;
