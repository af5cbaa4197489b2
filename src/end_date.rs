use crate::calendar::{CalendarError, CalendarSnapshot, OperatorId};
use crate::dates::{self, is_valid_effort};
use crate::range::DateRange;
use crate::task::{Task, TaskId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Five years of calendar days. A walk that finds no capacity within this
/// horizon is reported as unschedulable.
pub const DEFAULT_HORIZON_DAYS: u32 = 1830;

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("estimated hours must be a positive number (got {0})")]
    InvalidHours(f64),
    #[error("start date '{0}' could not be parsed")]
    InvalidStartDate(String),
    #[error("not enough working capacity within {horizon_days} days of {start}")]
    Unschedulable { start: NaiveDate, horizon_days: u32 },
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

impl PredictionError {
    /// Business outcomes a UI should show as "cannot predict"; everything
    /// else is a caller bug.
    pub fn is_business_outcome(&self) -> bool {
        !matches!(self, PredictionError::Calendar(_))
    }
}

/// What the walk did on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayAllocation {
    pub date: NaiveDate,
    pub capacity: f64,
    pub consumed: f64,
    pub remaining: f64,
}

pub struct EndDateCalculator<'a> {
    snapshot: &'a CalendarSnapshot,
    horizon_days: u32,
}

impl<'a> EndDateCalculator<'a> {
    pub fn new(snapshot: &'a CalendarSnapshot) -> Self {
        Self {
            snapshot,
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }

    pub fn with_horizon_days(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days.max(1);
        self
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    pub fn operator_id(&self) -> OperatorId {
        self.snapshot.operator_id()
    }

    /// Date on which the last hour of `hours` of effort is consumed.
    pub fn calculate(&self, start: NaiveDate, hours: f64) -> Result<NaiveDate, PredictionError> {
        self.walk(start, hours, |_| {})
    }

    /// Day-by-day breakdown of the prediction, zero-capacity days included.
    pub fn allocation_plan(
        &self,
        start: NaiveDate,
        hours: f64,
    ) -> Result<Vec<DayAllocation>, PredictionError> {
        let mut plan = Vec::new();
        self.walk(start, hours, |day| plan.push(day))?;
        Ok(plan)
    }

    pub fn available_hours_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        DateRange::new(start, end)
            .map(|date| self.snapshot.capacity_on(date))
            .sum()
    }

    fn walk<F>(&self, start: NaiveDate, hours: f64, mut visit: F) -> Result<NaiveDate, PredictionError>
    where
        F: FnMut(DayAllocation),
    {
        if !is_valid_effort(hours) {
            return Err(PredictionError::InvalidHours(hours));
        }

        let mut remaining = hours;
        // drift allowance, only once something has been subtracted
        let mut slack = 0.0;
        for date in DateRange::from(start).take(self.horizon_days as usize) {
            let capacity = self.snapshot.capacity_on(date);
            if capacity > 0.0 && remaining <= capacity + slack {
                visit(DayAllocation {
                    date,
                    capacity,
                    consumed: remaining,
                    remaining: 0.0,
                });
                debug!(
                    operator_id = self.snapshot.operator_id(),
                    %start,
                    hours,
                    end = %date,
                    "predicted end date"
                );
                return Ok(date);
            }
            remaining -= capacity;
            if capacity > 0.0 {
                slack = EPSILON;
            }
            visit(DayAllocation {
                date,
                capacity,
                consumed: capacity,
                remaining,
            });
        }

        warn!(
            operator_id = self.snapshot.operator_id(),
            %start,
            hours,
            remaining,
            horizon_days = self.horizon_days,
            "no end date within the lookahead horizon"
        );
        Err(PredictionError::Unschedulable {
            start,
            horizon_days: self.horizon_days,
        })
    }
}

/// `Result` form of the prediction, checking that the snapshot belongs to
/// `operator_id`.
pub fn try_calculate_end_date(
    start: NaiveDate,
    hours: f64,
    operator_id: OperatorId,
    snapshot: &CalendarSnapshot,
) -> Result<NaiveDate, PredictionError> {
    snapshot.ensure_operator(operator_id)?;
    EndDateCalculator::new(snapshot).calculate(start, hours)
}

/// Predicted completion date, or `None` when no date can be predicted.
pub fn calculate_end_date(
    start: NaiveDate,
    hours: f64,
    operator_id: OperatorId,
    snapshot: &CalendarSnapshot,
) -> Option<NaiveDate> {
    match try_calculate_end_date(start, hours, operator_id, snapshot) {
        Ok(date) => Some(date),
        Err(err) if err.is_business_outcome() => {
            debug!(operator_id, %start, hours, "cannot predict end date: {err}");
            None
        }
        Err(err) => {
            error!(operator_id, "end date requested with a foreign snapshot: {err}");
            None
        }
    }
}

/// Same as [`calculate_end_date`] for a start date that still needs parsing.
pub fn calculate_end_date_str(
    start: &str,
    hours: f64,
    operator_id: OperatorId,
    snapshot: &CalendarSnapshot,
) -> Option<NaiveDate> {
    let Some(start) = dates::parse_date(start) else {
        debug!(operator_id, input = start, "cannot predict end date: unparseable start");
        return None;
    };
    calculate_end_date(start, hours, operator_id, snapshot)
}

/// Re-predicts the task from its own start date and effort. Returns whether
/// the stored prediction changed; an unpredictable task ends up blank.
pub fn refresh_prediction(task: &mut Task, calculator: &EndDateCalculator<'_>) -> bool {
    let predicted = match (task.start_date, task.estimated_hours) {
        (Some(start), Some(hours)) => calculator.calculate(start, hours).ok(),
        _ => None,
    };
    if predicted == task.predicted_end_date {
        return false;
    }
    task.predicted_end_date = predicted;
    true
}

/// After an exception changes on `exception_date`, re-predicts the
/// calculator's operator's tasks whose planned span covers that date and
/// returns the ids whose prediction moved. The calculator's horizon applies.
pub fn recalculate_affected(
    tasks: &mut [Task],
    calculator: &EndDateCalculator<'_>,
    exception_date: NaiveDate,
) -> Vec<TaskId> {
    let operator_id = calculator.operator_id();
    let mut changed = Vec::new();
    for task in tasks
        .iter_mut()
        .filter(|task| task.operator_id == Some(operator_id))
        .filter(|task| task.spans(exception_date))
    {
        if refresh_prediction(task, calculator) {
            debug!(
                task_id = task.id,
                predicted_end_date = ?task.predicted_end_date,
                "prediction moved after calendar exception"
            );
            changed.push(task.id);
        }
    }
    changed
}
