//! On-time / overdue / completed-late classification of tasks against their
//! predicted end date, with an optional per-operator grace period.

use crate::calendar::{DEFAULT_WORKING_HOURS, OperatorId, WeeklySchedule};
use crate::config::DelayToleranceSettings;
use crate::dates::{end_of_day, hours_between};
use crate::task::Task;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Grace period granted by the tolerant mode: one full calendar day.
pub const DEFAULT_TOLERANCE_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lateness {
    OnTime,
    Overdue,
    CompletedLate,
}

impl Lateness {
    pub fn is_late(&self) -> bool {
        !matches!(self, Lateness::OnTime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    #[default]
    Strict,
    Tolerant,
}

/// Hours a task may run past its deadline before it counts as late.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceWindow {
    hours: f64,
}

impl Default for ToleranceWindow {
    fn default() -> Self {
        Self::one_day()
    }
}

impl ToleranceWindow {
    pub fn none() -> Self {
        Self { hours: 0.0 }
    }

    pub fn one_day() -> Self {
        Self {
            hours: DEFAULT_TOLERANCE_HOURS,
        }
    }

    pub fn from_hours(hours: f64) -> Self {
        if hours.is_finite() && hours > 0.0 {
            Self { hours }
        } else {
            Self::none()
        }
    }

    /// Window for an operator. The grace period is one calendar day
    /// whatever the operator's daily hours, including operators without a
    /// template or without capacity.
    pub fn for_schedule(schedule: Option<&WeeklySchedule>) -> Self {
        let daily_hours =
            schedule.map_or(DEFAULT_WORKING_HOURS, WeeklySchedule::average_working_hours);
        debug!(daily_hours, "tolerance window fixed at one calendar day");
        Self::one_day()
    }

    pub fn hours(&self) -> f64 {
        self.hours
    }

    /// Last date that still counts as on time.
    pub fn effective_deadline(&self, deadline: NaiveDate) -> NaiveDate {
        let days = (self.hours / 24.0).floor() as u64;
        deadline
            .checked_add_days(Days::new(days))
            .unwrap_or(deadline)
    }
}

/// Hours between the end of `deadline` and the end of `reference`.
pub fn delay_hours(reference: NaiveDate, deadline: NaiveDate) -> f64 {
    hours_between(end_of_day(reference), end_of_day(deadline))
}

fn classify_within(task: &Task, today: NaiveDate, tolerance_hours: f64) -> Lateness {
    let Some(deadline) = task.deadline() else {
        return Lateness::OnTime;
    };
    let (reference, late_as) = if task.is_completed() {
        match task.completion_date {
            Some(done) => (done, Lateness::CompletedLate),
            None => return Lateness::OnTime,
        }
    } else {
        (today, Lateness::Overdue)
    };

    let delay = delay_hours(reference, deadline);
    if delay <= 0.0 {
        return Lateness::OnTime;
    }
    if delay > tolerance_hours {
        late_as
    } else {
        debug!(
            task_id = task.id,
            delay, tolerance_hours, "late task kept on time by the tolerance window"
        );
        Lateness::OnTime
    }
}

/// Day-granularity comparison: same day is never late.
pub fn classify_strict(task: &Task, today: NaiveDate) -> Lateness {
    classify_within(task, today, 0.0)
}

pub fn classify_tolerant(task: &Task, today: NaiveDate, window: ToleranceWindow) -> Lateness {
    classify_within(task, today, window.hours())
}

/// Flag persisted when a task is closed: strictly completed after its
/// deadline.
pub fn was_overdue_on_completion(task: &Task) -> bool {
    if !task.is_completed() {
        return false;
    }
    match (task.completion_date, task.deadline()) {
        (Some(done), Some(deadline)) => done > deadline,
        _ => false,
    }
}

/// Classifies tasks of several operators as of one day.
#[derive(Debug, Clone)]
pub struct LatenessClassifier {
    today: NaiveDate,
    mode: ClassificationMode,
    windows: HashMap<OperatorId, ToleranceWindow>,
    fallback: ToleranceWindow,
}

impl LatenessClassifier {
    pub fn strict(today: NaiveDate) -> Self {
        Self {
            today,
            mode: ClassificationMode::Strict,
            windows: HashMap::new(),
            fallback: ToleranceWindow::for_schedule(None),
        }
    }

    pub fn tolerant(today: NaiveDate) -> Self {
        Self {
            mode: ClassificationMode::Tolerant,
            ..Self::strict(today)
        }
    }

    pub fn from_settings(today: NaiveDate, settings: &DelayToleranceSettings) -> Self {
        if settings.enabled {
            Self::tolerant(today)
        } else {
            Self::strict(today)
        }
    }

    pub fn with_schedule(mut self, operator_id: OperatorId, schedule: &WeeklySchedule) -> Self {
        self.windows
            .insert(operator_id, ToleranceWindow::for_schedule(Some(schedule)));
        self
    }

    pub fn with_window(mut self, operator_id: OperatorId, window: ToleranceWindow) -> Self {
        self.windows.insert(operator_id, window);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn mode(&self) -> ClassificationMode {
        self.mode
    }

    pub fn window_for(&self, operator_id: Option<OperatorId>) -> ToleranceWindow {
        operator_id
            .and_then(|id| self.windows.get(&id).copied())
            .unwrap_or(self.fallback)
    }

    pub fn classify(&self, task: &Task) -> Lateness {
        match self.mode {
            ClassificationMode::Strict => classify_strict(task, self.today),
            ClassificationMode::Tolerant => {
                classify_tolerant(task, self.today, self.window_for(task.operator_id))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSummary {
    pub enabled: bool,
    pub tolerance_hours: f64,
    pub average_working_hours: f64,
    pub message: String,
}

pub fn tolerance_summary(
    settings: &DelayToleranceSettings,
    schedule: Option<&WeeklySchedule>,
) -> ToleranceSummary {
    let average_working_hours =
        schedule.map_or(DEFAULT_WORKING_HOURS, WeeklySchedule::average_working_hours);
    if !settings.enabled {
        return ToleranceSummary {
            enabled: false,
            tolerance_hours: 0.0,
            average_working_hours,
            message: "tolerance disabled".to_string(),
        };
    }
    let window = ToleranceWindow::for_schedule(schedule);
    ToleranceSummary {
        enabled: true,
        tolerance_hours: window.hours(),
        average_working_hours,
        message: format!("tolerance: {:.1}h (one full day)", window.hours()),
    }
}
