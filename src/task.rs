use crate::calendar::OperatorId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TaskId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FinalStatus {
    #[default]
    #[serde(rename = "NON")]
    Pending,
    #[serde(rename = "OK")]
    Completed,
}

/// Task priority; `ToSchedule` marks work without a committed slot, which
/// lateness statistics ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
    ToSchedule,
}

impl Priority {
    pub fn code(&self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
            Priority::ToSchedule => 4,
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            // legacy rows stored low priority as 0
            0 | 3 => Ok(Priority::Low),
            4 => Ok(Priority::ToSchedule),
            other => Err(format!("unknown priority code {other}")),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.code()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The slice of a maintenance task the engine reads and writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<OperatorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub final_status: FinalStatus,
    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    pub fn new(
        id: TaskId,
        operator_id: OperatorId,
        start_date: NaiveDate,
        estimated_hours: f64,
    ) -> Self {
        Self {
            id,
            operator_id: Some(operator_id),
            start_date: Some(start_date),
            estimated_hours: Some(estimated_hours),
            predicted_end_date: None,
            completion_date: None,
            final_status: FinalStatus::Pending,
            priority: Priority::Medium,
        }
    }

    pub fn with_prediction(mut self, predicted_end_date: NaiveDate) -> Self {
        self.predicted_end_date = Some(predicted_end_date);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn complete(mut self, completion_date: NaiveDate) -> Self {
        self.final_status = FinalStatus::Completed;
        self.completion_date = Some(completion_date);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.final_status == FinalStatus::Completed
    }

    /// Lateness statistics only count tasks with a committed priority.
    pub fn is_tracked(&self) -> bool {
        self.priority != Priority::ToSchedule
    }

    /// Date the task is measured against: the predicted end date, or the
    /// planned start date when nothing has been predicted yet.
    pub fn deadline(&self) -> Option<NaiveDate> {
        self.predicted_end_date.or(self.start_date)
    }

    /// Whether `[start_date, predicted_end_date]` contains `date`.
    pub fn spans(&self, date: NaiveDate) -> bool {
        match (self.start_date, self.predicted_end_date) {
            (Some(start), Some(end)) => start <= date && date <= end,
            _ => false,
        }
    }
}
