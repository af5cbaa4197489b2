pub mod calendar;
pub mod config;
pub mod coordination;
pub mod dates;
pub mod end_date;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod lateness;
pub mod persistence;
pub mod range;
pub mod stats;
pub mod task;

pub use calendar::{
    CalendarError, CalendarException, CalendarSnapshot, ExceptionType, OperatorId,
    WeeklySchedule, WeeklyScheduleEntry,
};
pub use config::{ConfigError, DelayToleranceSettings, EngineConfig};
pub use coordination::{OperatorGuard, OperatorLocks};
pub use dates::{DateStatus, date_status, parse_date};
pub use end_date::{
    DEFAULT_HORIZON_DAYS, DayAllocation, EndDateCalculator, PredictionError, calculate_end_date,
    calculate_end_date_str, recalculate_affected, try_calculate_end_date,
};
pub use lateness::{
    ClassificationMode, Lateness, LatenessClassifier, ToleranceSummary, ToleranceWindow,
    classify_strict, classify_tolerant, tolerance_summary, was_overdue_on_completion,
};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteCalendarStore;
pub use persistence::{
    BulkInsertReport, CalendarStore, InMemoryCalendarStore, PersistenceError, PersistenceResult,
    load_exceptions_from_csv, load_snapshot_from_json, save_exceptions_to_csv,
    save_snapshot_to_json,
};
pub use range::{DateRange, ExceptionGroup, expand, group_exceptions};
pub use stats::LatenessStats;
pub use task::{FinalStatus, Priority, Task, TaskId};
