#![cfg(feature = "sqlite")]

use chrono::{NaiveDate, Weekday};
use maintenance_calendar::{
    CalendarException, CalendarStore, EndDateCalculator, ExceptionType, PersistenceError,
    SqliteCalendarStore, WeeklySchedule,
};
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn sqlite_store_persists_across_connections() {
    let file = NamedTempFile::new().unwrap();
    let four_days = WeeklySchedule::uniform(
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu],
        9.5,
    )
    .unwrap();
    {
        let store = SqliteCalendarStore::new(file.path()).unwrap();
        store.save_weekly_schedule(5, &four_days).unwrap();
        store
            .add_exception(
                5,
                &CalendarException::new(d(2025, 5, 1), ExceptionType::Holiday)
                    .with_description("Fête du travail"),
            )
            .unwrap();
    }

    let reopened = SqliteCalendarStore::new(file.path()).unwrap();
    assert_eq!(reopened.weekly_schedule(5).unwrap(), four_days);
    let exceptions = reopened.exceptions(5, d(2025, 1, 1), d(2025, 12, 31)).unwrap();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].description.as_deref(), Some("Fête du travail"));
}

#[test]
fn sqlite_store_defaults_to_standard_week() {
    let store = SqliteCalendarStore::in_memory().unwrap();
    assert_eq!(store.weekly_schedule(9).unwrap(), WeeklySchedule::standard());
}

#[test]
fn sqlite_unique_date_is_a_conflict() {
    let store = SqliteCalendarStore::in_memory().unwrap();
    let sick = CalendarException::new(d(2025, 3, 3), ExceptionType::Sick);
    store.add_exception(1, &sick).unwrap();
    assert!(matches!(
        store.add_exception(1, &sick),
        Err(PersistenceError::Conflict(_))
    ));

    store
        .upsert_exception(1, &sick.clone().with_working_hours(4.0))
        .unwrap();
    let stored = store.exceptions(1, d(2025, 3, 3), d(2025, 3, 3)).unwrap();
    assert_eq!(stored[0].working_hours, 4.0);

    assert!(store.delete_exception(1, d(2025, 3, 3)).unwrap());
    assert!(!store.delete_exception(1, d(2025, 3, 3)).unwrap());
}

#[test]
fn sqlite_range_insert_and_open_bounds() {
    let store = SqliteCalendarStore::in_memory().unwrap();
    store
        .add_exception(2, &CalendarException::new(d(2025, 8, 13), ExceptionType::Training))
        .unwrap();
    let report = store
        .add_exception_range(2, d(2025, 8, 11), d(2025, 8, 15), ExceptionType::Vacation, None, 0.0)
        .unwrap();
    assert_eq!(report.summary(), "4/5 exceptions created");
    assert_eq!(report.conflicts, vec![d(2025, 8, 13)]);

    let all = store.exceptions(2, NaiveDate::MIN, NaiveDate::MAX).unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|pair| pair[0].date < pair[1].date));
}

#[test]
fn sqlite_snapshot_feeds_the_calculator() {
    let store = SqliteCalendarStore::in_memory().unwrap();
    store
        .add_exception(3, &CalendarException::new(d(2025, 1, 1), ExceptionType::Holiday))
        .unwrap();
    let snapshot = store.snapshot(3, d(2025, 1, 1), 30).unwrap();
    // Wednesday holiday, 16h lands on Friday
    assert_eq!(
        EndDateCalculator::new(&snapshot).calculate(d(2025, 1, 1), 16.0),
        Ok(d(2025, 1, 3))
    );
}

#[test]
fn sqlite_update_replaces_in_place() {
    let store = SqliteCalendarStore::in_memory().unwrap();
    store
        .add_exception(4, &CalendarException::new(d(2025, 6, 2), ExceptionType::Sick))
        .unwrap();
    let half_day = CalendarException::new(d(2025, 6, 2), ExceptionType::Training)
        .with_working_hours(4.0);
    store.update_exception(4, d(2025, 6, 2), &half_day).unwrap();
    let stored = store.exceptions(4, d(2025, 6, 1), d(2025, 6, 30)).unwrap();
    assert_eq!(stored, vec![half_day]);
}
