use chrono::{NaiveDate, Weekday};
use maintenance_calendar::end_date::refresh_prediction;
use maintenance_calendar::{
    CalendarException, CalendarSnapshot, EndDateCalculator, ExceptionType, PredictionError, Task,
    WeeklySchedule, WeeklyScheduleEntry, calculate_end_date, calculate_end_date_str,
    recalculate_affected, try_calculate_end_date,
};

const OP: i32 = 1;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn with_exceptions(exceptions: Vec<CalendarException>) -> CalendarSnapshot {
    CalendarSnapshot::new(OP, WeeklySchedule::standard(), exceptions).unwrap()
}

#[test]
fn baseline_five_by_eight_week() {
    let snapshot = CalendarSnapshot::standard(OP);
    // 2024-01-01 is a Monday, 2024-01-05 a Friday
    assert_eq!(calculate_end_date(d(2024, 1, 1), 8.0, OP, &snapshot), Some(d(2024, 1, 1)));
    assert_eq!(calculate_end_date(d(2024, 1, 1), 16.0, OP, &snapshot), Some(d(2024, 1, 2)));
    assert_eq!(calculate_end_date(d(2024, 1, 5), 8.0, OP, &snapshot), Some(d(2024, 1, 5)));
    assert_eq!(calculate_end_date(d(2024, 1, 5), 16.0, OP, &snapshot), Some(d(2024, 1, 8)));
}

#[test]
fn fractional_effort_finishes_on_the_first_day_with_enough_capacity() {
    let snapshot = CalendarSnapshot::standard(OP);
    assert_eq!(calculate_end_date(d(2024, 1, 1), 0.5, OP, &snapshot), Some(d(2024, 1, 1)));
    assert_eq!(calculate_end_date(d(2024, 1, 1), 8.25, OP, &snapshot), Some(d(2024, 1, 2)));
    assert_eq!(calculate_end_date(d(2024, 1, 1), 40.0, OP, &snapshot), Some(d(2024, 1, 5)));
    assert_eq!(calculate_end_date(d(2024, 1, 1), 40.5, OP, &snapshot), Some(d(2024, 1, 8)));
}

#[test]
fn starting_on_a_weekend_waits_for_monday() {
    let snapshot = CalendarSnapshot::standard(OP);
    assert_eq!(calculate_end_date(d(2024, 1, 6), 4.0, OP, &snapshot), Some(d(2024, 1, 8)));
}

#[test]
fn full_day_holiday_is_skipped() {
    let snapshot = with_exceptions(vec![
        CalendarException::new(d(2024, 1, 2), ExceptionType::Holiday).with_description("Férié"),
    ]);
    assert_eq!(calculate_end_date(d(2024, 1, 1), 16.0, OP, &snapshot), Some(d(2024, 1, 3)));
    // a task starting on the holiday begins the next day
    assert_eq!(calculate_end_date(d(2024, 1, 2), 8.0, OP, &snapshot), Some(d(2024, 1, 3)));
}

#[test]
fn partial_override_consumes_only_available_hours() {
    let snapshot = with_exceptions(vec![
        CalendarException::new(d(2024, 1, 1), ExceptionType::Training).with_working_hours(4.0),
    ]);
    let calculator = EndDateCalculator::new(&snapshot);
    assert_eq!(calculator.calculate(d(2024, 1, 1), 4.0), Ok(d(2024, 1, 1)));
    assert_eq!(calculator.calculate(d(2024, 1, 1), 12.0), Ok(d(2024, 1, 2)));
    assert_eq!(calculator.calculate(d(2024, 1, 1), 12.5), Ok(d(2024, 1, 3)));

    let plan = calculator.allocation_plan(d(2024, 1, 1), 12.0).unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].consumed, 4.0);
    assert_eq!(plan[0].remaining, 8.0);
    assert_eq!(plan[1].consumed, 8.0);
    assert_eq!(plan[1].remaining, 0.0);
}

#[test]
fn exception_can_open_a_weekend_day() {
    let snapshot = with_exceptions(vec![
        CalendarException::new(d(2024, 1, 6), ExceptionType::Other).with_working_hours(8.0),
    ]);
    assert_eq!(calculate_end_date(d(2024, 1, 5), 16.0, OP, &snapshot), Some(d(2024, 1, 6)));
}

#[test]
fn zero_capacity_days_appear_in_the_plan_without_consuming() {
    let snapshot = CalendarSnapshot::standard(OP);
    let plan = EndDateCalculator::new(&snapshot)
        .allocation_plan(d(2024, 1, 5), 12.0)
        .unwrap();
    let dates: Vec<_> = plan.iter().map(|day| day.date).collect();
    assert_eq!(dates, vec![d(2024, 1, 5), d(2024, 1, 6), d(2024, 1, 7), d(2024, 1, 8)]);
    assert_eq!(plan[1].consumed, 0.0);
    assert_eq!(plan[2].remaining, 4.0);
    assert_eq!(plan[3].consumed, 4.0);
}

#[test]
fn invalid_hours_cannot_be_predicted() {
    let snapshot = CalendarSnapshot::standard(OP);
    for hours in [0.0, -8.0, f64::NAN, f64::INFINITY] {
        assert_eq!(calculate_end_date(d(2024, 1, 1), hours, OP, &snapshot), None);
    }
    assert!(matches!(
        try_calculate_end_date(d(2024, 1, 1), -1.0, OP, &snapshot),
        Err(PredictionError::InvalidHours(_))
    ));
}

#[test]
fn unparseable_start_cannot_be_predicted() {
    let snapshot = CalendarSnapshot::standard(OP);
    assert_eq!(calculate_end_date_str("not a date", 8.0, OP, &snapshot), None);
    assert_eq!(calculate_end_date_str("2024-13-01", 8.0, OP, &snapshot), None);
    assert_eq!(
        calculate_end_date_str("2024-01-01T09:00:00Z", 16.0, OP, &snapshot),
        Some(d(2024, 1, 2))
    );
}

#[test]
fn template_without_capacity_is_unschedulable() {
    let idle = WeeklySchedule::uniform(Vec::<Weekday>::new(), 8.0).unwrap();
    let snapshot = CalendarSnapshot::new(OP, idle, Vec::new()).unwrap();
    let calculator = EndDateCalculator::new(&snapshot).with_horizon_days(60);
    assert_eq!(
        calculator.calculate(d(2024, 1, 1), 8.0),
        Err(PredictionError::Unschedulable {
            start: d(2024, 1, 1),
            horizon_days: 60
        })
    );
    assert_eq!(calculate_end_date(d(2024, 1, 1), 8.0, OP, &snapshot), None);
}

#[test]
fn effort_beyond_the_horizon_is_unschedulable() {
    let snapshot = CalendarSnapshot::standard(OP);
    let calculator = EndDateCalculator::new(&snapshot).with_horizon_days(7);
    // one week holds 40 hours
    assert!(calculator.calculate(d(2024, 1, 1), 40.0).is_ok());
    assert!(matches!(
        calculator.calculate(d(2024, 1, 1), 48.0),
        Err(PredictionError::Unschedulable { .. })
    ));
}

#[test]
fn foreign_snapshot_is_a_caller_error() {
    let snapshot = CalendarSnapshot::standard(2);
    let err = try_calculate_end_date(d(2024, 1, 1), 8.0, OP, &snapshot).unwrap_err();
    assert!(matches!(err, PredictionError::Calendar(_)));
    assert!(!err.is_business_outcome());
    assert_eq!(calculate_end_date(d(2024, 1, 1), 8.0, OP, &snapshot), None);
}

#[test]
fn available_hours_sum_template_and_exceptions() {
    let snapshot = with_exceptions(vec![
        CalendarException::new(d(2024, 1, 3), ExceptionType::Sick).with_working_hours(2.0),
    ]);
    let calculator = EndDateCalculator::new(&snapshot);
    assert_eq!(calculator.available_hours_between(d(2024, 1, 1), d(2024, 1, 7)), 34.0);
    assert_eq!(calculator.available_hours_between(d(2024, 1, 7), d(2024, 1, 1)), 0.0);
}

#[test]
fn custom_template_hours_drive_the_walk() {
    let schedule = WeeklySchedule::from_entries(vec![
        WeeklyScheduleEntry::working(0, 10.0),
        WeeklyScheduleEntry::working(1, 10.0),
        WeeklyScheduleEntry::working(2, 10.0),
        WeeklyScheduleEntry::working(3, 10.0),
        WeeklyScheduleEntry::day_off(4),
        WeeklyScheduleEntry::day_off(5),
        WeeklyScheduleEntry::day_off(6),
    ])
    .unwrap();
    let snapshot = CalendarSnapshot::new(OP, schedule, Vec::new()).unwrap();
    assert_eq!(calculate_end_date(d(2024, 1, 4), 15.0, OP, &snapshot), Some(d(2024, 1, 8)));
}

#[test]
fn refresh_prediction_reports_changes() {
    let snapshot = CalendarSnapshot::standard(OP);
    let calculator = EndDateCalculator::new(&snapshot);
    let mut task = Task::new(10, OP, d(2024, 1, 1), 16.0);
    assert!(refresh_prediction(&mut task, &calculator));
    assert_eq!(task.predicted_end_date, Some(d(2024, 1, 2)));
    assert!(!refresh_prediction(&mut task, &calculator));

    let mut broken = Task::new(11, OP, d(2024, 1, 1), 0.0).with_prediction(d(2024, 1, 1));
    assert!(refresh_prediction(&mut broken, &calculator));
    assert_eq!(broken.predicted_end_date, None);
}

#[test]
fn adding_an_exception_repredicts_only_covering_tasks() {
    let mut tasks = vec![
        Task::new(1, OP, d(2024, 1, 1), 24.0).with_prediction(d(2024, 1, 3)),
        Task::new(2, OP, d(2024, 1, 8), 8.0).with_prediction(d(2024, 1, 8)),
        Task::new(3, 2, d(2024, 1, 1), 24.0).with_prediction(d(2024, 1, 3)),
    ];
    let snapshot = with_exceptions(vec![
        CalendarException::new(d(2024, 1, 2), ExceptionType::Sick),
    ]);

    let calculator = EndDateCalculator::new(&snapshot);
    let moved = recalculate_affected(&mut tasks, &calculator, d(2024, 1, 2));
    assert_eq!(moved, vec![1]);
    assert_eq!(tasks[0].predicted_end_date, Some(d(2024, 1, 4)));
    assert_eq!(tasks[1].predicted_end_date, Some(d(2024, 1, 8)));
    assert_eq!(tasks[2].predicted_end_date, Some(d(2024, 1, 3)));
}

#[test]
fn reprediction_honours_the_calculator_horizon() {
    // 40h from Monday fits in the first week of a seven-day horizon
    let mut tasks = vec![Task::new(1, OP, d(2024, 1, 1), 40.0).with_prediction(d(2024, 1, 5))];
    let snapshot = with_exceptions(vec![
        CalendarException::new(d(2024, 1, 2), ExceptionType::Sick),
    ]);

    let calculator = EndDateCalculator::new(&snapshot).with_horizon_days(7);
    let moved = recalculate_affected(&mut tasks, &calculator, d(2024, 1, 2));
    assert_eq!(moved, vec![1]);
    assert_eq!(tasks[0].predicted_end_date, None);

    let mut tasks = vec![Task::new(1, OP, d(2024, 1, 1), 40.0).with_prediction(d(2024, 1, 5))];
    let wider = EndDateCalculator::new(&snapshot).with_horizon_days(8);
    recalculate_affected(&mut tasks, &wider, d(2024, 1, 2));
    assert_eq!(tasks[0].predicted_end_date, Some(d(2024, 1, 8)));
}

#[test]
fn effort_just_above_a_day_spills_over() {
    let snapshot = CalendarSnapshot::standard(OP);
    let calculator = EndDateCalculator::new(&snapshot);
    assert_eq!(calculator.calculate(d(2024, 1, 1), 8.0), Ok(d(2024, 1, 1)));
    assert_eq!(calculator.calculate(d(2024, 1, 1), 8.0000005), Ok(d(2024, 1, 2)));
}

#[test]
fn fractional_days_absorb_subtraction_drift() {
    let entries: Vec<_> = (0..7).map(|day| WeeklyScheduleEntry::working(day, 0.1)).collect();
    let schedule = WeeklySchedule::from_entries(entries).unwrap();
    let snapshot = CalendarSnapshot::new(OP, schedule, Vec::new()).unwrap();
    // 0.7 - 0.1 * 6 leaves slightly more than 0.1 in floating point
    assert_eq!(
        EndDateCalculator::new(&snapshot).calculate(d(2024, 1, 1), 0.7),
        Ok(d(2024, 1, 7))
    );
}
