use chrono::NaiveDate;
use maintenance_calendar::range::{exceptions_for_range, sort_groups_newest_first};
use maintenance_calendar::{
    CalendarException, DateRange, ExceptionType, expand, group_exceptions,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn single_day_range_yields_that_day() {
    assert_eq!(expand(d(2024, 2, 29), d(2024, 2, 29)), vec![d(2024, 2, 29)]);
}

#[test]
fn range_crosses_month_and_year_boundaries() {
    let dates = expand(d(2023, 12, 30), d(2024, 1, 2));
    assert_eq!(
        dates,
        vec![d(2023, 12, 30), d(2023, 12, 31), d(2024, 1, 1), d(2024, 1, 2)]
    );
}

#[test]
fn adjacent_ranges_concatenate() {
    let (d1, d2, d3) = (d(2024, 2, 20), d(2024, 2, 28), d(2024, 3, 5));
    let mut joined = expand(d1, d2);
    joined.extend(expand(d2.succ_opt().unwrap(), d3));
    assert_eq!(joined, expand(d1, d3));
}

#[test]
fn reversed_range_is_empty() {
    assert!(expand(d(2024, 1, 10), d(2024, 1, 1)).is_empty());
}

#[test]
fn date_range_is_restartable() {
    let range = DateRange::new(d(2024, 1, 1), d(2024, 1, 7));
    assert_eq!(range.size_hint(), (7, Some(7)));
    let first: Vec<_> = range.clone().collect();
    let second: Vec<_> = range.collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 7);
}

#[test]
fn range_creation_produces_one_exception_per_day() {
    let exceptions = exceptions_for_range(
        d(2024, 7, 29),
        d(2024, 8, 2),
        ExceptionType::Vacation,
        Some("Congés d'été"),
        0.0,
    );
    assert_eq!(exceptions.len(), 5);
    assert!(exceptions.iter().all(|e| e.exception_type == ExceptionType::Vacation));
    assert!(exceptions
        .iter()
        .all(|e| e.description.as_deref() == Some("Congés d'été")));
    assert_eq!(exceptions[4].date, d(2024, 8, 2));
}

fn exception(date: NaiveDate, kind: ExceptionType, description: &str) -> CalendarException {
    CalendarException::new(date, kind).with_description(description)
}

#[test]
fn grouping_merges_consecutive_matching_days() {
    let exceptions = vec![
        exception(d(2024, 8, 7), ExceptionType::Vacation, "Été"),
        exception(d(2024, 8, 5), ExceptionType::Vacation, "Été"),
        exception(d(2024, 8, 6), ExceptionType::Vacation, "Été"),
        exception(d(2024, 8, 15), ExceptionType::Holiday, "Assomption"),
    ];
    let groups = group_exceptions(&exceptions);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].start, d(2024, 8, 5));
    assert_eq!(groups[0].end, d(2024, 8, 7));
    assert_eq!(groups[0].day_count(), 3);
    assert!(groups[0].is_range());
    assert_eq!(groups[1].start, groups[1].end);
    assert!(!groups[1].is_range());
}

#[test]
fn grouping_splits_on_type_description_or_gap() {
    let exceptions = vec![
        exception(d(2024, 3, 4), ExceptionType::Sick, "Grippe"),
        exception(d(2024, 3, 5), ExceptionType::Sick, "Angine"),
        exception(d(2024, 3, 6), ExceptionType::Training, "Angine"),
        exception(d(2024, 3, 8), ExceptionType::Training, "Angine"),
    ];
    let groups = group_exceptions(&exceptions);
    assert_eq!(groups.len(), 4);
    assert!(groups.iter().all(|g| g.day_count() == 1));
}

#[test]
fn grouping_treats_missing_description_as_its_own_value() {
    let exceptions = vec![
        CalendarException::new(d(2024, 4, 1), ExceptionType::Other),
        CalendarException::new(d(2024, 4, 2), ExceptionType::Other),
        exception(d(2024, 4, 3), ExceptionType::Other, "Réunion"),
    ];
    let groups = group_exceptions(&exceptions);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].dates, vec![d(2024, 4, 1), d(2024, 4, 2)]);
}

#[test]
fn newest_first_ordering_for_display() {
    let exceptions = vec![
        exception(d(2024, 1, 1), ExceptionType::Holiday, "Nouvel an"),
        exception(d(2024, 5, 1), ExceptionType::Holiday, "Fête du travail"),
        exception(d(2024, 12, 25), ExceptionType::Holiday, "Noël"),
    ];
    let mut groups = group_exceptions(&exceptions);
    sort_groups_newest_first(&mut groups);
    let starts: Vec<_> = groups.iter().map(|g| g.start).collect();
    assert_eq!(starts, vec![d(2024, 12, 25), d(2024, 5, 1), d(2024, 1, 1)]);
}

#[test]
fn grouping_nothing_yields_nothing() {
    let none: Vec<CalendarException> = Vec::new();
    assert!(group_exceptions(&none).is_empty());
}
