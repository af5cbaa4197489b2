use crate::calendar::{CalendarException, ExceptionType};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive, ascending walk over calendar dates. Cloning restarts the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DateRange {
    /// Empty when `end < start`; the bounds are never swapped.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            next: (start <= end).then_some(start),
            end,
        }
    }

    /// Open-ended walk from `start`.
    pub fn from(start: NaiveDate) -> Self {
        Self::new(start, NaiveDate::MAX)
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current < self.end {
            current.succ_opt()
        } else {
            None
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(current) => {
                let remaining = (self.end - current).num_days() as usize + 1;
                (remaining, Some(remaining))
            }
            None => (0, Some(0)),
        }
    }
}

/// Every date from `start` to `end`, both included.
pub fn expand(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    DateRange::new(start, end).collect()
}

/// One exception record per date of a multi-day absence.
pub fn exceptions_for_range(
    start: NaiveDate,
    end: NaiveDate,
    exception_type: ExceptionType,
    description: Option<&str>,
    working_hours: f64,
) -> Vec<CalendarException> {
    DateRange::new(start, end)
        .map(|date| {
            let exception =
                CalendarException::new(date, exception_type).with_working_hours(working_hours);
            match description {
                Some(text) => exception.with_description(text),
                None => exception,
            }
        })
        .collect()
}

/// Consecutive exceptions sharing type and description, shown as one range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionGroup {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(rename = "type")]
    pub exception_type: ExceptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub dates: Vec<NaiveDate>,
}

impl ExceptionGroup {
    fn start_with(exception: &CalendarException) -> Self {
        Self {
            start: exception.date,
            end: exception.date,
            exception_type: exception.exception_type,
            description: exception.description.clone(),
            dates: vec![exception.date],
        }
    }

    fn accepts(&self, exception: &CalendarException) -> bool {
        self.end.checked_add_days(Days::new(1)) == Some(exception.date)
            && self.exception_type == exception.exception_type
            && self.description == exception.description
    }

    pub fn day_count(&self) -> usize {
        self.dates.len()
    }

    pub fn is_range(&self) -> bool {
        self.dates.len() > 1
    }
}

/// Folds exceptions, sorted by date, into groups of consecutive days with the
/// same type and description. Groups come back in ascending order.
pub fn group_exceptions<'a, I>(exceptions: I) -> Vec<ExceptionGroup>
where
    I: IntoIterator<Item = &'a CalendarException>,
{
    let mut sorted: Vec<&CalendarException> = exceptions.into_iter().collect();
    sorted.sort_by_key(|exception| exception.date);

    sorted
        .into_iter()
        .fold(Vec::<ExceptionGroup>::new(), |mut groups, exception| {
            match groups.last_mut() {
                Some(group) if group.accepts(exception) => {
                    group.end = exception.date;
                    group.dates.push(exception.date);
                }
                _ => groups.push(ExceptionGroup::start_with(exception)),
            }
            groups
        })
}

/// Administration screens list the most recent absences first.
pub fn sort_groups_newest_first(groups: &mut [ExceptionGroup]) {
    groups.sort_by(|a, b| b.start.cmp(&a.start));
}
