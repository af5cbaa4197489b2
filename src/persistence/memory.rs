use super::{CalendarStore, PersistenceResult, conflict};
use crate::calendar::{
    CalendarException, CalendarSnapshot, OperatorId, WeeklySchedule, clamp_exception_hours,
};
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct Calendars {
    schedules: HashMap<OperatorId, WeeklySchedule>,
    exceptions: HashMap<OperatorId, BTreeMap<NaiveDate, CalendarException>>,
}

/// Process-local store, used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct InMemoryCalendarStore {
    calendars: RwLock<Calendars>,
}

impl InMemoryCalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store with one operator's snapshot.
    pub fn from_snapshot(snapshot: &CalendarSnapshot) -> Self {
        let store = Self::new();
        {
            let mut calendars = store.calendars.write();
            let operator_id = snapshot.operator_id();
            calendars
                .schedules
                .insert(operator_id, snapshot.schedule().clone());
            calendars.exceptions.insert(
                operator_id,
                snapshot
                    .exceptions()
                    .map(|exception| (exception.date, exception.clone()))
                    .collect(),
            );
        }
        store
    }

    fn prepared(
        &self,
        operator_id: OperatorId,
        exception: &CalendarException,
    ) -> PersistenceResult<CalendarException> {
        exception.validate()?;
        let schedule = self.weekly_schedule(operator_id)?;
        Ok(clamp_exception_hours(&schedule, exception))
    }
}

impl CalendarStore for InMemoryCalendarStore {
    fn weekly_schedule(&self, operator_id: OperatorId) -> PersistenceResult<WeeklySchedule> {
        let calendars = self.calendars.read();
        Ok(calendars
            .schedules
            .get(&operator_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_weekly_schedule(
        &self,
        operator_id: OperatorId,
        schedule: &WeeklySchedule,
    ) -> PersistenceResult<()> {
        self.calendars
            .write()
            .schedules
            .insert(operator_id, schedule.clone());
        Ok(())
    }

    fn exceptions(
        &self,
        operator_id: OperatorId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PersistenceResult<Vec<CalendarException>> {
        if end < start {
            return Ok(Vec::new());
        }
        let calendars = self.calendars.read();
        Ok(calendars
            .exceptions
            .get(&operator_id)
            .map(|by_date| by_date.range(start..=end).map(|(_, e)| e.clone()).collect())
            .unwrap_or_default())
    }

    fn add_exception(
        &self,
        operator_id: OperatorId,
        exception: &CalendarException,
    ) -> PersistenceResult<()> {
        let exception = self.prepared(operator_id, exception)?;
        let mut calendars = self.calendars.write();
        let by_date = calendars.exceptions.entry(operator_id).or_default();
        if by_date.contains_key(&exception.date) {
            return Err(conflict(operator_id, exception.date));
        }
        by_date.insert(exception.date, exception);
        Ok(())
    }

    fn upsert_exception(
        &self,
        operator_id: OperatorId,
        exception: &CalendarException,
    ) -> PersistenceResult<()> {
        let exception = self.prepared(operator_id, exception)?;
        self.calendars
            .write()
            .exceptions
            .entry(operator_id)
            .or_default()
            .insert(exception.date, exception);
        Ok(())
    }

    fn delete_exception(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
    ) -> PersistenceResult<bool> {
        let mut calendars = self.calendars.write();
        Ok(calendars
            .exceptions
            .get_mut(&operator_id)
            .map(|by_date| by_date.remove(&date).is_some())
            .unwrap_or(false))
    }
}
