use super::{CalendarStore, PersistenceError, PersistenceResult, conflict};
use crate::calendar::{
    CalendarException, ExceptionType, OperatorId, WeeklySchedule, WeeklyScheduleEntry,
    clamp_exception_hours,
};
use crate::dates::{format_date, parse_date};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, params};

pub struct SqliteCalendarStore {
    connection: Mutex<Connection>,
}

impl SqliteCalendarStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS work_schedules (
                operator_id INTEGER NOT NULL,
                day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
                is_working_day INTEGER NOT NULL,
                working_hours REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (operator_id, day_of_week)
            );
            CREATE TABLE IF NOT EXISTS calendar_exceptions (
                id INTEGER PRIMARY KEY,
                operator_id INTEGER NOT NULL,
                exception_date TEXT NOT NULL,
                exception_type TEXT NOT NULL,
                description TEXT,
                working_hours REAL NOT NULL DEFAULT 0,
                UNIQUE (operator_id, exception_date)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
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

    fn exception_from_row(
        date: String,
        exception_type: String,
        description: Option<String>,
        working_hours: f64,
    ) -> PersistenceResult<CalendarException> {
        let date = parse_date(&date).ok_or_else(|| {
            PersistenceError::InvalidData(format!("stored exception date '{date}' is invalid"))
        })?;
        let exception_type: ExceptionType = exception_type.parse()?;
        let mut exception =
            CalendarException::new(date, exception_type).with_working_hours(working_hours);
        exception.description = description;
        Ok(exception)
    }
}

/// Dates are compared as TEXT, so bounds must stay within four-digit years.
fn stored_bound(date: NaiveDate) -> String {
    let lowest = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    let highest = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
    format_date(date.clamp(lowest, highest))
}

impl CalendarStore for SqliteCalendarStore {
    fn weekly_schedule(&self, operator_id: OperatorId) -> PersistenceResult<WeeklySchedule> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT day_of_week, is_working_day, working_hours FROM work_schedules
             WHERE operator_id = ?1 ORDER BY day_of_week ASC",
        )?;
        let rows = stmt.query_map(params![operator_id], |row| {
            Ok(WeeklyScheduleEntry::new(
                row.get::<_, u8>(0)?,
                row.get::<_, bool>(1)?,
                Some(row.get::<_, f64>(2)?),
            ))
        })?;
        let mut entries = Vec::with_capacity(7);
        for entry in rows {
            entries.push(entry?);
        }
        if entries.is_empty() {
            return Ok(WeeklySchedule::standard());
        }
        Ok(WeeklySchedule::from_entries(entries)?)
    }

    fn save_weekly_schedule(
        &self,
        operator_id: OperatorId,
        schedule: &WeeklySchedule,
    ) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM work_schedules WHERE operator_id = ?1",
            params![operator_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO work_schedules (operator_id, day_of_week, is_working_day, working_hours)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in schedule.entries() {
                stmt.execute(params![
                    operator_id,
                    entry.day_of_week,
                    entry.is_working_day,
                    entry.working_hours
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn exceptions(
        &self,
        operator_id: OperatorId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PersistenceResult<Vec<CalendarException>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT exception_date, exception_type, description, working_hours
             FROM calendar_exceptions
             WHERE operator_id = ?1 AND exception_date >= ?2 AND exception_date <= ?3
             ORDER BY exception_date ASC",
        )?;
        let rows = stmt.query_map(
            params![operator_id, stored_bound(start), stored_bound(end)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            },
        )?;
        let mut exceptions = Vec::new();
        for row in rows {
            let (date, exception_type, description, working_hours) = row?;
            exceptions.push(Self::exception_from_row(
                date,
                exception_type,
                description,
                working_hours,
            )?);
        }
        Ok(exceptions)
    }

    fn add_exception(
        &self,
        operator_id: OperatorId,
        exception: &CalendarException,
    ) -> PersistenceResult<()> {
        let exception = self.prepared(operator_id, exception)?;
        let conn = self.connection.lock();
        let inserted = conn.execute(
            "INSERT INTO calendar_exceptions
             (operator_id, exception_date, exception_type, description, working_hours)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                operator_id,
                format_date(exception.date),
                exception.exception_type.as_str(),
                exception.description,
                exception.working_hours
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(conflict(operator_id, exception.date))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn upsert_exception(
        &self,
        operator_id: OperatorId,
        exception: &CalendarException,
    ) -> PersistenceResult<()> {
        let exception = self.prepared(operator_id, exception)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO calendar_exceptions
             (operator_id, exception_date, exception_type, description, working_hours)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (operator_id, exception_date) DO UPDATE SET
                exception_type = excluded.exception_type,
                description = excluded.description,
                working_hours = excluded.working_hours",
            params![
                operator_id,
                format_date(exception.date),
                exception.exception_type.as_str(),
                exception.description,
                exception.working_hours
            ],
        )?;
        Ok(())
    }

    fn delete_exception(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
    ) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let removed = conn.execute(
            "DELETE FROM calendar_exceptions WHERE operator_id = ?1 AND exception_date = ?2",
            params![operator_id, format_date(date)],
        )?;
        Ok(removed > 0)
    }
}
