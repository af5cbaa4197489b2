use super::{PersistenceError, PersistenceResult};
use crate::calendar::{CalendarException, CalendarSnapshot, ExceptionType};
use crate::dates::{format_date, parse_date};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &CalendarSnapshot,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

/// Loads a snapshot, re-applying the construction checks (7 weekdays, one
/// exception per date, clamped hours).
pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<CalendarSnapshot> {
    let file = File::open(path)?;
    let snapshot: CalendarSnapshot = serde_json::from_reader(file)?;
    Ok(snapshot)
}

#[derive(Default, Serialize, Deserialize)]
struct ExceptionCsvRecord {
    date: String,
    #[serde(rename = "type")]
    exception_type: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    working_hours: String,
}

impl From<&CalendarException> for ExceptionCsvRecord {
    fn from(exception: &CalendarException) -> Self {
        Self {
            date: format_date(exception.date),
            exception_type: exception.exception_type.as_str().to_string(),
            description: exception.description.clone().unwrap_or_default(),
            working_hours: exception.working_hours.to_string(),
        }
    }
}

impl ExceptionCsvRecord {
    fn into_exception(self) -> PersistenceResult<CalendarException> {
        let date = parse_date(&self.date).ok_or_else(|| {
            PersistenceError::InvalidData(format!("invalid date '{}'", self.date))
        })?;
        let exception_type: ExceptionType = self.exception_type.parse()?;
        let working_hours = if self.working_hours.trim().is_empty() {
            0.0
        } else {
            self.working_hours.trim().parse::<f64>().map_err(|err| {
                PersistenceError::InvalidData(format!(
                    "invalid working_hours '{}' on {date}: {err}",
                    self.working_hours
                ))
            })?
        };
        let exception = CalendarException::new(date, exception_type)
            .with_working_hours(working_hours)
            .with_description(self.description);
        exception.validate()?;
        Ok(exception)
    }
}

pub fn save_exceptions_to_csv<'a, I, P>(exceptions: I, path: P) -> PersistenceResult<()>
where
    I: IntoIterator<Item = &'a CalendarException>,
    P: AsRef<Path>,
{
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for exception in exceptions {
        writer.serialize(ExceptionCsvRecord::from(exception))?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads `date,type,description,working_hours` rows. Hours are taken as
/// written; clamping happens when the rows reach a store or snapshot.
pub fn load_exceptions_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<CalendarException>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut exceptions = Vec::new();
    for record in reader.deserialize::<ExceptionCsvRecord>() {
        exceptions.push(record?.into_exception()?);
    }
    Ok(exceptions)
}
