use chrono::{Local, NaiveDate};
use maintenance_calendar::dates::{format_date_fr, parse_date};
use maintenance_calendar::range::{group_exceptions, sort_groups_newest_first};
use maintenance_calendar::{
    CalendarException, CalendarSnapshot, CalendarStore, DelayToleranceSettings, EndDateCalculator,
    EngineConfig, ExceptionType, InMemoryCalendarStore, LatenessClassifier, LatenessStats,
    OperatorId, PersistenceResult, Task, TaskId, WeeklyScheduleEntry, load_exceptions_from_csv,
    load_snapshot_from_json, recalculate_affected, save_exceptions_to_csv, save_snapshot_to_json,
    tolerance_summary,
};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

struct Session {
    operator_id: OperatorId,
    store: InMemoryCalendarStore,
    config: EngineConfig,
    tasks: Vec<Task>,
}

impl Session {
    fn new(config: EngineConfig) -> Self {
        Self {
            operator_id: 1,
            store: InMemoryCalendarStore::new(),
            config,
            tasks: Vec::new(),
        }
    }

    /// Template plus every stored exception of the current operator.
    fn full_snapshot(&self) -> PersistenceResult<CalendarSnapshot> {
        let schedule = self.store.weekly_schedule(self.operator_id)?;
        let exceptions = self
            .store
            .exceptions(self.operator_id, NaiveDate::MIN, NaiveDate::MAX)?;
        Ok(CalendarSnapshot::new(self.operator_id, schedule, exceptions)?)
    }

    fn predict(&self, start: NaiveDate, hours: f64) -> PersistenceResult<Result<NaiveDate, String>> {
        let horizon = self.config.lookahead_horizon_days;
        let snapshot = self.store.snapshot(self.operator_id, start, horizon)?;
        Ok(EndDateCalculator::new(&snapshot)
            .with_horizon_days(horizon)
            .calculate(start, hours)
            .map_err(|err| err.to_string()))
    }

    fn repredict_around(&mut self, date: NaiveDate) {
        match self.full_snapshot() {
            Ok(snapshot) => {
                let calculator = EndDateCalculator::new(&snapshot)
                    .with_horizon_days(self.config.lookahead_horizon_days);
                let moved = recalculate_affected(&mut self.tasks, &calculator, date);
                if !moved.is_empty() {
                    let ids: Vec<String> = moved.iter().map(TaskId::to_string).collect();
                    println!("Re-predicted tasks: {}", ids.join(","));
                }
            }
            Err(e) => println!("Error: {}", e),
        }
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                                         Show this help\n  operator <id>                                Switch operator (default 1)\n  schedule show                                Show the weekly template\n  schedule set <day 0-6> <hours>               Set a weekday's hours (0 = day off)\n  exc add <YYYY-MM-DD> <type> <hours> [desc]   Add an exception (hours available)\n  exc range <start> <end> <type> <hours> [desc]\n                                               Add one exception per day of a range\n  exc edit <date> <new date> <type> <hours> [desc]\n                                               Replace an exception, possibly moving it\n  exc del <YYYY-MM-DD>                         Delete an exception\n  exc list                                     List exceptions\n  exc groups                                   List exceptions grouped into ranges\n  exc types                                    List exception types\n  predict <YYYY-MM-DD> <hours>                 Predict an end date\n  plan <YYYY-MM-DD> <hours>                    Day-by-day allocation of a prediction\n  task add <id> <YYYY-MM-DD> <hours>           Track a task (end date is predicted)\n  task done <id> <YYYY-MM-DD>                  Mark a task completed\n  tasks                                        List tracked tasks\n  tolerance <on|off|show>                      Toggle the one-day delay tolerance\n  stats [YYYY-MM-DD]                           Lateness statistics as of a day\n  save json <path> | load json <path>          Save/load the operator calendar\n  export csv <path> | import csv <path>        Export/import exceptions\n  quit|exit                                    Exit"
    );
}

fn print_schedule(session: &Session) {
    match session.store.weekly_schedule(session.operator_id) {
        Ok(schedule) => {
            println!("Weekly template for operator {}:", session.operator_id);
            for entry in schedule.entries() {
                let label = WEEKDAYS[entry.day_of_week as usize];
                if entry.is_working_day {
                    println!("  {} {:>5.1}h", label, entry.working_hours);
                } else {
                    println!("  {}   off", label);
                }
            }
            println!("  total {:.1}h", schedule.weekly_hours());
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn print_exceptions(session: &Session) {
    match session
        .store
        .exceptions(session.operator_id, NaiveDate::MIN, NaiveDate::MAX)
    {
        Ok(exceptions) if exceptions.is_empty() => println!("No exceptions."),
        Ok(exceptions) => {
            for exception in exceptions {
                println!(
                    "  {}  {:<8} {:>5.1}h  {}",
                    exception.date,
                    exception.exception_type,
                    exception.working_hours,
                    exception.description.as_deref().unwrap_or("")
                );
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn print_groups(session: &Session) {
    match session
        .store
        .exceptions(session.operator_id, NaiveDate::MIN, NaiveDate::MAX)
    {
        Ok(exceptions) => {
            let mut groups = group_exceptions(&exceptions);
            sort_groups_newest_first(&mut groups);
            if groups.is_empty() {
                println!("No exceptions.");
            }
            for group in groups {
                let span = if group.is_range() {
                    format!(
                        "{} -> {}",
                        format_date_fr(Some(group.start)),
                        format_date_fr(Some(group.end))
                    )
                } else {
                    format_date_fr(Some(group.start))
                };
                println!(
                    "  {:<25} {} ({} day(s)) {}",
                    span,
                    group.exception_type.label(),
                    group.day_count(),
                    group.description.as_deref().unwrap_or("")
                );
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn print_tasks(session: &Session) {
    if session.tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in &session.tasks {
        println!(
            "  #{:<4} start={} hours={} predicted={} done={}",
            task.id,
            format_date_fr(task.start_date),
            task.estimated_hours.map(|h| h.to_string()).unwrap_or_default(),
            format_date_fr(task.predicted_end_date),
            format_date_fr(task.completion_date)
        );
    }
}

fn parse_hours(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.parse::<f64>().ok())
}

fn rest_as_description(rest: Vec<&str>) -> Option<String> {
    if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    }
}

fn exception_command<'a>(session: &mut Session, mut parts: impl Iterator<Item = &'a str>) {
    match parts.next() {
        Some("add") => {
            let date = parts.next().and_then(parse_date);
            let kind = parts.next().map(str::parse::<ExceptionType>);
            let hours = parse_hours(parts.next());
            match (date, kind, hours) {
                (Some(date), Some(Ok(kind)), Some(hours)) => {
                    let mut exception =
                        CalendarException::new(date, kind).with_working_hours(hours);
                    if let Some(text) = rest_as_description(parts.collect()) {
                        exception = exception.with_description(text);
                    }
                    match session.store.add_exception(session.operator_id, &exception) {
                        Ok(()) => {
                            println!("Exception added on {}.", date);
                            session.repredict_around(date);
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                (_, Some(Err(e)), _) => println!("Error: {}", e),
                _ => println!("Usage: exc add <YYYY-MM-DD> <type> <hours> [description]"),
            }
        }
        Some("range") => {
            let start = parts.next().and_then(parse_date);
            let end = parts.next().and_then(parse_date);
            let kind = parts.next().map(str::parse::<ExceptionType>);
            let hours = parse_hours(parts.next());
            match (start, end, kind, hours) {
                (Some(start), Some(end), Some(Ok(kind)), Some(hours)) => {
                    let description = rest_as_description(parts.collect());
                    match session.store.add_exception_range(
                        session.operator_id,
                        start,
                        end,
                        kind,
                        description.as_deref(),
                        hours,
                    ) {
                        Ok(report) => {
                            println!("{}", report.summary());
                            for date in &report.conflicts {
                                println!("  skipped {} (already has an exception)", date);
                            }
                            for date in report.created.clone() {
                                session.repredict_around(date);
                            }
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                (_, _, Some(Err(e)), _) => println!("Error: {}", e),
                _ => println!(
                    "Usage: exc range <start> <end> <type> <hours> [description]"
                ),
            }
        }
        Some("edit") => {
            let date = parts.next().and_then(parse_date);
            let new_date = parts.next().and_then(parse_date);
            let kind = parts.next().map(str::parse::<ExceptionType>);
            let hours = parse_hours(parts.next());
            match (date, new_date, kind, hours) {
                (Some(date), Some(new_date), Some(Ok(kind)), Some(hours)) => {
                    let mut exception =
                        CalendarException::new(new_date, kind).with_working_hours(hours);
                    if let Some(text) = rest_as_description(parts.collect()) {
                        exception = exception.with_description(text);
                    }
                    match session
                        .store
                        .update_exception(session.operator_id, date, &exception)
                    {
                        Ok(()) => {
                            if new_date == date {
                                println!("Exception on {} updated.", date);
                            } else {
                                println!("Exception moved from {} to {}.", date, new_date);
                            }
                            session.repredict_around(date);
                            if new_date != date {
                                session.repredict_around(new_date);
                            }
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                (_, _, Some(Err(e)), _) => println!("Error: {}", e),
                _ => println!(
                    "Usage: exc edit <YYYY-MM-DD> <new YYYY-MM-DD> <type> <hours> [description]"
                ),
            }
        }
        Some("del") => match parts.next().and_then(parse_date) {
            Some(date) => match session.store.delete_exception(session.operator_id, date) {
                Ok(true) => {
                    println!("Exception on {} deleted.", date);
                    session.repredict_around(date);
                }
                Ok(false) => println!("No exception on {}.", date),
                Err(e) => println!("Error: {}", e),
            },
            None => println!("Usage: exc del <YYYY-MM-DD>"),
        },
        Some("list") => print_exceptions(session),
        Some("groups") => print_groups(session),
        Some("types") => {
            for (code, description) in ExceptionType::variants() {
                println!("  {:<9} {}", code, description);
            }
        }
        _ => println!("Usage: exc <add|range|edit|del|list|groups|types> ..."),
    }
}

fn schedule_command<'a>(session: &mut Session, mut parts: impl Iterator<Item = &'a str>) {
    match parts.next() {
        Some("show") | None => print_schedule(session),
        Some("set") => {
            let day = parts.next().and_then(|s| s.parse::<u8>().ok());
            let hours = parse_hours(parts.next());
            match (day, hours) {
                (Some(day), Some(hours)) => {
                    let entry = if hours > 0.0 {
                        WeeklyScheduleEntry::working(day, hours)
                    } else {
                        WeeklyScheduleEntry::day_off(day)
                    };
                    let updated = session
                        .store
                        .weekly_schedule(session.operator_id)
                        .map_err(|e| e.to_string())
                        .and_then(|current| current.with_entry(entry).map_err(|e| e.to_string()))
                        .and_then(|schedule| {
                            session
                                .store
                                .save_weekly_schedule(session.operator_id, &schedule)
                                .map_err(|e| e.to_string())
                        });
                    match updated {
                        Ok(()) => print_schedule(session),
                        Err(e) => println!("Error: {}", e),
                    }
                }
                _ => println!("Usage: schedule set <day 0-6> <hours>"),
            }
        }
        Some(_) => println!("Usage: schedule <show|set> ..."),
    }
}

fn task_command<'a>(session: &mut Session, mut parts: impl Iterator<Item = &'a str>) {
    match parts.next() {
        Some("add") => {
            let id = parts.next().and_then(|s| s.parse::<TaskId>().ok());
            let start = parts.next().and_then(parse_date);
            let hours = parse_hours(parts.next());
            match (id, start, hours) {
                (Some(id), Some(start), Some(hours)) => {
                    let mut task = Task::new(id, session.operator_id, start, hours);
                    match session.predict(start, hours) {
                        Ok(Ok(end)) => {
                            task = task.with_prediction(end);
                            println!("Task {} predicted to end on {}.", id, end);
                        }
                        Ok(Err(reason)) => println!("Task {} has no prediction: {}", id, reason),
                        Err(e) => {
                            println!("Error: {}", e);
                            return;
                        }
                    }
                    session.tasks.retain(|existing| existing.id != id);
                    session.tasks.push(task);
                }
                _ => println!("Usage: task add <id> <YYYY-MM-DD> <hours>"),
            }
        }
        Some("done") => {
            let id = parts.next().and_then(|s| s.parse::<TaskId>().ok());
            let date = parts.next().and_then(parse_date);
            match (id, date) {
                (Some(id), Some(date)) => {
                    match session.tasks.iter_mut().find(|task| task.id == id) {
                        Some(task) => {
                            *task = task.clone().complete(date);
                            println!("Task {} completed on {}.", id, date);
                        }
                        None => println!("Task {} not found.", id),
                    }
                }
                _ => println!("Usage: task done <id> <YYYY-MM-DD>"),
            }
        }
        _ => println!("Usage: task <add|done> ..."),
    }
}

fn file_command<'a>(session: &mut Session, cmd: &str, mut parts: impl Iterator<Item = &'a str>) {
    let format = parts.next();
    let path = parts.next();
    match (cmd, format, path) {
        ("save", Some("json"), Some(path)) => {
            match session
                .full_snapshot()
                .and_then(|snapshot| save_snapshot_to_json(&snapshot, path))
            {
                Ok(()) => println!("Calendar saved to {}", path),
                Err(e) => println!("Error: {}", e),
            }
        }
        ("load", Some("json"), Some(path)) => match load_snapshot_from_json(path) {
            Ok(snapshot) => {
                session.operator_id = snapshot.operator_id();
                session.store = InMemoryCalendarStore::from_snapshot(&snapshot);
                println!(
                    "Calendar loaded from {} (operator {}, {} exceptions)",
                    path,
                    snapshot.operator_id(),
                    snapshot.exception_count()
                );
            }
            Err(e) => println!("Error: {}", e),
        },
        ("export", Some("csv"), Some(path)) => {
            match session
                .store
                .exceptions(session.operator_id, NaiveDate::MIN, NaiveDate::MAX)
                .and_then(|exceptions| save_exceptions_to_csv(&exceptions, path))
            {
                Ok(()) => println!("Exceptions exported to {}", path),
                Err(e) => println!("Error: {}", e),
            }
        }
        ("import", Some("csv"), Some(path)) => {
            let imported = load_exceptions_from_csv(path).and_then(|exceptions| {
                for exception in &exceptions {
                    session.store.upsert_exception(session.operator_id, exception)?;
                }
                Ok(exceptions.len())
            });
            match imported {
                Ok(count) => println!("Imported {} exceptions from {}", count, path),
                Err(e) => println!("Error: {}", e),
            }
        }
        _ => println!("Usage: {} <json|csv> <path>", cmd),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            EngineConfig::default()
        }
    };
    let mut session = Session::new(config);

    println!("Maintenance Calendar (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "operator" => match parts.next().and_then(|s| s.parse::<OperatorId>().ok()) {
                Some(id) => {
                    session.operator_id = id;
                    println!("Operator set to {}.", id);
                }
                None => println!("Usage: operator <id>"),
            },
            "schedule" => schedule_command(&mut session, parts),
            "exc" => exception_command(&mut session, parts),
            "predict" => {
                let start = parts.next();
                let hours = parse_hours(parts.next());
                match (start, hours) {
                    (Some(raw), Some(hours)) => match parse_date(raw) {
                        Some(start) => match session.predict(start, hours) {
                            Ok(Ok(end)) => println!("Predicted end date: {}", end),
                            Ok(Err(reason)) => println!("Cannot predict: {}", reason),
                            Err(e) => println!("Error: {}", e),
                        },
                        None => println!("Cannot predict: start date '{}' could not be parsed", raw),
                    },
                    _ => println!("Usage: predict <YYYY-MM-DD> <hours>"),
                }
            }
            "plan" => {
                let start = parts.next().and_then(parse_date);
                let hours = parse_hours(parts.next());
                match (start, hours) {
                    (Some(start), Some(hours)) => {
                        let horizon = session.config.lookahead_horizon_days;
                        let plan = session
                            .store
                            .snapshot(session.operator_id, start, horizon)
                            .map_err(|e| e.to_string())
                            .and_then(|snapshot| {
                                EndDateCalculator::new(&snapshot)
                                    .with_horizon_days(horizon)
                                    .allocation_plan(start, hours)
                                    .map_err(|e| e.to_string())
                            });
                        match plan {
                            Ok(days) => {
                                for day in days {
                                    println!(
                                        "  {}  capacity={:.1}h used={:.1}h left={:.1}h",
                                        day.date, day.capacity, day.consumed, day.remaining
                                    );
                                }
                            }
                            Err(reason) => println!("Cannot predict: {}", reason),
                        }
                    }
                    _ => println!("Usage: plan <YYYY-MM-DD> <hours>"),
                }
            }
            "task" => task_command(&mut session, parts),
            "tasks" => print_tasks(&session),
            "tolerance" => match parts.next() {
                Some("on") => {
                    session.config.delay_tolerance = DelayToleranceSettings { enabled: true };
                    println!("Delay tolerance enabled.");
                }
                Some("off") => {
                    session.config.delay_tolerance = DelayToleranceSettings { enabled: false };
                    println!("Delay tolerance disabled.");
                }
                Some("show") | None => {
                    let schedule = session.store.weekly_schedule(session.operator_id).ok();
                    let summary =
                        tolerance_summary(&session.config.delay_tolerance, schedule.as_ref());
                    println!("{}", summary.message);
                }
                Some(_) => println!("Usage: tolerance <on|off|show>"),
            },
            "stats" => {
                let today = parts
                    .next()
                    .and_then(parse_date)
                    .unwrap_or_else(|| Local::now().date_naive());
                let mut classifier =
                    LatenessClassifier::from_settings(today, &session.config.delay_tolerance);
                if let Ok(schedule) = session.store.weekly_schedule(session.operator_id) {
                    classifier = classifier.with_schedule(session.operator_id, &schedule);
                }
                let stats = LatenessStats::collect(&session.tasks, &classifier);
                println!("Lateness as of {}: {}", today, stats.to_cli_summary());
            }
            "save" | "load" | "export" | "import" => file_command(&mut session, cmd, parts),
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
