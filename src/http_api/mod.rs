use std::{collections::BTreeSet, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    BulkInsertReport, CalendarException, CalendarStore, EndDateCalculator, EngineConfig,
    ExceptionGroup, ExceptionType, Lateness, LatenessClassifier, LatenessStats, OperatorGuard,
    OperatorId, OperatorLocks, PersistenceError, PredictionError, Task, TaskId, WeeklySchedule,
    WeeklyScheduleEntry, dates, range,
};

pub type SharedStore = Arc<dyn CalendarStore + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    store: SharedStore,
    locks: OperatorLocks,
    config: Arc<EngineConfig>,
}

impl AppState {
    pub fn new(store: SharedStore, config: EngineConfig) -> Self {
        Self {
            store,
            locks: OperatorLocks::new(),
            config: Arc::new(config),
        }
    }

    pub fn locks(&self) -> &OperatorLocks {
        &self.locks
    }

    fn lock_operator(&self, operator_id: OperatorId) -> Result<OperatorGuard, ApiError> {
        self.locks.try_acquire(operator_id).ok_or_else(|| {
            ApiError::Conflict(format!(
                "a calendar update for operator {operator_id} is already in progress"
            ))
        })
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::Conflict(message) => ApiError::Conflict(message),
            PersistenceError::NotFound(message) => ApiError::NotFound(message),
            PersistenceError::InvalidData(message) => ApiError::Invalid(message),
            PersistenceError::Calendar(err) => ApiError::Invalid(err.to_string()),
            other => {
                warn!("calendar store failure: {other}");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/operators/:id/schedule",
            get(get_schedule).put(update_schedule),
        )
        .route(
            "/operators/:id/exceptions",
            get(list_exceptions).post(create_exception),
        )
        .route("/operators/:id/exceptions/range", post(create_exception_range))
        .route(
            "/operators/:id/exceptions/:date",
            put(update_exception).delete(delete_exception),
        )
        .route("/operators/:id/exception-groups", get(list_exception_groups))
        .route("/operators/:id/predict-end-date", post(predict_end_date))
        .route("/lateness", post(lateness_report))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "calendar HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
) -> Result<Json<WeeklySchedule>, ApiError> {
    Ok(Json(state.store.weekly_schedule(operator_id)?))
}

async fn update_schedule(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
    Json(entries): Json<Vec<WeeklyScheduleEntry>>,
) -> Result<Json<WeeklySchedule>, ApiError> {
    let schedule =
        WeeklySchedule::from_entries(entries).map_err(|err| ApiError::invalid(err.to_string()))?;
    let _guard = state.lock_operator(operator_id)?;
    state.store.save_weekly_schedule(operator_id, &schedule)?;
    Ok(Json(schedule))
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl RangeQuery {
    fn bounds(&self) -> (NaiveDate, NaiveDate) {
        (
            self.start.unwrap_or(NaiveDate::MIN),
            self.end.unwrap_or(NaiveDate::MAX),
        )
    }
}

async fn list_exceptions(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<CalendarException>>, ApiError> {
    let (start, end) = query.bounds();
    Ok(Json(state.store.exceptions(operator_id, start, end)?))
}

async fn create_exception(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
    Json(exception): Json<CalendarException>,
) -> Result<(StatusCode, Json<CalendarException>), ApiError> {
    let _guard = state.lock_operator(operator_id)?;
    state.store.add_exception(operator_id, &exception)?;
    let stored = state
        .store
        .exceptions(operator_id, exception.date, exception.date)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("exception not found after creation".into()))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Deserialize)]
struct ExceptionRangePayload {
    start: NaiveDate,
    end: NaiveDate,
    #[serde(rename = "type")]
    exception_type: ExceptionType,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    working_hours: f64,
}

async fn create_exception_range(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
    Json(payload): Json<ExceptionRangePayload>,
) -> Result<Json<BulkInsertReport>, ApiError> {
    if payload.end < payload.start {
        return Err(ApiError::invalid("range end must not precede its start"));
    }
    let _guard = state.lock_operator(operator_id)?;
    let report = state.store.add_exception_range(
        operator_id,
        payload.start,
        payload.end,
        payload.exception_type,
        payload.description.as_deref(),
        payload.working_hours,
    )?;
    Ok(Json(report))
}

/// Fields left out keep their stored value; `date` moves the exception.
#[derive(Debug, Deserialize)]
struct ExceptionUpdatePayload {
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default, rename = "type")]
    exception_type: Option<ExceptionType>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    working_hours: Option<f64>,
}

async fn update_exception(
    State(state): State<AppState>,
    Path((operator_id, date)): Path<(OperatorId, NaiveDate)>,
    Json(payload): Json<ExceptionUpdatePayload>,
) -> Result<Json<CalendarException>, ApiError> {
    let _guard = state.lock_operator(operator_id)?;
    let current = state
        .store
        .exceptions(operator_id, date, date)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ApiError::not_found(format!("operator {operator_id} has no exception on {date}"))
        })?;

    let mut updated = CalendarException {
        date: payload.date.unwrap_or(current.date),
        exception_type: payload.exception_type.unwrap_or(current.exception_type),
        description: current.description,
        working_hours: payload.working_hours.unwrap_or(current.working_hours),
    };
    if let Some(description) = payload.description {
        updated = updated.with_description(description);
    }
    state.store.update_exception(operator_id, date, &updated)?;

    let stored = state
        .store
        .exceptions(operator_id, updated.date, updated.date)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("exception not found after update".into()))?;
    Ok(Json(stored))
}

async fn delete_exception(
    State(state): State<AppState>,
    Path((operator_id, date)): Path<(OperatorId, NaiveDate)>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.lock_operator(operator_id)?;
    if !state.store.delete_exception(operator_id, date)? {
        return Err(ApiError::not_found(format!(
            "operator {operator_id} has no exception on {date}"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_exception_groups(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
) -> Result<Json<Vec<ExceptionGroup>>, ApiError> {
    let exceptions = state
        .store
        .exceptions(operator_id, NaiveDate::MIN, NaiveDate::MAX)?;
    let mut groups = range::group_exceptions(&exceptions);
    range::sort_groups_newest_first(&mut groups);
    Ok(Json(groups))
}

#[derive(Debug, Deserialize)]
struct PredictPayload {
    start_date: String,
    hours: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub predicted_end_date: Option<NaiveDate>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

async fn predict_end_date(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
    Json(payload): Json<PredictPayload>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Some(start) = dates::parse_date(&payload.start_date) else {
        return Ok(Json(unpredicted(
            "invalid_input",
            &PredictionError::InvalidStartDate(payload.start_date),
        )));
    };
    let horizon = state.config.lookahead_horizon_days;
    let snapshot = state.store.snapshot(operator_id, start, horizon)?;
    let calculator = EndDateCalculator::new(&snapshot).with_horizon_days(horizon);
    let response = match calculator.calculate(start, payload.hours) {
        Ok(date) => PredictResponse {
            predicted_end_date: Some(date),
            status: "predicted".into(),
            message: None,
        },
        Err(err @ PredictionError::Unschedulable { .. }) => unpredicted("unschedulable", &err),
        Err(err) => unpredicted("invalid_input", &err),
    };
    Ok(Json(response))
}

fn unpredicted(status: &str, err: &PredictionError) -> PredictResponse {
    PredictResponse {
        predicted_end_date: None,
        status: status.to_string(),
        message: Some(err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct LatenessPayload {
    tasks: Vec<Task>,
    #[serde(default)]
    today: Option<NaiveDate>,
    /// Overrides the configured tolerance setting when present.
    #[serde(default)]
    tolerant: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskLateness {
    pub task_id: TaskId,
    pub lateness: Lateness,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatenessResponse {
    pub stats: LatenessStats,
    pub tasks: Vec<TaskLateness>,
}

async fn lateness_report(
    State(state): State<AppState>,
    Json(payload): Json<LatenessPayload>,
) -> Result<Json<LatenessResponse>, ApiError> {
    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());
    let tolerant = payload
        .tolerant
        .unwrap_or(state.config.delay_tolerance.enabled);

    let mut classifier = if tolerant {
        LatenessClassifier::tolerant(today)
    } else {
        LatenessClassifier::strict(today)
    };
    if tolerant {
        let operators: BTreeSet<OperatorId> =
            payload.tasks.iter().filter_map(|task| task.operator_id).collect();
        for operator_id in operators {
            let schedule = state.store.weekly_schedule(operator_id)?;
            classifier = classifier.with_schedule(operator_id, &schedule);
        }
    }

    let stats = LatenessStats::collect(&payload.tasks, &classifier);
    let tasks = payload
        .tasks
        .iter()
        .map(|task| TaskLateness {
            task_id: task.id,
            lateness: classifier.classify(task),
        })
        .collect();
    Ok(Json(LatenessResponse { stats, tasks }))
}
