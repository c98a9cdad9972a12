use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use core_types::{validate_uid, CatalogError, JobRecord, ReplayError, SeriesKind};
use job_catalog::{job_statistics, JobListingView, JobStatistics};
use replay_engine::{ModeChange, ModeInfo, ReplayHealth, Sample, TrainingStatus, TrainingSummary, Window};
use serde::Deserialize;

use crate::state::AppState;
use crate::stream::stream_training;

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/training/losses", get(losses))
        .route("/api/training/losses/current", get(current_loss))
        .route("/api/training/resources", get(resources))
        .route("/api/training/resources/current", get(current_resource))
        .route("/api/training/status/:job_id", get(status))
        .route("/api/training/summary", get(summary))
        .route("/api/training/mode", get(mode))
        .route("/api/training/mode/:mode", post(set_mode))
        .route("/api/jobs", get(jobs))
        .route("/api/jobs/statistics", get(statistics))
        .route("/api/jobs/:uid", get(job))
        .route("/ws/training/:job_id", get(training_ws))
        .with_state(state)
}

/// Error body is always `{"detail": "..."}`.
#[derive(Debug)]
pub(crate) enum ApiError {
    Replay(ReplayError),
    Catalog(CatalogError),
}

impl From<ReplayError> for ApiError {
    fn from(err: ReplayError) -> Self {
        ApiError::Replay(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Replay(ReplayError::ServiceUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Replay(ReplayError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Replay(ReplayError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Catalog(CatalogError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Catalog(CatalogError::InvalidRecord(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Catalog(CatalogError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Replay(err) => err.to_string(),
            ApiError::Catalog(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(detail = %self.detail(), "request failed");
        }
        (status, Json(serde_json::json!({"detail": self.detail()}))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
struct WindowQuery {
    last_n: Option<i64>,
}

async fn root(State(state): State<AppState>) -> Json<ReplayHealth> {
    Json(state.engine.health())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "mode": state.engine.mode()}))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

fn window(
    state: &AppState,
    kind: SeriesKind,
    q: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Window> {
    let Query(q) = q.map_err(|rejection| {
        ReplayError::InvalidArgument(format!(
            "last_n must be a positive integer: {}",
            rejection.body_text()
        ))
    })?;
    let last_n = q
        .last_n
        .unwrap_or(state.engine.config().default_window as i64);
    Ok(Json(state.engine.window(kind, last_n)?))
}

async fn losses(
    State(state): State<AppState>,
    q: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Window> {
    window(&state, SeriesKind::Loss, q)
}

async fn resources(
    State(state): State<AppState>,
    q: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Window> {
    window(&state, SeriesKind::Resource, q)
}

async fn current_loss(State(state): State<AppState>) -> ApiResult<Sample> {
    Ok(Json(state.engine.current(SeriesKind::Loss)?))
}

async fn current_resource(State(state): State<AppState>) -> ApiResult<Sample> {
    Ok(Json(state.engine.current(SeriesKind::Resource)?))
}

async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<TrainingStatus> {
    Ok(Json(state.engine.status(&job_id)?))
}

async fn summary(State(state): State<AppState>) -> ApiResult<TrainingSummary> {
    Ok(Json(state.engine.summary()?))
}

async fn mode(State(state): State<AppState>) -> Json<ModeInfo> {
    Json(state.engine.mode_info())
}

async fn set_mode(
    State(state): State<AppState>,
    Path(mode): Path<String>,
) -> ApiResult<ModeChange> {
    Ok(Json(state.engine.set_mode(&mode).await?))
}

async fn jobs(State(state): State<AppState>) -> ApiResult<JobListingView> {
    Ok(Json(state.jobs.listing().await?.into()))
}

async fn statistics(State(state): State<AppState>) -> ApiResult<JobStatistics> {
    let listing = state.jobs.listing().await?;
    Ok(Json(job_statistics(&listing, state.engine.now())))
}

async fn job(State(state): State<AppState>, Path(uid): Path<String>) -> ApiResult<JobRecord> {
    validate_uid(&uid)?;
    Ok(Json(state.jobs.job(&uid).await?))
}

async fn training_ws(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_training(socket, state.engine, job_id))
}
