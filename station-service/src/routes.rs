//! HTTP boundary for the kiosk UI

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::StationError;
use crate::metrics;
use crate::station::Station;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub station: Arc<Station>,
    /// Durable store path, for the storage section of `/metrics`.
    pub db_path: String,
}

/// Station error carried out of a handler.
#[derive(Debug)]
pub struct ApiError(pub StationError);

impl From<StationError> for ApiError {
    fn from(e: StationError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StationError::Validation(_) => StatusCode::BAD_REQUEST,
            StationError::Transition(_)
            | StationError::AlreadyInitialized
            | StationError::DuplicateVote(_) => StatusCode::CONFLICT,
            StationError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed with {}: {}", status, self.0);
        } else {
            info!("Request rejected with {}: {}", status, self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub voter_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub candidate_id: String,
}

pub fn router(station: Arc<Station>, db_path: String) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/meta", get(get_meta))
        .route("/ballot", get(get_ballot))
        .route("/state", get(get_state))
        .route("/login", post(login))
        .route("/select", post(select_candidate))
        .route("/confirm", post(confirm_cast))
        .route("/cancel", post(cancel_cast))
        .route("/reset", post(reset))
        .route("/results/show", post(show_results))
        .route("/ledger", get(get_ledger))
        .route("/results", get(get_results))
        .route("/integrity", get(get_integrity))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { station, db_path })
}

async fn health_check() -> &'static str {
    "ok"
}

async fn get_meta(State(AppState { station, .. }): State<AppState>) -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": env!("STATION_BUILD_GIT_HASH"),
        "built_at": env!("STATION_BUILD_TIME_UNIX"),
        "session_code": station.session_code(),
        "ready": station.is_ready(),
        "degraded": station.is_degraded(),
        "digest": station.digest_algorithm(),
    }))
}

async fn get_ballot(State(AppState { station, .. }): State<AppState>) -> Json<Value> {
    Json(json!({ "candidates": station.ballot() }))
}

async fn get_state(State(AppState { station, .. }): State<AppState>) -> Json<Value> {
    Json(json!(station.state_view()))
}

async fn login(
    State(AppState { station, .. }): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Value> {
    let view = station.login(&req.voter_id).await?;
    Ok(Json(json!(view)))
}

async fn select_candidate(
    State(AppState { station, .. }): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<Value> {
    let view = station.select_candidate(&req.candidate_id)?;
    Ok(Json(json!(view)))
}

async fn confirm_cast(State(AppState { station, .. }): State<AppState>) -> ApiResult<Value> {
    let entry = station.confirm_cast().await?;
    Ok(Json(json!({
        "entry": entry,
        "state": station.state_view(),
    })))
}

async fn cancel_cast(State(AppState { station, .. }): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(station.cancel_cast()?)))
}

async fn reset(State(AppState { station, .. }): State<AppState>) -> ApiResult<Value> {
    let view = station.reset()?;
    Ok(Json(json!({
        "state": view,
        "session_code": station.session_code(),
    })))
}

async fn show_results(State(AppState { station, .. }): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(station.show_results()?)))
}

async fn get_ledger(State(AppState { station, .. }): State<AppState>) -> ApiResult<Value> {
    let entries = station.ledger_snapshot()?;
    Ok(Json(json!({
        "count": entries.len(),
        "entries": entries,
    })))
}

async fn get_results(State(AppState { station, .. }): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(station.results()?)))
}

async fn get_integrity(State(AppState { station, .. }): State<AppState>) -> Json<Value> {
    let status = station.integrity_status();
    Json(json!({
        "integrity": status,
        "banner": status.banner(),
    }))
}

async fn get_metrics(State(app_state): State<AppState>) -> Json<Value> {
    Json(metrics::snapshot_as_json(&app_state.db_path))
}
