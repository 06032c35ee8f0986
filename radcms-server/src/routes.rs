//! HTTP route handlers.
//!
//! Every `git`/`rad` call runs on the blocking pool through
//! [`AppState::run`]. Failures become a 500 carrying the message and, when a
//! command produced one, its exit code.

use std::path::PathBuf;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use radcms::daemon::SupervisorState;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinError;
use tracing::{error, info};

use crate::state::AppState;

/// Build the full router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(get_config))
        .route("/api/git/init", post(git_init))
        .route("/api/git/publish", post(git_publish))
        .route("/api/git/fetch", post(git_fetch))
        .route("/api/git/status", get(git_status))
        .route("/api/rad/identity", get(rad_identity))
        .route("/api/rad/nodeStart", post(node_start))
}

/// JSON error body: `{"error": "...", "exitCode": 1}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    error: String,
    #[serde(rename = "exitCode")]
    exit_code: Option<i32>,
}

impl ApiError {
    pub fn from_join(err: JoinError) -> Self {
        error!(err = %err, "blocking task failed");
        Self {
            error: format!("internal task failure: {err}"),
            exit_code: None,
        }
    }
}

impl From<radcms::Error> for ApiError {
    fn from(err: radcms::Error) -> Self {
        error!(err = %err, "request failed");
        Self {
            error: err.to_string(),
            exit_code: err.exit_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

#[derive(Serialize)]
struct Success {
    success: bool,
}

fn success() -> Json<Success> {
    Json(Success { success: true })
}

#[derive(Deserialize)]
struct CwdBody {
    cwd: PathBuf,
}

#[derive(Deserialize)]
struct PublishBody {
    cwd: PathBuf,
    message: Option<String>,
}

#[derive(Serialize)]
struct ConfigResponse {
    root: PathBuf,
}

/// Body of `/api/rad/nodeStart`: `{"result": "ready"}` or `"timed_out"`.
#[derive(Serialize)]
struct NodeStartResponse {
    result: SupervisorState,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "rad-cms-server" }))
}

/// GET /api/config - the user-data root.
async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        root: state.user_data.clone(),
    })
}

async fn git_init(
    State(state): State<AppState>,
    Json(body): Json<CwdBody>,
) -> Result<Json<Success>, ApiError> {
    state.run(move |orch| orch.init(&body.cwd)).await?;
    Ok(success())
}

/// POST /api/git/publish - commit everything and sync.
async fn git_publish(
    State(state): State<AppState>,
    Json(body): Json<PublishBody>,
) -> Result<Json<Success>, ApiError> {
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.publish_message.clone());
    state
        .run(move |orch| orch.publish(&body.cwd, &message))
        .await?;
    Ok(success())
}

async fn git_fetch(
    State(state): State<AppState>,
    Json(body): Json<CwdBody>,
) -> Result<Json<Success>, ApiError> {
    state.run(move |orch| orch.fetch(&body.cwd)).await?;
    Ok(success())
}

/// GET /api/git/status?cwd=... - bare `true` when the working copy has changes.
async fn git_status(
    State(state): State<AppState>,
    Query(query): Query<CwdBody>,
) -> Result<Json<bool>, ApiError> {
    let dirty = state.run(move |orch| orch.status(&query.cwd)).await?;
    Ok(Json(dirty))
}

/// GET /api/rad/identity - the identity text as a bare JSON string.
async fn rad_identity(State(state): State<AppState>) -> Result<Json<String>, ApiError> {
    let identity = state.run(|orch| orch.get_identity()).await?;
    Ok(Json(identity))
}

async fn node_start(
    State(state): State<AppState>,
) -> Result<Json<NodeStartResponse>, ApiError> {
    let result = state.run(|orch| orch.node_start()).await?;
    info!(?result, "node start requested");
    Ok(Json(NodeStartResponse { result }))
}
