// GET handlers: version, cron triggers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use super::AppState;
use crate::tasks::{TaskName, run_task};
use crate::version::{NAME, VERSION};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /cron/{task} — runs the task to completion before answering.
pub(super) async fn cron_handler(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> impl IntoResponse {
    let Some(task) = TaskName::from_route(&segment) else {
        return not_found(&format!("/cron/{segment}"));
    };
    match run_task(&state.ctx, task, "http").await {
        Ok(()) => (StatusCode::OK, Json(json!({ "notice": "Cron Executed ok" }))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

pub(super) async fn not_found_handler(uri: axum::http::Uri) -> impl IntoResponse {
    not_found(uri.path())
}

fn not_found(path: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no route for {path}") })),
    )
}
