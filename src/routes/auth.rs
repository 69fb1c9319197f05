// HTTP Basic guard for the cron routes.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};

use super::AppState;
use crate::config::AuthConfig;

pub(super) async fn require_basic(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if authorized(request.headers(), &state.auth) {
        return next.run(request).await;
    }
    tracing::warn!(path = %request.uri().path(), "rejected unauthenticated cron call");
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"oltpoller\"")],
        Json(serde_json::json!({ "error": "unauthorized" })),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap, auth: &AuthConfig) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(pair) = String::from_utf8(decoded) else {
        return false;
    };
    match pair.split_once(':') {
        Some((user, pass)) => user == auth.username && pass == auth.password,
        None => false,
    }
}
