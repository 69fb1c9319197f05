// HTTP trigger surface: /cron/{task} runs a task synchronously, /version reports the build.

mod auth;
mod http;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::config::AuthConfig;
use crate::tasks::TaskContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ctx: TaskContext,
    pub(crate) auth: AuthConfig,
}

pub fn app(ctx: TaskContext, auth: AuthConfig) -> Router {
    let state = AppState { ctx, auth };
    let cron = Router::new()
        .route("/cron/{task}", get(http::cron_handler)) // GET /cron/olt-getclock ...
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic,
        ));
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .merge(cron)
        .fallback(http::not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
