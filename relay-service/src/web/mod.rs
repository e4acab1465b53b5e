//! Web server module.
//!
//! - `POST /ding/config`: register a tenant configuration
//! - `POST /ding/callback/{identifier}`: receive a DingTalk callback
//! - `GET /health`: liveness

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    ding_callback, health, missing_identifier, register_config, AppState, HealthResponse,
    Registration, SuccessResponse, CALLBACK_PREFIX,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ding/config", post(register_config))
        .route("/ding/callback/", post(missing_identifier))
        .route("/ding/callback/*identifier", post(ding_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
