//! HTTP endpoint handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::crypto::AesKey;
use crate::error::{RelayError, RelayResult};
use crate::model::{CallbackConfig, CallbackReply};
use crate::relay::{CallbackOrchestrator, CallbackQuery, Forwarder};
use crate::resolver::ConfigResolver;
use crate::store::ConfigStore;
use crate::Config;

/// Path prefix under which callbacks are received.
pub const CALLBACK_PREFIX: &str = "/ding/callback/";

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConfigStore>,
    pub orchestrator: Arc<CallbackOrchestrator>,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn ConfigStore>, client: reqwest::Client) -> Self {
        let forwarder = Forwarder::new(client, config.forward_timeout());
        let orchestrator = CallbackOrchestrator::new(ConfigResolver::new(store.clone()), forwarder);

        Self {
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Registration
// =============================================================================

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Identifier issued for a registered configuration.
#[derive(Debug, Serialize)]
pub struct Registration {
    pub uuid: String,
    pub callback_url: String,
}

/// Register a callback configuration.
///
/// Body: `{url?, aes_key, token, corpId}`. The key must derive a valid
/// AES-256 key so that bad material is rejected here, not on the first
/// callback.
pub async fn register_config(
    State(state): State<AppState>,
    body: Bytes,
) -> RelayResult<Json<SuccessResponse<Registration>>> {
    let config: CallbackConfig = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, body_length = body.len(), "register_body_invalid");
        RelayError::BadRequest(format!("invalid request body: {e}"))
    })?;

    let missing = config.missing_fields();
    if !missing.is_empty() {
        warn!(missing = ?missing, "register_missing_fields");
        return Err(RelayError::BadRequest(format!(
            "missing required parameters: {}",
            missing.join(", ")
        )));
    }

    if let Err(e) = AesKey::derive(&config.aes_key) {
        warn!(error = %e, "register_invalid_aes_key");
        return Err(RelayError::BadRequest(format!("invalid aes_key: {e}")));
    }

    if let Some(url) = config.forward_url() {
        if let Err(e) = url::Url::parse(url) {
            warn!(error = %e, "register_invalid_url");
            return Err(RelayError::BadRequest(format!("invalid url: {e}")));
        }
    }

    let uuid = state.store.insert(&config).await.map_err(|e| {
        error!(error = %e, "register_store_failed");
        RelayError::from(e)
    })?;

    info!(
        uuid = %uuid,
        has_url = config.forward_url().is_some(),
        "config_registered"
    );

    Ok(Json(SuccessResponse {
        success: true,
        message: "config registered".to_string(),
        data: Some(Registration {
            callback_url: format!("{CALLBACK_PREFIX}{uuid}"),
            uuid,
        }),
    }))
}

// =============================================================================
// DingTalk Callback
// =============================================================================

/// DingTalk callback endpoint.
///
/// The identifier is a registration UUID or a legacy inline config.
pub async fn ding_callback(
    State(state): State<AppState>,
    identifier: Result<Path<String>, PathRejection>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    body: Bytes,
) -> RelayResult<Json<CallbackReply>> {
    let Path(identifier) =
        identifier.map_err(|e| RelayError::BadRequest(format!("invalid callback path: {e}")))?;
    let Query(query) =
        query.map_err(|e| RelayError::BadRequest(format!("invalid query parameters: {e}")))?;

    info!(
        identifier_length = identifier.len(),
        has_encrypt_param = query.encrypt.is_some(),
        has_msg_signature = query.msg_signature.is_some(),
        body_length = body.len(),
        "callback_received"
    );

    match state.orchestrator.handle(&identifier, &query, body).await {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            error!(error = %e, status = e.status().as_u16(), "callback_failed");
            Err(e)
        }
    }
}

/// Callback path without an identifier.
pub async fn missing_identifier() -> RelayError {
    warn!("callback_missing_identifier");
    RelayError::BadRequest("missing callback identifier".to_string())
}
