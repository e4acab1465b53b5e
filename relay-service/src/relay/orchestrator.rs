//! Callback handling pipeline.
//!
//! ```text
//! resolve config → verify signature → decrypt → forward (optional) → seal ack
//! ```
//!
//! Any failure ends the request with an error and no acknowledgement.
//! That includes forwarding failures: the platform sees a failed delivery
//! even though the event was authenticated and decrypted.

use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use super::forwarder::Forwarder;
use crate::crypto::TenantCrypto;
use crate::error::{RelayError, RelayResult};
use crate::model::{CallbackReply, Envelope};
use crate::resolver::ConfigResolver;

/// Plaintext the platform expects back, encrypted, on success.
pub const ACK_MESSAGE: &str = "success";

/// Query parameters DingTalk attaches to a callback.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub msg_signature: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub encrypt: Option<String>,
}

#[derive(Deserialize)]
struct EncryptedBody {
    #[serde(default)]
    encrypt: String,
}

impl CallbackQuery {
    /// Build the inbound envelope, or `None` when the event is plaintext.
    ///
    /// `msg_signature` wins over `signature`. Without an `encrypt`
    /// parameter the body is probed for a JSON `encrypt` field.
    pub fn envelope(&self, body: &[u8]) -> Option<Envelope> {
        let cipher_text = non_empty(&self.encrypt).map(str::to_owned).or_else(|| {
            serde_json::from_slice::<EncryptedBody>(body)
                .ok()
                .map(|b| b.encrypt)
                .filter(|e| !e.is_empty())
        })?;

        let signature = non_empty(&self.msg_signature)
            .or_else(|| non_empty(&self.signature))
            .unwrap_or_default();

        Some(Envelope {
            signature: signature.to_owned(),
            timestamp: self.timestamp.clone().unwrap_or_default(),
            nonce: self.nonce.clone().unwrap_or_default(),
            cipher_text,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Sequences one callback from identifier to acknowledgement.
#[derive(Clone)]
pub struct CallbackOrchestrator {
    resolver: ConfigResolver,
    forwarder: Forwarder,
}

impl CallbackOrchestrator {
    pub fn new(resolver: ConfigResolver, forwarder: Forwarder) -> Self {
        Self {
            resolver,
            forwarder,
        }
    }

    pub async fn handle(
        &self,
        identifier: &str,
        query: &CallbackQuery,
        body: Bytes,
    ) -> RelayResult<CallbackReply> {
        let resolution = self.resolver.resolve(identifier).await;
        let source = resolution.source();
        let config = resolution.into_config().map_err(RelayError::BadRequest)?;

        let missing = config.missing_fields();
        if !missing.is_empty() {
            warn!(source = source, missing = ?missing, "callback_config_incomplete");
            return Err(RelayError::BadRequest(format!(
                "missing required parameters: {}",
                missing.join(", ")
            )));
        }

        let crypto = TenantCrypto::new(&config)?;

        let plaintext = match query.envelope(&body) {
            Some(envelope) => {
                let message = crypto.decrypt_envelope(&envelope)?;
                info!(
                    source = source,
                    message_length = message.len(),
                    "callback_decrypted"
                );
                Bytes::from(message)
            }
            None => {
                info!(source = source, body_length = body.len(), "callback_plaintext");
                body
            }
        };

        let data = match config.forward_url() {
            Some(url) => Some(self.forwarder.forward(url, plaintext).await?),
            None => {
                info!("callback_forward_skipped");
                None
            }
        };

        let ack = crypto
            .seal_reply(ACK_MESSAGE)
            .map_err(|e| RelayError::Internal(format!("sealing acknowledgement failed: {e}")))?;

        info!(
            source = source,
            forwarded = data.is_some(),
            "callback_acknowledged"
        );

        Ok(CallbackReply { ack, data })
    }
}
