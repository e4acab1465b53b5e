//! Callback configuration resolution.
//!
//! An identifier in the callback path is either a registration UUID or,
//! for clients that predate registration, the whole configuration encoded
//! as `percent-encode(base64(json))`.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::percent_decode_str;
use tracing::{info, warn};

use crate::model::CallbackConfig;
use crate::store::ConfigStore;

/// Where a configuration came from, or why none could be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Registered configuration found by identifier.
    FoundInStore(CallbackConfig),
    /// Configuration decoded from the identifier itself.
    DecodedInline(CallbackConfig),
    /// Neither path produced a configuration.
    NotResolvable(String),
}

impl Resolution {
    pub fn source(&self) -> &'static str {
        match self {
            Resolution::FoundInStore(_) => "store",
            Resolution::DecodedInline(_) => "inline",
            Resolution::NotResolvable(_) => "none",
        }
    }

    /// The resolved configuration, or the reason resolution failed.
    pub fn into_config(self) -> Result<CallbackConfig, String> {
        match self {
            Resolution::FoundInStore(config) | Resolution::DecodedInline(config) => Ok(config),
            Resolution::NotResolvable(reason) => Err(reason),
        }
    }
}

/// Resolves identifiers against the store, then the legacy encoding.
#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, identifier: &str) -> Resolution {
        if identifier.is_empty() {
            return Resolution::NotResolvable("missing callback identifier".to_string());
        }

        match self.store.fetch(identifier).await {
            Ok(Some(stored)) => {
                info!(uuid = %stored.uuid, "config_resolved_from_store");
                return Resolution::FoundInStore(stored.config);
            }
            Ok(None) => {}
            Err(e) => {
                // Lookup failures fall through to the inline decoding.
                warn!(error = %e, "config_store_lookup_failed");
            }
        }

        match decode_inline(identifier) {
            Ok(config) => {
                info!(has_url = config.forward_url().is_some(), "config_resolved_inline");
                Resolution::DecodedInline(config)
            }
            Err(reason) => {
                warn!(reason = %reason, "config_not_resolvable");
                Resolution::NotResolvable(reason)
            }
        }
    }
}

/// Decode a legacy inline identifier.
///
/// Only `%XX` escapes are decoded; `+` is kept because it belongs to the
/// base64 alphabet.
pub fn decode_inline(identifier: &str) -> Result<CallbackConfig, String> {
    let unescaped = percent_decode_str(identifier)
        .decode_utf8()
        .map_err(|e| format!("url decoding failed: {e}"))?;

    let json = STANDARD
        .decode(unescaped.as_bytes())
        .map_err(|e| format!("base64 decoding failed: {e}"))?;

    serde_json::from_slice(&json).map_err(|e| format!("json parsing failed: {e}"))
}

/// Encode a configuration the way legacy clients embed it in the path.
pub fn encode_inline(config: &CallbackConfig) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    let encoded = STANDARD.encode(json);
    Ok(percent_encoding::utf8_percent_encode(&encoded, percent_encoding::NON_ALPHANUMERIC).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;

    fn config() -> CallbackConfig {
        CallbackConfig {
            url: Some("http://tenant.example/hook".to_string()),
            aes_key: "a".repeat(43),
            token: "tok1".to_string(),
            tenant_id: "corp1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolves_from_store() {
        let store = Arc::new(MemoryConfigStore::new());
        let uuid = store.insert(&config()).await.unwrap();
        let resolver = ConfigResolver::new(store);

        assert_eq!(
            resolver.resolve(&uuid).await,
            Resolution::FoundInStore(config())
        );
    }

    #[tokio::test]
    async fn test_resolves_inline_when_not_stored() {
        let resolver = ConfigResolver::new(Arc::new(MemoryConfigStore::new()));
        let identifier = encode_inline(&config()).unwrap();

        let resolution = resolver.resolve(&identifier).await;
        assert_eq!(resolution.source(), "inline");
        assert_eq!(resolution.into_config().unwrap(), config());
    }

    #[tokio::test]
    async fn test_inline_and_store_yield_same_config() {
        let store = Arc::new(MemoryConfigStore::new());
        let uuid = store.insert(&config()).await.unwrap();
        let resolver = ConfigResolver::new(store);

        let stored = resolver.resolve(&uuid).await.into_config().unwrap();
        let inline = resolver
            .resolve(&encode_inline(&config()).unwrap())
            .await
            .into_config()
            .unwrap();
        assert_eq!(stored, inline);
    }

    #[tokio::test]
    async fn test_unknown_uuid_is_not_resolvable() {
        let resolver = ConfigResolver::new(Arc::new(MemoryConfigStore::new()));
        let resolution = resolver.resolve("0b6f3c55-5f1e-4b8e-9a57-3f0f2f8f0c11").await;

        match resolution {
            Resolution::NotResolvable(reason) => assert!(reason.starts_with("base64")),
            other => panic!("Expected NotResolvable, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_inline_steps() {
        assert!(decode_inline("%FF%FE").unwrap_err().starts_with("url"));
        assert!(decode_inline("!!!").unwrap_err().starts_with("base64"));

        let not_json = STANDARD.encode("not json");
        assert!(decode_inline(&not_json).unwrap_err().starts_with("json"));
    }

    #[test]
    fn test_decode_inline_unescaped_base64() {
        // '+' and '/' may arrive without escaping
        let encoded = STANDARD.encode(serde_json::to_vec(&config()).unwrap());
        assert_eq!(decode_inline(&encoded).unwrap(), config());
    }
}
