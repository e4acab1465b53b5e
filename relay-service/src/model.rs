//! Wire and domain types shared across the relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-tenant callback configuration.
///
/// Field names match the registration body and the legacy inline
/// encoding, so both resolution paths deserialize into this one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Optional tenant endpoint that receives the decrypted plaintext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 43-character base64 key as issued by DingTalk (padding stripped)
    #[serde(default, rename = "aes_key")]
    pub aes_key: String,
    /// Token used in the callback signature
    #[serde(default)]
    pub token: String,
    /// Tenant id embedded in every encrypted frame
    #[serde(default, rename = "corpId")]
    pub tenant_id: String,
}

impl CallbackConfig {
    /// Names of required fields that are empty, in registration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.aes_key.is_empty() {
            missing.push("aes_key");
        }
        if self.token.is_empty() {
            missing.push("token");
        }
        if self.tenant_id.is_empty() {
            missing.push("corpId");
        }
        missing
    }

    /// Forward target, treating an empty string as unset.
    pub fn forward_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Signature material and ciphertext received from the platform.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub cipher_text: String,
}

/// Encrypted acknowledgement returned to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedReply {
    #[serde(rename = "encrypt")]
    pub cipher_text: String,
    #[serde(rename = "msg_signature")]
    pub signature: String,
    pub nonce: String,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
}

/// Full callback response: the acknowledgement plus whatever the tenant
/// endpoint answered.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackReply {
    #[serde(flatten)]
    pub ack: EncryptedReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_wire_names() {
        let config: CallbackConfig = serde_json::from_str(
            r#"{"url":"http://t.example/hook","aes_key":"k","token":"tok1","corpId":"corp1"}"#,
        )
        .unwrap();

        assert_eq!(config.url.as_deref(), Some("http://t.example/hook"));
        assert_eq!(config.aes_key, "k");
        assert_eq!(config.token, "tok1");
        assert_eq!(config.tenant_id, "corp1");
        assert!(config.missing_fields().is_empty());
    }

    #[test]
    fn test_missing_fields_in_order() {
        let config: CallbackConfig = serde_json::from_str(r#"{"token":"tok1"}"#).unwrap();
        assert_eq!(config.missing_fields(), vec!["aes_key", "corpId"]);
    }

    #[test]
    fn test_forward_url_blank_is_unset() {
        let config = CallbackConfig {
            url: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.forward_url(), None);
    }

    #[test]
    fn test_reply_omits_empty_data() {
        let reply = CallbackReply {
            ack: EncryptedReply {
                cipher_text: "c".to_string(),
                signature: "s".to_string(),
                nonce: "n".to_string(),
                timestamp: "1".to_string(),
            },
            data: None,
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"encrypt": "c", "msg_signature": "s", "nonce": "n", "timeStamp": "1"})
        );
    }
}
