//! Callback cryptography.
//!
//! - [`signature`]: SHA-1 envelope signature, shared by inbound
//!   verification and outbound signing
//! - [`cipher`]: AES-256-CBC payload encryption with the platform's frame
//!   layout
//!
//! [`TenantCrypto`] binds one tenant's token, key and id to both.

pub mod cipher;
pub mod signature;

use rand::{distributions::Alphanumeric, CryptoRng, Rng, RngCore};
use thiserror::Error;
use tracing::debug;

use crate::model::{CallbackConfig, EncryptedReply, Envelope};

pub use cipher::{AesKey, CipherError};

const NONCE_LEN: usize = 16;

/// Failure to open an inbound envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("signature mismatch")]
    SignatureMismatch,

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Cryptographic context for a single tenant.
#[derive(Debug, Clone)]
pub struct TenantCrypto {
    token: String,
    tenant_id: String,
    key: AesKey,
}

impl TenantCrypto {
    /// Build the context, deriving the AES key from the configuration.
    pub fn new(config: &CallbackConfig) -> Result<Self, CipherError> {
        Ok(Self {
            token: config.token.clone(),
            tenant_id: config.tenant_id.clone(),
            key: AesKey::derive(&config.aes_key)?,
        })
    }

    /// Verify the envelope signature, then decrypt its payload.
    ///
    /// Decryption is never attempted when the signature does not match.
    pub fn decrypt_envelope(&self, envelope: &Envelope) -> Result<String, EnvelopeError> {
        if !signature::verify(
            &self.token,
            &envelope.timestamp,
            &envelope.nonce,
            &envelope.cipher_text,
            &envelope.signature,
        ) {
            return Err(EnvelopeError::SignatureMismatch);
        }

        let message = self.key.decrypt(&envelope.cipher_text, &self.tenant_id)?;
        debug!(message_length = message.len(), "envelope_decrypted");
        Ok(message)
    }

    /// Encrypt and sign `message` with a fresh nonce and timestamp.
    pub fn seal_reply(&self, message: &str) -> Result<EncryptedReply, CipherError> {
        self.seal_reply_with_rng(message, &mut rand::thread_rng())
    }

    pub fn seal_reply_with_rng<R: RngCore + CryptoRng>(
        &self,
        message: &str,
        rng: &mut R,
    ) -> Result<EncryptedReply, CipherError> {
        let cipher_text = self.key.encrypt_with_rng(message, &self.tenant_id, rng)?;
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let nonce: String = rng
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();

        let signature = signature::sign(&self.token, &timestamp, &nonce, &cipher_text);

        Ok(EncryptedReply {
            cipher_text,
            signature,
            nonce,
            timestamp,
        })
    }

    /// Seal `message` as an inbound envelope. Used to simulate the platform.
    pub fn seal_envelope(&self, message: &str) -> Result<Envelope, CipherError> {
        let reply = self.seal_reply(message)?;
        Ok(Envelope {
            signature: reply.signature,
            timestamp: reply.timestamp,
            nonce: reply.nonce,
            cipher_text: reply.cipher_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

    fn config() -> CallbackConfig {
        CallbackConfig {
            url: None,
            aes_key: STANDARD_NO_PAD.encode([42u8; 32]),
            token: "tok1".to_string(),
            tenant_id: "corp1".to_string(),
        }
    }

    #[test]
    fn test_reply_is_signed_and_decryptable() {
        let crypto = TenantCrypto::new(&config()).unwrap();
        let reply = crypto.seal_reply("success").unwrap();

        assert_eq!(reply.nonce.len(), NONCE_LEN);
        assert!(reply.timestamp.parse::<i64>().is_ok());
        assert!(signature::verify(
            "tok1",
            &reply.timestamp,
            &reply.nonce,
            &reply.cipher_text,
            &reply.signature
        ));
        assert_eq!(
            cipher::decrypt(&reply.cipher_text, &config().aes_key, "corp1").unwrap(),
            "success"
        );
    }

    #[test]
    fn test_replies_are_fresh() {
        let crypto = TenantCrypto::new(&config()).unwrap();
        let a = crypto.seal_reply("success").unwrap();
        let b = crypto.seal_reply("success").unwrap();

        assert_ne!(a.cipher_text, b.cipher_text);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_envelope_round_trip() {
        let crypto = TenantCrypto::new(&config()).unwrap();
        let envelope = crypto.seal_envelope("ping").unwrap();
        assert_eq!(crypto.decrypt_envelope(&envelope).unwrap(), "ping");
    }

    #[test]
    fn test_bad_signature_skips_decryption() {
        let crypto = TenantCrypto::new(&config()).unwrap();
        let envelope = Envelope {
            signature: "0".repeat(40),
            timestamp: "1".to_string(),
            nonce: "n".to_string(),
            // would fail base64 decoding if decryption were attempted
            cipher_text: "%%%".to_string(),
        };

        assert!(matches!(
            crypto.decrypt_envelope(&envelope),
            Err(EnvelopeError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let mut bad = config();
        bad.aes_key = "short".to_string();
        assert!(TenantCrypto::new(&bad).is_err());
    }
}
