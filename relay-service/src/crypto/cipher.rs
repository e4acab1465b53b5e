//! DingTalk message cipher (AES-256-CBC).
//!
//! ## Key and IV
//!
//! The configured key is a 43-character base64 string with its padding
//! stripped; appending `=` and decoding yields the 32-byte AES key. The IV
//! is the first 16 bytes of that same key rather than a per-message value.
//! That is a deviation from ordinary CBC practice, but the platform
//! requires it and changing it breaks interoperability.
//!
//! ## Frame
//!
//! ```text
//! random(16) | len(4, big-endian) | message(len) | tenant_id | padding
//! ```
//!
//! Padding is PKCS#7-style over a 32-byte padding block: every pad byte
//! holds the pad length, which is always between 1 and 32.

use aes::Aes256;
use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{CryptoRng, RngCore};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of the derived AES key.
pub const KEY_LEN: usize = 32;

const IV_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;
const PAD_BLOCK_LEN: usize = 32;
const RANDOM_LEN: usize = 16;
const HEADER_LEN: usize = RANDOM_LEN + 4;

/// Keys are issued with arbitrary trailing bits in the last character.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Errors from key derivation, encryption and decryption.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("aes key is not valid base64: {0}")]
    InvalidKeyEncoding(base64::DecodeError),

    #[error("aes key must decode to 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("ciphertext is not valid base64: {0}")]
    InvalidBase64(base64::DecodeError),

    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    InvalidBlockLength(usize),

    #[error("invalid block padding")]
    InvalidPadding,

    #[error("decrypted frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("length field {declared} exceeds the {available} bytes available")]
    LengthMismatch { declared: usize, available: usize },

    #[error("tenant id in message does not match configuration")]
    TenantMismatch,

    #[error("decrypted message is not valid UTF-8")]
    NotUtf8,

    #[error("message too large to frame")]
    MessageTooLarge,
}

/// Derived AES key plus the IV taken from its first 16 bytes.
#[derive(Clone)]
pub struct AesKey {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesKey(..)")
    }
}

impl AesKey {
    /// Derive the key from its configured 43-character form.
    pub fn derive(encoded: &str) -> Result<Self, CipherError> {
        let padded = format!("{encoded}=");
        let raw = KEY_ENGINE
            .decode(padded.as_bytes())
            .map_err(CipherError::InvalidKeyEncoding)?;

        let key: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(raw.len()))?;

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&key[..IV_LEN]);

        Ok(Self { key, iv })
    }

    /// Decrypt a base64 ciphertext and return the message it frames.
    ///
    /// The tenant id carried in the frame must equal `tenant_id`.
    pub fn decrypt(&self, cipher_text: &str, tenant_id: &str) -> Result<String, CipherError> {
        let raw = STANDARD
            .decode(cipher_text.as_bytes())
            .map_err(CipherError::InvalidBase64)?;

        if raw.is_empty() || raw.len() % AES_BLOCK_LEN != 0 {
            return Err(CipherError::InvalidBlockLength(raw.len()));
        }

        let plain = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<NoPadding>(&raw)
            .map_err(|_| CipherError::InvalidBlockLength(raw.len()))?;

        let frame = strip_padding(&plain)?;
        parse_frame(frame, tenant_id)
    }

    /// Encrypt `message` for `tenant_id` using `rng` for the frame prefix.
    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
        &self,
        message: &str,
        tenant_id: &str,
        rng: &mut R,
    ) -> Result<String, CipherError> {
        let declared = u32::try_from(message.len()).map_err(|_| CipherError::MessageTooLarge)?;

        let mut random = [0u8; RANDOM_LEN];
        rng.fill_bytes(&mut random);

        let unpadded = HEADER_LEN + message.len() + tenant_id.len();
        let mut frame = Vec::with_capacity(unpadded + PAD_BLOCK_LEN);
        frame.extend_from_slice(&random);
        frame.extend_from_slice(&declared.to_be_bytes());
        frame.extend_from_slice(message.as_bytes());
        frame.extend_from_slice(tenant_id.as_bytes());

        let pad = PAD_BLOCK_LEN - frame.len() % PAD_BLOCK_LEN;
        frame.resize(frame.len() + pad, pad as u8);

        let encrypted = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<NoPadding>(&frame);

        Ok(STANDARD.encode(encrypted))
    }

    /// Encrypt with the thread-local CSPRNG.
    pub fn encrypt(&self, message: &str, tenant_id: &str) -> Result<String, CipherError> {
        self.encrypt_with_rng(message, tenant_id, &mut rand::thread_rng())
    }
}

/// Decrypt `cipher_text` with the configured key for `tenant_id`.
pub fn decrypt(cipher_text: &str, aes_key: &str, tenant_id: &str) -> Result<String, CipherError> {
    AesKey::derive(aes_key)?.decrypt(cipher_text, tenant_id)
}

/// Encrypt `message` with the configured key for `tenant_id`.
pub fn encrypt<R: RngCore + CryptoRng>(
    message: &str,
    aes_key: &str,
    tenant_id: &str,
    rng: &mut R,
) -> Result<String, CipherError> {
    AesKey::derive(aes_key)?.encrypt_with_rng(message, tenant_id, rng)
}

fn strip_padding(plain: &[u8]) -> Result<&[u8], CipherError> {
    let pad = match plain.last() {
        Some(&n) => n as usize,
        None => return Err(CipherError::InvalidPadding),
    };

    if pad == 0 || pad > PAD_BLOCK_LEN || pad > plain.len() {
        return Err(CipherError::InvalidPadding);
    }

    let (body, padding) = plain.split_at(plain.len() - pad);
    if padding.iter().any(|&b| b as usize != pad) {
        return Err(CipherError::InvalidPadding);
    }

    Ok(body)
}

fn parse_frame(frame: &[u8], tenant_id: &str) -> Result<String, CipherError> {
    if frame.len() < HEADER_LEN {
        return Err(CipherError::FrameTooShort(frame.len()));
    }

    let declared = u32::from_be_bytes([
        frame[RANDOM_LEN],
        frame[RANDOM_LEN + 1],
        frame[RANDOM_LEN + 2],
        frame[RANDOM_LEN + 3],
    ]) as usize;

    let body = &frame[HEADER_LEN..];
    if declared > body.len() {
        return Err(CipherError::LengthMismatch {
            declared,
            available: body.len(),
        });
    }

    let (message, embedded_tenant) = body.split_at(declared);
    if embedded_tenant != tenant_id.as_bytes() {
        return Err(CipherError::TenantMismatch);
    }

    String::from_utf8(message.to_vec()).map_err(|_| CipherError::NotUtf8)
}
