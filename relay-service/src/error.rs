//! Request error taxonomy and the uniform JSON error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::crypto::{CipherError, EnvelopeError};
use crate::relay::ForwardError;
use crate::store::StoreError;

/// Terminal failure of a registration or callback request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or malformed parameters, undecodable identifiers.
    #[error("{0}")]
    BadRequest(String),

    /// Callback signature did not match.
    #[error("signature verification failed")]
    SignatureMismatch,

    /// Payload decrypted but carries another tenant's id.
    #[error("tenant id mismatch")]
    TenantMismatch,

    /// Key, padding, framing or encoding failure.
    #[error("decryption failed: {0}")]
    Crypto(CipherError),

    /// Tenant endpoint unreachable or its response unreadable.
    #[error("forwarding failed: {0}")]
    Forward(#[from] ForwardError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CipherError> for RelayError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::TenantMismatch => RelayError::TenantMismatch,
            other => RelayError::Crypto(other),
        }
    }
}

impl From<EnvelopeError> for RelayError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::SignatureMismatch => RelayError::SignatureMismatch,
            EnvelopeError::Cipher(inner) => inner.into(),
        }
    }
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) | RelayError::Crypto(_) => StatusCode::BAD_REQUEST,
            RelayError::SignatureMismatch | RelayError::TenantMismatch => StatusCode::UNAUTHORIZED,
            RelayError::Forward(_) | RelayError::Store(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: u16,
    pub message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            success: false,
            code: status.as_u16(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type for request handling.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RelayError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::from(EnvelopeError::SignatureMismatch).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RelayError::from(CipherError::TenantMismatch).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RelayError::from(CipherError::InvalidPadding).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cipher_kind_survives_envelope_mapping() {
        let err = RelayError::from(EnvelopeError::Cipher(CipherError::InvalidPadding));
        assert!(matches!(err, RelayError::Crypto(CipherError::InvalidPadding)));
        assert_eq!(err.to_string(), "decryption failed: invalid block padding");
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = ErrorResponse {
            success: false,
            code: 400,
            message: "missing required parameters: aes_key".to_string(),
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"success": false, "code": 400, "message": "missing required parameters: aes_key"})
        );
    }
}
