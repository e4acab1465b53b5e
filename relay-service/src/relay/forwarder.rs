//! Plaintext relay to tenant endpoints.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, Client};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

/// Failure to deliver the plaintext or read the tenant's answer.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("forward request timed out after {0:?}")]
    Timeout(Duration),

    #[error("forward request failed: {0}")]
    Request(reqwest::Error),

    #[error("reading forward response failed: {0}")]
    Body(reqwest::Error),
}

/// POSTs decrypted events to tenant URLs with a fixed deadline.
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Send `payload` as JSON and return the tenant's response.
    ///
    /// A JSON body is returned parsed; anything else becomes a string
    /// value. The HTTP status is logged but does not fail the call.
    pub async fn forward(&self, url: &str, payload: Bytes) -> Result<Value, ForwardError> {
        info!(
            url = url,
            payload_length = payload.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "forward_starting"
        );

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!(url = url, error = %e, "forward_timeout");
                    ForwardError::Timeout(self.timeout)
                } else {
                    error!(url = url, error = %e, "forward_request_error");
                    ForwardError::Request(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            error!(url = url, status_code = status, error = %e, "forward_body_error");
            if e.is_timeout() {
                ForwardError::Timeout(self.timeout)
            } else {
                ForwardError::Body(e)
            }
        })?;

        info!(
            url = url,
            status_code = status,
            response_length = body.len(),
            "forward_complete"
        );

        Ok(interpret_body(&body))
    }
}

fn interpret_body(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn forwarder(timeout: Duration) -> Forwarder {
        Forwarder::new(Client::new(), timeout)
    }

    #[test]
    fn test_interpret_body() {
        assert_eq!(interpret_body(br#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(interpret_body(b"[1,2]"), json!([1, 2]));
        assert_eq!(interpret_body(b"accepted"), json!("accepted"));
        assert_eq!(interpret_body(b""), json!(""));
    }

    #[tokio::test]
    async fn test_forward_posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"EventType":"check_url"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let value = forwarder(Duration::from_secs(5))
            .forward(
                &format!("{}/hook", server.uri()),
                Bytes::from_static(br#"{"EventType":"check_url"}"#),
            )
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_forward_keeps_error_status_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("tenant down"))
            .mount(&server)
            .await;

        let value = forwarder(Duration::from_secs(5))
            .forward(&server.uri(), Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(value, json!("tenant down"));
    }

    #[tokio::test]
    async fn test_forward_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = forwarder(Duration::from_millis(100))
            .forward(&server.uri(), Bytes::from_static(b"{}"))
            .await;

        assert!(matches!(result, Err(ForwardError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_forward_connection_refused() {
        let result = forwarder(Duration::from_secs(2))
            .forward("http://127.0.0.1:1/hook", Bytes::from_static(b"{}"))
            .await;

        assert!(matches!(result, Err(ForwardError::Request(_))));
    }
}
