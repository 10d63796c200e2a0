//! Human-verification gate for the login endpoint.
//!
//! Policy (keep both branches exactly as they are):
//! - no secret configured: verification is optional infrastructure, so the
//!   gate is skipped and the attempt passes (fail-open);
//! - secret configured: any transport failure, timeout, or malformed reply
//!   counts as a failed verification (fail-closed).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Verdict of the verification service. Fields other than `success` are
/// ignored; a reply without `success` is a failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerificationResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("verification request failed: {0}")]
    Transport(String),

    #[error("malformed verification response: {0}")]
    Malformed(String),

    #[error("invalid verification client configuration: {0}")]
    Config(String),
}

/// One synchronous round trip to the verification service.
#[async_trait]
pub trait VerificationTransport: Send + Sync {
    async fn site_verify(&self, secret: &str, response: &str) -> Result<VerificationResponse, VerificationError>;
}

/// `POST` with form-encoded `secret` and `response`, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct HttpVerificationTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVerificationTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, VerificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerificationError::Config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl VerificationTransport for HttpVerificationTransport {
    async fn site_verify(&self, secret: &str, response: &str) -> Result<VerificationResponse, VerificationError> {
        let reply = self
            .client
            .post(&self.endpoint)
            .form(&[("secret", secret), ("response", response)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| VerificationError::Transport(e.to_string()))?;

        reply.json::<VerificationResponse>().await.map_err(|e| {
            if e.is_decode() {
                VerificationError::Malformed(e.to_string())
            } else {
                VerificationError::Transport(e.to_string())
            }
        })
    }
}

#[derive(Clone)]
pub struct VerificationGate {
    transport: Arc<dyn VerificationTransport>,
}

impl VerificationGate {
    pub fn new(transport: Arc<dyn VerificationTransport>) -> Self {
        Self { transport }
    }

    pub fn http(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, VerificationError> {
        Ok(Self::new(Arc::new(HttpVerificationTransport::new(endpoint, timeout)?)))
    }

    #[instrument(skip_all, fields(configured = secret.is_some()))]
    pub async fn verify(&self, secret: Option<&str>, response_token: &str) -> bool {
        let Some(secret) = secret else {
            // Unconfigured: fail open.
            debug!("verification secret not configured; skipping");
            return true;
        };

        match self.transport.site_verify(secret, response_token).await {
            Ok(verdict) => {
                debug!(success = verdict.success, "verification verdict");
                verdict.success
            }
            Err(err) => {
                // Configured but unreachable or garbled: fail closed.
                warn!(error = %err, "verification call failed; rejecting attempt");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        reply: fn() -> Result<VerificationResponse, VerificationError>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(reply: fn() -> Result<VerificationResponse, VerificationError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VerificationTransport for Scripted {
        async fn site_verify(&self, secret: &str, response: &str) -> Result<VerificationResponse, VerificationError> {
            self.calls.lock().unwrap().push((secret.to_string(), response.to_string()));
            (self.reply)()
        }
    }

    #[tokio::test]
    async fn unconfigured_gate_passes_without_calling_out() {
        let transport = Scripted::new(|| Err(VerificationError::Transport("unreachable".into())));
        let gate = VerificationGate::new(transport.clone());

        assert!(gate.verify(None, "any-token").await);
        assert!(gate.verify(None, "").await);
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_error_fails_closed() {
        let gate = VerificationGate::new(Scripted::new(|| Err(VerificationError::Transport("timeout".into()))));
        assert!(!gate.verify(Some("secret"), "token").await);
    }

    #[tokio::test]
    async fn malformed_reply_fails_closed() {
        let gate = VerificationGate::new(Scripted::new(|| Err(VerificationError::Malformed("not json".into()))));
        assert!(!gate.verify(Some("secret"), "token").await);
    }

    #[tokio::test]
    async fn verdict_is_passed_through() {
        let transport = Scripted::new(|| Ok(VerificationResponse { success: true }));
        let gate = VerificationGate::new(transport.clone());
        assert!(gate.verify(Some("secret"), "token").await);
        assert_eq!(
            transport.calls.lock().unwrap().as_slice(),
            &[("secret".to_string(), "token".to_string())]
        );

        let gate = VerificationGate::new(Scripted::new(|| Ok(VerificationResponse { success: false })));
        assert!(!gate.verify(Some("secret"), "token").await);
    }

    #[test]
    fn missing_success_field_reads_as_failure() {
        let parsed: VerificationResponse = serde_json::from_str(r#"{"hostname":"example.org"}"#).unwrap();
        assert!(!parsed.success);
        let parsed: VerificationResponse =
            serde_json::from_str(r#"{"success":true,"challenge_ts":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(parsed.success);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_closed_over_http() {
        // Bind then drop a listener so the port is closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gate = VerificationGate::http(format!("http://{addr}/siteverify"), Duration::from_secs(2)).unwrap();
        assert!(!gate.verify(Some("secret"), "token").await);
    }
}
