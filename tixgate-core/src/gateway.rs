//! Payment gateway seam.
//!
//! Checkout only knows the [`PaymentGateway`] trait: hand the provider a
//! charge request, get back accepted / rejected / timed out. The HTTP
//! implementation talks to the configured provider; tests substitute
//! their own impl.

use async_trait::async_trait;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Charge request handed to the provider. `external_id` is our
/// idempotency key; the provider echoes it back in the settlement
/// callback.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub external_id: CompactString,
    pub account_ref: CompactString,
    pub amount: Decimal,
    pub currency: CompactString,
    pub payer_phone: CompactString,
    pub description: String,
}

/// Provider acknowledged the charge; settlement arrives asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeAccepted {
    pub provider_txn_id: Option<CompactString>,
    pub raw_response: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Provider answered and refused the charge. The purchase is rolled
    /// back and its reservation released.
    #[error("charge rejected by provider: {reason}")]
    Rejected { reason: String },

    /// No answer within the deadline. The charge may still be in flight,
    /// so the purchase stays pending for the reconciler to resolve.
    #[error("gateway did not answer within {0:?}")]
    Timeout(std::time::Duration),

    /// Connection-level failure before a deadline was reached.
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with something we cannot interpret.
    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Whether the charge might still complete despite the error.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, GatewayError::Timeout(_))
    }
}

/// Provider-side state of a charge, as answered by a status lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Pending,
    Paid,
    Failed,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a charge to the provider.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeAccepted, GatewayError>;

    /// Ask the provider for the current state of a charge by our
    /// idempotency key. Used by the settlement watcher when the callback
    /// never arrived.
    async fn lookup(&self, external_id: &str) -> Result<ChargeStatus, GatewayError>;
}

/// Wire shape of the provider's synchronous answer.
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    status: CompactString,
    #[serde(default)]
    provider_txn_id: Option<CompactString>,
    #[serde(default)]
    reason: Option<String>,
}

/// [`PaymentGateway`] over HTTP POST with a shared-secret header.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    endpoint: Url,
    secret: String,
    timeout: std::time::Duration,
}

impl HttpPaymentGateway {
    pub fn new(endpoint: Url, secret: String, timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
            secret,
            timeout,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip_all, fields(external_id = %request.external_id))]
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeAccepted, GatewayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .bearer_auth(&self.secret)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Transport(e)
                }
            })?;

        let status = response.status();
        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("non-JSON body: {e}")))?;
        let parsed: ProviderResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Protocol(format!("unrecognized body shape: {e}")))?;

        match parsed.status.as_str() {
            "accepted" if status.is_success() => Ok(ChargeAccepted {
                provider_txn_id: parsed.provider_txn_id,
                raw_response: Some(raw),
            }),
            "rejected" => Err(GatewayError::Rejected {
                reason: parsed
                    .reason
                    .unwrap_or_else(|| "no reason given".to_string()),
            }),
            other => Err(GatewayError::Protocol(format!(
                "HTTP {status} with status field {other:?}"
            ))),
        }
    }

    #[tracing::instrument(skip_all, fields(external_id = %external_id))]
    async fn lookup(&self, external_id: &str) -> Result<ChargeStatus, GatewayError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("external_id", external_id)])
            .bearer_auth(&self.secret)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Protocol(format!(
                "status lookup answered HTTP {status}"
            )));
        }
        let parsed: ProviderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("unrecognized status body: {e}")))?;
        match parsed.status.as_str() {
            "pending" | "accepted" => Ok(ChargeStatus::Pending),
            "paid" | "completed" => Ok(ChargeStatus::Paid),
            "failed" | "rejected" | "expired" => Ok(ChargeStatus::Failed),
            other => Err(GatewayError::Protocol(format!(
                "unknown charge status {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_indeterminate_rejection_is_not() {
        let timeout = GatewayError::Timeout(std::time::Duration::from_secs(10));
        assert!(timeout.is_indeterminate());
        let rejected = GatewayError::Rejected {
            reason: "insufficient funds".to_string(),
        };
        assert!(!rejected.is_indeterminate());
    }

    #[test]
    fn provider_response_parses_minimal_body() {
        let parsed: ProviderResponse =
            serde_json::from_str(r#"{"status": "accepted"}"#).unwrap();
        assert_eq!(parsed.status, "accepted");
        assert_eq!(parsed.provider_txn_id, None);
        assert_eq!(parsed.reason, None);
    }
}
