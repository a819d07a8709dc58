//! Outbound SMS.
//!
//! The processors only know the [`Notifier`] trait; the HTTP
//! implementation posts to the configured SMS relay. Message bodies are
//! rendered here so the templates are testable without a relay.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("SMS relay answered {status}: {body}")]
    DeliveryFailed { status: u16, body: String },
}

impl NotifyError {
    /// Whether a retry might succeed. Relay-side 4xx answers are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Request(_) => true,
            NotifyError::DeliveryFailed { status, .. } => *status >= 500,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    body: &'a str,
}

/// [`Notifier`] over an HTTP SMS relay with a shared-secret header.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: Url,
    secret: String,
}

impl HttpNotifier {
    pub fn new(endpoint: Url, secret: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
            secret,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    #[tracing::instrument(skip_all)]
    async fn send_sms(&self, phone: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.secret)
            .json(&SmsPayload { to: phone, body })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Confirmation message sent when a ticket becomes active.
pub fn render_confirmation_sms(
    code: &str,
    session_name: &str,
    held_on: time::Date,
    starts_at: time::Time,
) -> String {
    format!(
        "Your ticket {code} is confirmed: {session_name}, {held_on} at {starts_at}. \
         Show this code at the gate."
    )
}

/// Failure notice sent when a digital payment did not settle.
pub fn render_failure_sms(code: &str) -> String {
    format!("Payment for ticket {code} did not complete. The ticket is void; please purchase again.")
}

/// One-time code message for ticket transfers.
pub fn render_otp_sms(code: &str, ttl_seconds: i64) -> String {
    let minutes = ttl_seconds / 60;
    format!("Your verification code is {code}. It expires in {minutes} minutes.")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::macros::{date, time};

    #[test]
    fn confirmation_names_the_session_and_code() {
        let body = render_confirmation_sms(
            "TG-0123456789ABCDEF",
            "Morning",
            date!(2026 - 03 - 14),
            time!(10:00),
        );
        assert!(body.contains("TG-0123456789ABCDEF"));
        assert!(body.contains("Morning"));
        assert!(body.contains("2026-03-14"));
    }

    #[test]
    fn otp_message_carries_code_and_ttl() {
        let body = render_otp_sms("042917", 300);
        assert!(body.contains("042917"));
        assert!(body.contains("5 minutes"));
    }

    #[test]
    fn relay_5xx_is_retryable_4xx_is_not() {
        let server_side = NotifyError::DeliveryFailed {
            status: 503,
            body: String::new(),
        };
        assert!(server_side.is_retryable());
        let client_side = NotifyError::DeliveryFailed {
            status: 400,
            body: "bad number".to_string(),
        };
        assert!(!client_side.is_retryable());
    }
}
