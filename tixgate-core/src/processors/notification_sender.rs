//! NotificationSender processor.
//!
//! Receives `NotificationEvent` from the queue, re-fetches the current
//! row the event points at, renders the SMS body and delivers it through
//! the configured [`Notifier`]. Delivery retries with exponential
//! backoff (2^0 to 2^5 seconds) for retryable failures; a dropped SMS is
//! logged and abandoned, never allowed to wedge the queue.

use crate::entities::otp::{GetActiveOtp, OTP_TTL_SECONDS};
use crate::entities::ticket::GetTicketNotificationView;
use crate::events::{NotificationEvent, NotificationEventReceiver};
use crate::framework::DatabaseProcessor;
use crate::notify::{render_confirmation_sms, render_failure_sms, render_otp_sms, Notifier};
use kanau::processor::Processor;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Maximum retry attempts (2^5 = 32 seconds max backoff).
const MAX_RETRY_COUNT: u32 = 5;

/// Errors that can occur while handling a notification event.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("delivery error: {0}")]
    Delivery(#[from] crate::notify::NotifyError),

    #[error("ticket not found: {0}")]
    TicketNotFound(Uuid),

    #[error("no live code for the phone the event names")]
    OtpGone,
}

/// NotificationSender delivers SMS for queued notification events.
pub struct NotificationSender {
    processor: DatabaseProcessor,
    notifier: Arc<dyn Notifier>,
    event_rx: NotificationEventReceiver,
    shutdown_rx: watch::Receiver<bool>,
}

impl NotificationSender {
    pub fn new(
        pool: PgPool,
        notifier: Arc<dyn Notifier>,
        event_rx: NotificationEventReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
            notifier,
            event_rx,
            shutdown_rx,
        }
    }

    /// Run the NotificationSender.
    pub async fn run(mut self) {
        info!("NotificationSender started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("NotificationSender received shutdown signal");
                        break;
                    }
                }

                Some(event) = self.event_rx.recv() => {
                    debug!(event = ?event, "Received NotificationEvent");

                    if let Err(e) = self.process_event(event).await {
                        error!(error = %e, "Failed to process NotificationEvent");
                    }
                }

                else => {
                    info!("NotificationEvent channel closed");
                    break;
                }
            }
        }

        info!("NotificationSender shutdown complete");
    }

    async fn process_event(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        let (phone, body) = match event {
            NotificationEvent::TicketConfirmed { ticket_id } => {
                let view = self
                    .processor
                    .process(GetTicketNotificationView { ticket_id })
                    .await?
                    .ok_or(NotificationError::TicketNotFound(ticket_id))?;
                let body = render_confirmation_sms(
                    &view.code,
                    &view.session_name,
                    view.held_on,
                    view.starts_at,
                );
                (view.purchaser_phone, body)
            }
            NotificationEvent::TicketFailed { ticket_id } => {
                let view = self
                    .processor
                    .process(GetTicketNotificationView { ticket_id })
                    .await?
                    .ok_or(NotificationError::TicketNotFound(ticket_id))?;
                (view.purchaser_phone, render_failure_sms(&view.code))
            }
            NotificationEvent::OtpIssued { phone } => {
                // Re-fetch rather than carrying the code in the event; a
                // reissued code supersedes this event harmlessly.
                let otp = self
                    .processor
                    .process(GetActiveOtp {
                        phone: phone.clone(),
                    })
                    .await?
                    .ok_or(NotificationError::OtpGone)?;
                (phone, render_otp_sms(&otp.code, OTP_TTL_SECONDS))
            }
        };

        self.deliver_with_retry(&phone, &body).await
    }

    /// Deliver one SMS, retrying retryable failures with backoff.
    async fn deliver_with_retry(&self, phone: &str, body: &str) -> Result<(), NotificationError> {
        let mut attempt = 0;
        loop {
            match self.notifier.send_sms(phone, body).await {
                Ok(()) => {
                    info!(attempt, "SMS delivered");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < MAX_RETRY_COUNT => {
                    let delay = calculate_retry_delay(attempt);
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "SMS delivery failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Calculate the next retry delay based on retry count.
///
/// Uses exponential backoff: 2^retry_count seconds.
pub fn calculate_retry_delay(retry_count: u32) -> std::time::Duration {
    let seconds = 2u64.pow(retry_count.min(MAX_RETRY_COUNT));
    std::time::Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_calculation() {
        assert_eq!(calculate_retry_delay(0), std::time::Duration::from_secs(1));
        assert_eq!(calculate_retry_delay(1), std::time::Duration::from_secs(2));
        assert_eq!(calculate_retry_delay(4), std::time::Duration::from_secs(16));
        assert_eq!(calculate_retry_delay(5), std::time::Duration::from_secs(32));
        // Max capped at 5
        assert_eq!(calculate_retry_delay(12), std::time::Duration::from_secs(32));
    }
}
