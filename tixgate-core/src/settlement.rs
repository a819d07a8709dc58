//! Settlement application.
//!
//! Both arrival paths for a payment result, the provider's HTTP callback
//! and the `SettlementWatcher` poll, funnel into [`SettlementEngine`]:
//! one compare-and-set on the transaction row decides which caller wins,
//! so a callback racing the watcher (or a replayed callback) settles the
//! same transaction exactly once.

use crate::entities::ledger::InventoryLedger;
use crate::entities::payment_txn::PaymentTransaction;
use crate::entities::ticket::Ticket;
use crate::entities::{AttendeeCategory, TransactionStatus};
use crate::events::{EventSenders, NotificationEvent};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Terminal result reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementResult {
    Paid,
    Failed,
}

/// A settlement report, from the callback body or a watcher poll. The
/// callback carries it as a signed body keyed with the gateway secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Our idempotency key, echoed back by the provider.
    pub external_id: String,
    pub result: SettlementResult,
    #[serde(default)]
    pub provider_txn_id: Option<String>,
    #[serde(default)]
    pub raw_payload: Option<serde_json::Value>,
}

impl tixgate_sdk::signature::Signature for SettlementReport {}

/// What applying a report did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Transaction completed and the ticket is now active.
    Promoted { ticket_id: Uuid },
    /// Transaction failed; the ticket failed and its seats were released.
    Failed { ticket_id: Uuid },
    /// The transaction was already in a terminal state; nothing changed.
    AlreadySettled,
    /// No transaction carries this external id.
    UnknownTransaction,
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What the failure path needs from the ticket row to hand seats back.
#[derive(Debug, sqlx::FromRow)]
struct TicketSeats {
    session_id: Uuid,
    category: AttendeeCategory,
    total_count: i32,
}

pub struct SettlementEngine {
    pool: PgPool,
    events: EventSenders,
}

impl SettlementEngine {
    pub fn new(pool: PgPool, events: EventSenders) -> Self {
        Self { pool, events }
    }

    /// Apply a settlement report. Idempotent: replays and races resolve
    /// to [`SettlementOutcome::AlreadySettled`].
    #[tracing::instrument(skip_all, fields(external_id = %report.external_id, result = ?report.result))]
    pub async fn apply(
        &self,
        report: &SettlementReport,
    ) -> Result<SettlementOutcome, SettlementError> {
        let new_status = match report.result {
            SettlementResult::Paid => TransactionStatus::Completed,
            SettlementResult::Failed => TransactionStatus::Failed,
        };

        let mut tx = self.pool.begin().await?;
        let Some(txn) = PaymentTransaction::settle_tx(
            &mut tx,
            &report.external_id,
            new_status,
            report.provider_txn_id.as_deref(),
            report.raw_payload.as_ref(),
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(self.classify_miss(&report.external_id).await?);
        };

        let Some(ticket_id) = txn.ticket_id else {
            // Money with no ticket attached; keep the settled row for
            // manual review.
            tx.commit().await?;
            tracing::warn!(external_id = %report.external_id, "Settled transaction has no ticket");
            return Ok(SettlementOutcome::AlreadySettled);
        };

        let outcome = match report.result {
            SettlementResult::Paid => {
                let promoted = Ticket::promote_paid_tx(&mut tx, ticket_id).await?;
                if !promoted {
                    tracing::warn!(ticket_id = %ticket_id, "Settled paid but ticket was not pending");
                }
                SettlementOutcome::Promoted { ticket_id }
            }
            SettlementResult::Failed => {
                let failed = Ticket::mark_failed_tx(&mut tx, ticket_id).await?;
                if failed {
                    let seats = sqlx::query_as::<_, TicketSeats>(
                        "SELECT session_id, category, total_count FROM tickets WHERE id = $1",
                    )
                    .bind(ticket_id)
                    .fetch_one(&mut *tx)
                    .await?;
                    InventoryLedger::release_tx(
                        &mut tx,
                        seats.session_id,
                        seats.category,
                        seats.total_count,
                    )
                    .await?;
                }
                SettlementOutcome::Failed { ticket_id }
            }
        };
        tx.commit().await?;

        let event = match outcome {
            SettlementOutcome::Promoted { ticket_id } => {
                tracing::info!(ticket_id = %ticket_id, "Payment settled, ticket active");
                NotificationEvent::TicketConfirmed { ticket_id }
            }
            SettlementOutcome::Failed { ticket_id } => {
                tracing::info!(ticket_id = %ticket_id, "Payment failed, seats released");
                NotificationEvent::TicketFailed { ticket_id }
            }
            _ => return Ok(outcome),
        };
        if self.events.notification.send(event).await.is_err() {
            tracing::error!("Notification channel closed");
        }
        Ok(outcome)
    }

    /// A compare-and-set miss is either a replay or an unknown id.
    async fn classify_miss(&self, external_id: &str) -> Result<SettlementOutcome, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM payment_transactions WHERE external_id = $1)",
        )
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;
        if exists {
            Ok(SettlementOutcome::AlreadySettled)
        } else {
            Ok(SettlementOutcome::UnknownTransaction)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn report_parses_minimal_callback_body() {
        let report: SettlementReport =
            serde_json::from_str(r#"{"external_id": "txg-0195", "result": "paid"}"#).unwrap();
        assert_eq!(report.result, SettlementResult::Paid);
        assert_eq!(report.provider_txn_id, None);
        assert_eq!(report.raw_payload, None);
    }

    #[test]
    fn report_parses_full_callback_body() {
        let report: SettlementReport = serde_json::from_str(
            r#"{
                "external_id": "txg-0195",
                "result": "failed",
                "provider_txn_id": "pg_812",
                "raw_payload": {"status": "DECLINED"}
            }"#,
        )
        .unwrap();
        assert_eq!(report.result, SettlementResult::Failed);
        assert_eq!(report.provider_txn_id.as_deref(), Some("pg_812"));
        assert!(report.raw_payload.is_some());
    }
}
