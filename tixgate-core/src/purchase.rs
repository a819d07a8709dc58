//! Purchase pipeline.
//!
//! Checkout is one pipeline: validate the request against the catalog,
//! atomically reserve inventory and create the ticket, then drive the
//! payment. Inventory mutation and ticket creation always share a single
//! database transaction, so a crash can never strand booked seats
//! without a ticket row.
//!
//! Payment handling splits by method kind. Cash settles at the desk, so
//! the ticket is born paid and active. Digital goes through the gateway
//! after the commit: an accepted charge leaves the ticket pending until
//! the settlement callback, a rejected charge fails the ticket and
//! releases its seats, and an indeterminate answer (timeout) leaves the
//! ticket pending for the reconciler rather than guessing.

use crate::entities::attendee::Attendee;
use crate::entities::ledger::{CapacityError, InventoryLedger};
use crate::entities::payment_method::{GetPaymentMethodById, PaymentMethod};
use crate::entities::payment_txn::{PaymentTransaction, PaymentTransactionInsert};
use crate::entities::price::GetSessionPriceById;
use crate::entities::session::GetSessionById;
use crate::entities::event_day::GetEventDayById;
use crate::entities::ticket::{Ticket, TicketInsert};
use crate::entities::{AttendeeCategory, PaymentMethodKind, PaymentStatus, TicketStatus, TransactionStatus};
use crate::events::{EventSenders, NotificationEvent, SettlementTick};
use crate::framework::DatabaseProcessor;
use crate::gateway::{ChargeAccepted, ChargeRequest, GatewayError, PaymentGateway};
use crate::utils::ticket_code;
use compact_str::{format_compact, CompactString};
use kanau::processor::Processor;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tixgate_sdk::objects::purchase::{PurchaseReceipt, PurchaseRequest};
use uuid::Uuid;

/// Upper bound on tickets in a single purchase; counters split larger
/// groups into several purchases.
pub const MAX_QUANTITY_PER_PURCHASE: u32 = 10;

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("event day not found")]
    UnknownDay,
    #[error("session not found")]
    UnknownSession,
    #[error("price not found")]
    UnknownPrice,
    #[error("payment method not found")]
    UnknownPaymentMethod,
    #[error("event day is not open for sale")]
    DayInactive,
    #[error("payment method is disabled")]
    PaymentMethodInactive,
    #[error("session does not belong to the given event day")]
    SessionDayMismatch,
    #[error("price does not belong to the given session")]
    PriceSessionMismatch,
    #[error("price is for a different attendee category")]
    PriceCategoryMismatch,
    #[error("quantity must be between 1 and {MAX_QUANTITY_PER_PURCHASE}, got {given}")]
    InvalidQuantity { given: u32 },
    #[error("charged amount {given} does not match expected {expected}")]
    AmountMismatch { expected: Decimal, given: Decimal },
    #[error("student tickets require a student id")]
    StudentIdRequired,
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("payment rejected: {reason}")]
    GatewayRejected { reason: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Request-shape checks that need no catalog state.
pub fn validate_request(request: &PurchaseRequest) -> Result<(), PurchaseError> {
    if request.quantity == 0 || request.quantity > MAX_QUANTITY_PER_PURCHASE {
        return Err(PurchaseError::InvalidQuantity {
            given: request.quantity,
        });
    }
    if request.category == tixgate_sdk::objects::AttendeeCategory::Student
        && request
            .student_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty())
    {
        return Err(PurchaseError::StudentIdRequired);
    }
    Ok(())
}

/// The catalog rows a validated purchase resolved to.
struct ResolvedCatalog {
    session_id: Uuid,
    unit_price: Decimal,
    method: PaymentMethod,
}

/// Sales-side checkout engine. One instance serves every counter.
pub struct PurchasePipeline {
    processor: DatabaseProcessor,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSenders,
    /// Provider-side merchant account reference passed with every charge.
    account_ref: CompactString,
    currency: CompactString,
}

impl PurchasePipeline {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSenders,
        account_ref: CompactString,
        currency: CompactString,
    ) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
            gateway,
            events,
            account_ref,
            currency,
        }
    }

    /// Execute a purchase end to end.
    #[tracing::instrument(skip_all, fields(session_id = %request.session_id, quantity = request.quantity))]
    pub async fn purchase(
        &self,
        request: &PurchaseRequest,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        validate_request(request)?;
        let catalog = self.resolve_catalog(request).await?;

        let expected = catalog.unit_price * Decimal::from(request.quantity);
        if expected != request.total_amount {
            return Err(PurchaseError::AmountMismatch {
                expected,
                given: request.total_amount,
            });
        }

        let category: AttendeeCategory = request.category.into();
        let is_cash = catalog.method.kind == PaymentMethodKind::Cash;
        let (payment_status, status) = if is_cash {
            (PaymentStatus::Paid, TicketStatus::Active)
        } else {
            (PaymentStatus::Pending, TicketStatus::Pending)
        };

        let code = ticket_code::generate();
        let insert = TicketInsert {
            session_id: catalog.session_id,
            code: code.clone(),
            purchaser_name: request.purchaser_name.clone(),
            purchaser_phone: request.purchaser_phone.clone(),
            category,
            quantity: request.quantity as i32,
            total_amount: request.total_amount,
            payment_status,
            status,
            student_id: request.student_id.clone(),
            student_school: request.student_school.clone(),
        };

        // Reservation, ticket and attendees commit or roll back together.
        let mut tx = self.processor.pool.begin().await?;
        let reserved = InventoryLedger::reserve_tx(
            &mut tx,
            catalog.session_id,
            category,
            request.quantity as i32,
        )
        .await?;
        let reserved = match reserved {
            Ok(reserved) => reserved,
            Err(capacity) => {
                tx.rollback().await?;
                return Err(capacity.into());
            }
        };
        if reserved.sold_out {
            InventoryLedger::set_session_active_tx(&mut tx, catalog.session_id, false).await?;
        }
        let ticket_id = Ticket::insert_tx(&mut tx, &insert).await?;
        Attendee::insert_many_tx(&mut tx, ticket_id, category, request.quantity as i32).await?;

        let external_id = external_id_for(ticket_id);
        let transaction_id = if is_cash {
            // Cash settles at the desk; record the money trail as already
            // completed inside the same transaction.
            let txn_id = PaymentTransaction::insert_tx(
                &mut tx,
                &PaymentTransactionInsert {
                    ticket_id,
                    external_id: external_id.clone().into(),
                    provider_txn_id: None,
                    amount: request.total_amount,
                    status: TransactionStatus::Completed,
                    raw_payload: None,
                },
            )
            .await?;
            Some(txn_id)
        } else {
            None
        };
        tx.commit().await?;

        tracing::info!(
            ticket_id = %ticket_id,
            code = %code,
            method = %catalog.method.name,
            "Ticket created"
        );

        let receipt = if is_cash {
            // Cash settled at the desk; no provider round-trip.
            self.notify(NotificationEvent::TicketConfirmed { ticket_id })
                .await;
            PurchaseReceipt {
                ticket_id,
                ticket_code: code,
                payment_status: PaymentStatus::Paid.into(),
                status: TicketStatus::Active.into(),
                transaction_id,
            }
        } else {
            self.charge_digital(ticket_id, code, &external_id, request)
                .await?
        };
        Ok(receipt)
    }

    /// Resolve and cross-check the catalog rows named by the request.
    async fn resolve_catalog(
        &self,
        request: &PurchaseRequest,
    ) -> Result<ResolvedCatalog, PurchaseError> {
        let day = self
            .processor
            .process(GetEventDayById {
                day_id: request.day_id,
            })
            .await?
            .ok_or(PurchaseError::UnknownDay)?;
        if !day.is_active {
            return Err(PurchaseError::DayInactive);
        }

        let session = self
            .processor
            .process(GetSessionById {
                session_id: request.session_id,
            })
            .await?
            .ok_or(PurchaseError::UnknownSession)?;
        if session.day_id != day.id {
            return Err(PurchaseError::SessionDayMismatch);
        }
        if !session.is_active {
            return Err(CapacityError::SessionInactive.into());
        }

        let price = self
            .processor
            .process(GetSessionPriceById {
                price_id: request.price_id,
            })
            .await?
            .ok_or(PurchaseError::UnknownPrice)?;
        if price.session_id != session.id {
            return Err(PurchaseError::PriceSessionMismatch);
        }
        let category: AttendeeCategory = request.category.into();
        if price.category != category {
            return Err(PurchaseError::PriceCategoryMismatch);
        }

        let method = self
            .processor
            .process(GetPaymentMethodById {
                method_id: request.payment_method_id,
            })
            .await?
            .ok_or(PurchaseError::UnknownPaymentMethod)?;
        if !method.is_active {
            return Err(PurchaseError::PaymentMethodInactive);
        }

        Ok(ResolvedCatalog {
            session_id: session.id,
            unit_price: price.unit_price,
            method,
        })
    }

    /// Digital payment: charge the gateway and settle the ticket's fate
    /// according to the answer.
    async fn charge_digital(
        &self,
        ticket_id: Uuid,
        code: CompactString,
        external_id: &str,
        request: &PurchaseRequest,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let charge = self.charge_request(external_id, request);
        match self.gateway.charge(&charge).await {
            Ok(accepted) => {
                let txn_id = self
                    .record_pending_txn(ticket_id, external_id, request.total_amount, &accepted)
                    .await?;
                let _ = self.events.settlement_tick.send(SettlementTick).await;
                Ok(PurchaseReceipt {
                    ticket_id,
                    ticket_code: code,
                    payment_status: PaymentStatus::Pending.into(),
                    status: TicketStatus::Pending.into(),
                    transaction_id: Some(txn_id),
                })
            }
            Err(err) if err.is_indeterminate() => {
                // The charge may still land. Record a pending transaction
                // with no provider data and let the watcher resolve it.
                tracing::warn!(ticket_id = %ticket_id, error = %err, "Gateway indeterminate, ticket stays pending");
                let txn_id = self
                    .record_pending_txn(
                        ticket_id,
                        external_id,
                        request.total_amount,
                        &ChargeAccepted {
                            provider_txn_id: None,
                            raw_response: None,
                        },
                    )
                    .await?;
                let _ = self.events.settlement_tick.send(SettlementTick).await;
                Ok(PurchaseReceipt {
                    ticket_id,
                    ticket_code: code,
                    payment_status: PaymentStatus::Pending.into(),
                    status: TicketStatus::Pending.into(),
                    transaction_id: Some(txn_id),
                })
            }
            Err(err) => {
                // A definite refusal: fail the ticket and hand its seats
                // back in one transaction.
                tracing::warn!(ticket_id = %ticket_id, error = %err, "Gateway refused charge");
                self.fail_and_release(ticket_id, external_id, request).await?;
                self.notify(NotificationEvent::TicketFailed { ticket_id })
                    .await;
                let reason = match err {
                    GatewayError::Rejected { reason } => reason,
                    other => other.to_string(),
                };
                Err(PurchaseError::GatewayRejected { reason })
            }
        }
    }

    fn charge_request(&self, external_id: &str, request: &PurchaseRequest) -> ChargeRequest {
        ChargeRequest {
            external_id: CompactString::from(external_id),
            account_ref: self.account_ref.clone(),
            amount: request.total_amount,
            currency: self.currency.clone(),
            payer_phone: request.purchaser_phone.clone(),
            description: format!(
                "{} x{} admission",
                request.category, request.quantity
            ),
        }
    }

    async fn record_pending_txn(
        &self,
        ticket_id: Uuid,
        external_id: &str,
        amount: Decimal,
        accepted: &ChargeAccepted,
    ) -> Result<Uuid, sqlx::Error> {
        let mut tx = self.processor.pool.begin().await?;
        let txn_id = PaymentTransaction::insert_tx(
            &mut tx,
            &PaymentTransactionInsert {
                ticket_id,
                external_id: external_id.to_string(),
                provider_txn_id: accepted.provider_txn_id.as_ref().map(|s| s.to_string()),
                amount,
                status: TransactionStatus::Pending,
                raw_payload: accepted.raw_response.clone(),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(txn_id)
    }

    async fn fail_and_release(
        &self,
        ticket_id: Uuid,
        external_id: &str,
        request: &PurchaseRequest,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.processor.pool.begin().await?;
        let failed = Ticket::mark_failed_tx(&mut tx, ticket_id).await?;
        if failed {
            InventoryLedger::release_tx(
                &mut tx,
                request.session_id,
                request.category.into(),
                request.quantity as i32,
            )
            .await?;
        }
        PaymentTransaction::insert_tx(
            &mut tx,
            &PaymentTransactionInsert {
                ticket_id,
                external_id: external_id.to_string(),
                provider_txn_id: None,
                amount: request.total_amount,
                status: TransactionStatus::Failed,
                raw_payload: None,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn notify(&self, event: NotificationEvent) {
        if self.events.notification.send(event.clone()).await.is_err() {
            tracing::error!(event = ?event, "Notification channel closed");
        }
    }
}

/// Idempotency key sent to the provider; derived from the ticket id so a
/// retried checkout of the same ticket cannot double-charge.
fn external_id_for(ticket_id: Uuid) -> String {
    format_compact!("txg-{}", ticket_id.simple()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tixgate_sdk::objects::AttendeeCategory as SdkCategory;

    fn request(category: SdkCategory, quantity: u32) -> PurchaseRequest {
        PurchaseRequest {
            day_id: Uuid::now_v7(),
            session_id: Uuid::now_v7(),
            price_id: Uuid::now_v7(),
            payment_method_id: Uuid::now_v7(),
            category,
            quantity,
            purchaser_name: "Mina Park".to_string(),
            purchaser_phone: "01012345678".into(),
            total_amount: Decimal::new(30_000, 0),
            student_id: None,
            student_school: None,
        }
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let req = request(SdkCategory::Adult, 0);
        assert!(matches!(
            validate_request(&req),
            Err(PurchaseError::InvalidQuantity { given: 0 })
        ));
    }

    #[test]
    fn oversized_quantity_is_rejected() {
        let req = request(SdkCategory::Adult, MAX_QUANTITY_PER_PURCHASE + 1);
        assert!(matches!(
            validate_request(&req),
            Err(PurchaseError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn student_purchase_needs_student_id() {
        let mut req = request(SdkCategory::Student, 1);
        assert!(matches!(
            validate_request(&req),
            Err(PurchaseError::StudentIdRequired)
        ));
        req.student_id = Some("  ".to_string());
        assert!(matches!(
            validate_request(&req),
            Err(PurchaseError::StudentIdRequired)
        ));
        req.student_id = Some("2026-0412".to_string());
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn adult_purchase_needs_no_student_id() {
        let req = request(SdkCategory::Adult, 4);
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn external_id_is_stable_for_a_ticket() {
        let id = Uuid::now_v7();
        assert_eq!(external_id_for(id), external_id_for(id));
        assert!(external_id_for(id).starts_with("txg-"));
    }
}
