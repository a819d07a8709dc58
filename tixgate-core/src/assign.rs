//! Ticket assignment.
//!
//! An assignment transfers attendance of a paid ticket to a named person
//! without rewriting the ticket's purchaser fields; the original buyer
//! stays snapshotted in the assignment metadata. At most one assignment
//! per ticket is active, enforced by a partial unique index rather than
//! a check-then-insert, so two counters assigning the same ticket race
//! to a clean `AlreadyAssigned`.
//!
//! OTP custody stays with the caller: the engine issues and consumes
//! codes on request and records `otp_required` / `otp_verified` flags,
//! but does not insert itself into the caller's verification flow.

use crate::entities::assignment::{
    is_active_assignment_conflict, Assignment, AssignmentInsert, GetAssignmentById,
};
use crate::entities::otp::{generate_code, ConsumeOtp, IssueOtp};
use crate::entities::ticket::GetTicketById;
use crate::entities::{PaymentStatus, TicketStatus};
use crate::events::{EventSenders, NotificationEvent};
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;
use tixgate_sdk::objects::assign::{AssignRequest, AssignmentResponse, CancelAssignmentRequest};

#[derive(Debug, Error)]
pub enum AssignError {
    #[error("ticket not found")]
    TicketNotFound,
    #[error("ticket is not assignable in its current state")]
    TicketNotAssignable,
    #[error("ticket already has an active assignment")]
    AlreadyAssigned,
    #[error("assignment requires a verified one-time code")]
    OtpNotVerified,
    #[error("no active assignment for this id and agent")]
    AssignmentNotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct AssignmentEngine {
    processor: DatabaseProcessor,
    events: EventSenders,
}

impl AssignmentEngine {
    pub fn new(pool: PgPool, events: EventSenders) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
            events,
        }
    }

    /// Create an active assignment for a paid, unused ticket.
    #[tracing::instrument(skip_all, fields(ticket_id = %request.ticket_id, agent_id = %request.agent_id))]
    pub async fn assign(
        &self,
        request: &AssignRequest,
    ) -> Result<AssignmentResponse, AssignError> {
        let ticket = self
            .processor
            .process(GetTicketById {
                ticket_id: request.ticket_id,
            })
            .await?
            .ok_or(AssignError::TicketNotFound)?;
        if ticket.payment_status != PaymentStatus::Paid || ticket.status != TicketStatus::Active {
            return Err(AssignError::TicketNotAssignable);
        }
        if request.require_otp && !request.otp_verified {
            return Err(AssignError::OtpNotVerified);
        }

        let insert = AssignmentInsert {
            ticket_id: ticket.id,
            assignee_name: request.assignee_name.clone(),
            assignee_phone: request.assignee_phone.clone(),
            assignee_email: request.assignee_email.clone(),
            assignee_category: request.assignee_category.into(),
            agent_id: request.agent_id,
            otp_required: request.require_otp,
            otp_verified: request.otp_verified,
            metadata: serde_json::json!({
                "original_purchaser_name": ticket.purchaser_name,
                "original_purchaser_phone": ticket.purchaser_phone.as_str(),
            }),
        };

        let mut tx = self.processor.pool.begin().await?;
        let assignment_id = match Assignment::insert_active_tx(&mut tx, &insert).await {
            Ok(id) => id,
            Err(err) if is_active_assignment_conflict(&err) => {
                tx.rollback().await?;
                return Err(AssignError::AlreadyAssigned);
            }
            Err(err) => return Err(err.into()),
        };
        tx.commit().await?;

        tracing::info!(
            assignment_id = %assignment_id,
            ticket_id = %ticket.id,
            "Ticket assigned"
        );

        let assignment = self
            .processor
            .process(GetAssignmentById { assignment_id })
            .await?
            .ok_or(AssignError::AssignmentNotFound)?;
        Ok(to_response(assignment))
    }

    /// Cancel an active assignment. Only the agent that created it may
    /// cancel; anything else answers `AssignmentNotFound` rather than
    /// leaking whether the id exists.
    #[tracing::instrument(skip_all, fields(assignment_id = %request.assignment_id))]
    pub async fn cancel(
        &self,
        request: &CancelAssignmentRequest,
    ) -> Result<AssignmentResponse, AssignError> {
        let mut tx = self.processor.pool.begin().await?;
        let Some(assignment) =
            Assignment::cancel_tx(&mut tx, request.assignment_id, request.agent_id).await?
        else {
            tx.rollback().await?;
            return Err(AssignError::AssignmentNotFound);
        };
        tx.commit().await?;

        tracing::info!(
            assignment_id = %assignment.id,
            ticket_id = %assignment.ticket_id,
            "Assignment cancelled"
        );
        Ok(to_response(assignment))
    }

    /// Issue a one-time code for a phone number and queue its delivery.
    /// Reissuing invalidates earlier unconsumed codes for the phone.
    #[tracing::instrument(skip_all)]
    pub async fn issue_otp(&self, phone: CompactString) -> Result<(), AssignError> {
        let code = generate_code();
        self.processor
            .process(IssueOtp {
                phone: phone.clone(),
                code,
            })
            .await?;
        if self
            .events
            .notification
            .send(NotificationEvent::OtpIssued { phone })
            .await
            .is_err()
        {
            tracing::error!("Notification channel closed");
        }
        Ok(())
    }

    /// Verify and consume a one-time code. Consumption is a
    /// compare-and-set, so a code verifies at most once.
    #[tracing::instrument(skip_all)]
    pub async fn verify_otp(
        &self,
        phone: CompactString,
        code: CompactString,
    ) -> Result<bool, AssignError> {
        Ok(self.processor.process(ConsumeOtp { phone, code }).await?)
    }
}

fn to_response(assignment: Assignment) -> AssignmentResponse {
    AssignmentResponse {
        assignment_id: assignment.id,
        ticket_id: assignment.ticket_id,
        assignee_name: assignment.assignee_name,
        assignee_phone: assignment.assignee_phone,
        status: assignment.status.into(),
        otp_required: assignment.otp_required,
        otp_verified: assignment.otp_verified,
        created_at: assignment.created_at.assume_utc().unix_timestamp(),
    }
}
