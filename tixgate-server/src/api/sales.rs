//! Sales API handlers.
//!
//! Called by sales counters and the purchase form backend; every request
//! carries a signed body verified via the `Tixgate-Signature` header.
//!
//! # Endpoints
//!
//! - `POST /purchase`       – purchase tickets for a session
//! - `POST /tickets/lookup` – look up a ticket by code

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use kanau::processor::Processor;
use tixgate_core::entities::ledger::CapacityError;
use tixgate_core::entities::ticket::{GetTicketByCode, Ticket};
use tixgate_core::framework::DatabaseProcessor;
use tixgate_core::purchase::{PurchaseError, PurchasePipeline};
use tixgate_sdk::objects::purchase::{PurchaseRequest, TicketLookupRequest, TicketSummary};

use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Sales API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchase", post(purchase))
        .route("/tickets/lookup", post(lookup_ticket))
}

/// Errors that can occur in Sales API handlers.
#[derive(Debug)]
pub(crate) enum SalesApiError {
    Purchase(PurchaseError),
    Database(sqlx::Error),
    NotFound,
}

impl IntoResponse for SalesApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SalesApiError::Purchase(e) => purchase_error_response(e),
            SalesApiError::Database(e) => {
                tracing::error!(error = %e, "Sales API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            SalesApiError::NotFound => (StatusCode::NOT_FOUND, "ticket not found").into_response(),
        }
    }
}

fn purchase_error_response(e: PurchaseError) -> axum::response::Response {
    let status = match &e {
        PurchaseError::UnknownDay
        | PurchaseError::UnknownSession
        | PurchaseError::UnknownPrice
        | PurchaseError::UnknownPaymentMethod => StatusCode::NOT_FOUND,
        PurchaseError::DayInactive
        | PurchaseError::PaymentMethodInactive
        | PurchaseError::Capacity(CapacityError::SessionInactive)
        | PurchaseError::Capacity(CapacityError::InsufficientCapacity) => StatusCode::CONFLICT,
        PurchaseError::Capacity(CapacityError::SessionNotFound) => StatusCode::NOT_FOUND,
        PurchaseError::SessionDayMismatch
        | PurchaseError::PriceSessionMismatch
        | PurchaseError::PriceCategoryMismatch
        | PurchaseError::InvalidQuantity { .. }
        | PurchaseError::AmountMismatch { .. }
        | PurchaseError::StudentIdRequired => StatusCode::UNPROCESSABLE_ENTITY,
        PurchaseError::GatewayRejected { .. } => StatusCode::PAYMENT_REQUIRED,
        PurchaseError::Database(err) => {
            tracing::error!(error = %err, "Purchase database error");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response();
        }
    };
    (status, e.to_string()).into_response()
}

/// `POST /purchase` — purchase tickets for a session.
async fn purchase(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<PurchaseRequest>,
) -> Result<impl IntoResponse, SalesApiError> {
    let gateway_cfg = state.config.gateway.read().await;
    let account_ref = gateway_cfg.account_ref.clone();
    let currency = gateway_cfg.currency.clone();
    drop(gateway_cfg);

    let pipeline = PurchasePipeline::new(
        state.db.clone(),
        state.gateway.clone(),
        state.events.clone(),
        account_ref,
        currency,
    );

    let receipt = pipeline
        .purchase(&payload)
        .await
        .map_err(SalesApiError::Purchase)?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Convert a `Ticket` (DB model) into a `TicketSummary` (API model).
pub(crate) fn to_summary(ticket: &Ticket) -> TicketSummary {
    TicketSummary {
        ticket_id: ticket.id,
        code: ticket.code.clone(),
        session_id: ticket.session_id,
        purchaser_name: ticket.purchaser_name.clone(),
        category: ticket.category.into(),
        quantity: ticket.total_count.max(0) as u32,
        total_amount: ticket.total_amount,
        payment_status: ticket.payment_status.into(),
        status: ticket.status.into(),
        created_at: ticket.created_at.assume_utc().unix_timestamp(),
        verified_at: ticket.verified_at.map(|t| t.assume_utc().unix_timestamp()),
    }
}

/// `POST /tickets/lookup` — look up a ticket by code.
async fn lookup_ticket(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<TicketLookupRequest>,
) -> Result<impl IntoResponse, SalesApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let ticket = processor
        .process(GetTicketByCode { code: payload.code })
        .await
        .map_err(SalesApiError::Database)?
        .ok_or(SalesApiError::NotFound)?;

    Ok(Json(to_summary(&ticket)))
}
