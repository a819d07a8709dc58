//! Settlement callback handler.
//!
//! The payment provider posts terminal charge results here. The body is
//! signed with the gateway secret using the same HMAC scheme as counter
//! requests, so a forged callback cannot promote a ticket.
//!
//! # Endpoints
//!
//! - `POST /callback` – apply a settlement report

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use serde::Serialize;
use tixgate_core::settlement::{SettlementEngine, SettlementError, SettlementOutcome};
use uuid::Uuid;

use crate::api::extractors::GatewaySigned;
use crate::state::AppState;

/// Build the settlement callback router.
pub fn router() -> Router<AppState> {
    Router::new().route("/callback", post(callback))
}

#[derive(Debug)]
pub(crate) struct SettlementApiError(SettlementError);

impl IntoResponse for SettlementApiError {
    fn into_response(self) -> axum::response::Response {
        let SettlementError::Database(e) = &self.0;
        tracing::error!(error = %e, "Settlement callback database error");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
    }
}

/// Acknowledgement body for the provider.
#[derive(Serialize)]
struct CallbackAck {
    applied: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket_id: Option<Uuid>,
}

/// `POST /callback` — apply a settlement report from the provider.
///
/// Replays answer 200 like first deliveries so the provider stops
/// retrying; only an unknown external id is a 404.
async fn callback(
    state: axum::extract::State<AppState>,
    GatewaySigned(report): GatewaySigned<tixgate_core::settlement::SettlementReport>,
) -> Result<impl IntoResponse, SettlementApiError> {
    let engine = SettlementEngine::new(state.db.clone(), state.events.clone());
    let outcome = engine.apply(&report).await.map_err(SettlementApiError)?;

    let response = match outcome {
        SettlementOutcome::Promoted { ticket_id } => (
            StatusCode::OK,
            Json(CallbackAck {
                applied: "promoted",
                ticket_id: Some(ticket_id),
            }),
        ),
        SettlementOutcome::Failed { ticket_id } => (
            StatusCode::OK,
            Json(CallbackAck {
                applied: "failed",
                ticket_id: Some(ticket_id),
            }),
        ),
        SettlementOutcome::AlreadySettled => (
            StatusCode::OK,
            Json(CallbackAck {
                applied: "already_settled",
                ticket_id: None,
            }),
        ),
        SettlementOutcome::UnknownTransaction => (
            StatusCode::NOT_FOUND,
            Json(CallbackAck {
                applied: "unknown_transaction",
                ticket_id: None,
            }),
        ),
    };
    Ok(response)
}
