//! Assignment API handlers.
//!
//! Called by counters handling ticket transfers; signed-body
//! authentication like the Sales API.
//!
//! # Endpoints
//!
//! - `POST /assignments`        – assign a paid ticket to a new attendee
//! - `POST /assignments/cancel` – cancel an active assignment
//! - `POST /otp/request`        – issue a one-time code to a phone
//! - `POST /otp/verify`         – verify and consume a one-time code

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use tixgate_core::assign::{AssignError, AssignmentEngine};
use tixgate_sdk::objects::assign::{
    AssignRequest, CancelAssignmentRequest, OtpIssueRequest, OtpVerifyRequest, OtpVerifyResponse,
};

use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Assignment API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assignments", post(assign))
        .route("/assignments/cancel", post(cancel))
        .route("/otp/request", post(request_otp))
        .route("/otp/verify", post(verify_otp))
}

/// Errors that can occur in Assignment API handlers.
#[derive(Debug)]
pub(crate) struct AssignApiError(AssignError);

impl IntoResponse for AssignApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AssignError::TicketNotFound | AssignError::AssignmentNotFound => StatusCode::NOT_FOUND,
            AssignError::TicketNotAssignable | AssignError::AlreadyAssigned => StatusCode::CONFLICT,
            AssignError::OtpNotVerified => StatusCode::PRECONDITION_FAILED,
            AssignError::Database(e) => {
                tracing::error!(error = %e, "Assignment API database error");
                return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
                    .into_response();
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

fn engine(state: &AppState) -> AssignmentEngine {
    AssignmentEngine::new(state.db.clone(), state.events.clone())
}

/// `POST /assignments` — assign a paid ticket to a new attendee.
async fn assign(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<AssignRequest>,
) -> Result<impl IntoResponse, AssignApiError> {
    let response = engine(&state)
        .assign(&payload)
        .await
        .map_err(AssignApiError)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /assignments/cancel` — cancel an active assignment.
async fn cancel(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<CancelAssignmentRequest>,
) -> Result<impl IntoResponse, AssignApiError> {
    let response = engine(&state)
        .cancel(&payload)
        .await
        .map_err(AssignApiError)?;
    Ok(Json(response))
}

/// `POST /otp/request` — issue a one-time code to a phone number.
///
/// Always answers 202: the code travels by SMS, never in the response.
async fn request_otp(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<OtpIssueRequest>,
) -> Result<impl IntoResponse, AssignApiError> {
    engine(&state)
        .issue_otp(payload.phone)
        .await
        .map_err(AssignApiError)?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /otp/verify` — verify and consume a one-time code.
async fn verify_otp(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<OtpVerifyRequest>,
) -> Result<impl IntoResponse, AssignApiError> {
    let verified = engine(&state)
        .verify_otp(payload.phone, payload.code)
        .await
        .map_err(AssignApiError)?;
    Ok(Json(OtpVerifyResponse { verified }))
}
