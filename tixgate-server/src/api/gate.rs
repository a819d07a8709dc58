//! Gate API handlers.
//!
//! Called by gate scanners; same signed-body authentication as the
//! Sales API.
//!
//! # Endpoints
//!
//! - `POST /scan` – verify a scanned code and consume the ticket

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use tixgate_core::verify::{GatePolicy, VerificationEngine, VerifyError};
use tixgate_sdk::objects::verify::ScanRequest;

use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Gate API router.
pub fn router() -> Router<AppState> {
    Router::new().route("/scan", post(scan))
}

/// Errors that can occur in Gate API handlers.
#[derive(Debug)]
pub(crate) enum GateApiError {
    Verify(VerifyError),
}

impl IntoResponse for GateApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            GateApiError::Verify(e) => {
                tracing::error!(error = %e, "Gate API verification error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

/// `POST /scan` — run the verification gates for a scanned code.
///
/// Denials are a normal outcome, not an HTTP error: the response is
/// always 200 with the `ScanOutcome` in the body so scanner firmware
/// only has to branch on the outcome field.
async fn scan(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<ScanRequest>,
) -> Result<impl IntoResponse, GateApiError> {
    let server = state.config.server.read().await;
    let utc_offset = server.utc_offset();
    drop(server);
    let verification = state.config.verification.read().await;
    let early_entry = time::Duration::minutes(verification.early_entry_minutes);
    drop(verification);

    let engine = VerificationEngine::new(
        state.db.clone(),
        GatePolicy {
            utc_offset,
            early_entry,
        },
    );

    let outcome = engine
        .scan(&payload.raw_code)
        .await
        .map_err(GateApiError::Verify)?;

    tracing::info!(
        agent_id = %payload.agent_id,
        admitted = outcome.is_admit(),
        "Gate scan processed"
    );

    Ok(Json(outcome))
}
