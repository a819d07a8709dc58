//! Admin API handlers.
//!
//! These endpoints are called by the operations dashboard and require
//! the `Tixgate-Admin-Authorization` header with the plaintext admin
//! secret.
//!
//! # Endpoints
//!
//! - `GET  /sessions/{session_id}/ledger`    – current inventory ledger
//! - `POST /sessions/{session_id}/recompute` – rebuild one ledger from ticket rows
//! - `POST /recompute-all`                   – sweep every session

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use kanau::processor::Processor;
use serde::Serialize;
use tixgate_core::entities::ledger::{GetLedgerSnapshot, InventoryLedger};
use tixgate_core::events::ReconcileTick;
use tixgate_core::framework::DatabaseProcessor;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/{session_id}/ledger", get(show_ledger))
        .route("/sessions/{session_id}/recompute", post(recompute_session))
        .route("/recompute-all", post(recompute_all))
}

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Database(sqlx::Error),
    NotFound,
    EventChannelClosed,
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Database(e) => {
                tracing::error!(error = %e, "Admin API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            AdminApiError::EventChannelClosed => {
                tracing::error!("Admin API: event channel closed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

/// Ledger view returned to the dashboard.
#[derive(Serialize)]
struct LedgerResponse {
    session_id: Uuid,
    adult_capacity: i32,
    student_capacity: i32,
    child_capacity: i32,
    adult_booked: i32,
    student_booked: i32,
    child_booked: i32,
    is_sold_out: bool,
    is_active: bool,
}

fn to_ledger_response(ledger: &InventoryLedger) -> LedgerResponse {
    LedgerResponse {
        session_id: ledger.session_id,
        adult_capacity: ledger.adult_capacity,
        student_capacity: ledger.student_capacity,
        child_capacity: ledger.child_capacity,
        adult_booked: ledger.adult_booked,
        student_booked: ledger.student_booked,
        child_booked: ledger.child_booked,
        is_sold_out: ledger.is_sold_out,
        is_active: ledger.is_active,
    }
}

/// `GET /sessions/{session_id}/ledger` — show a session's inventory ledger.
async fn show_ledger(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let ledger = processor
        .process(GetLedgerSnapshot { session_id })
        .await
        .map_err(AdminApiError::Database)?
        .ok_or(AdminApiError::NotFound)?;

    Ok(Json(to_ledger_response(&ledger)))
}

/// `POST /sessions/{session_id}/recompute` — queue a rebuild of one
/// session's ledger from its surviving ticket rows.
async fn recompute_session(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    state
        .events
        .reconcile_tick
        .send(ReconcileTick {
            session_id: Some(session_id),
        })
        .await
        .map_err(|_| AdminApiError::EventChannelClosed)?;

    tracing::info!(session_id = %session_id, "Admin queued ledger recompute");
    Ok(StatusCode::ACCEPTED)
}

/// `POST /recompute-all` — queue a full reconcile sweep.
async fn recompute_all(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, AdminApiError> {
    state
        .events
        .reconcile_tick
        .send(ReconcileTick { session_id: None })
        .await
        .map_err(|_| AdminApiError::EventChannelClosed)?;

    tracing::info!("Admin queued full reconcile sweep");
    Ok(StatusCode::ACCEPTED)
}
