//! HTTP API surface.
//!
//! All routes hang under `/api/v1`:
//!
//! - `/sales`       – purchase and ticket lookup (signed counter requests)
//! - `/gate`        – scan verification (signed counter requests)
//! - `/assignments`, `/otp` – ticket transfer (signed counter requests)
//! - `/settlements` – provider callback (signed with the gateway secret)
//! - `/admin`       – operations dashboard (admin secret header)

pub mod admin;
pub mod assign;
pub mod extractors;
pub mod gate;
pub mod sales;
pub mod settlement;

use axum::Router;

use crate::state::AppState;

/// Assemble the `/api/v1` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/sales", sales::router())
        .nest("/gate", gate::router())
        .merge(assign::router())
        .nest("/settlements", settlement::router())
        .nest("/admin", admin::router())
}
