//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use sqlx::PgPool;
use std::sync::Arc;
use tixgate_core::events::EventSenders;
use tixgate_core::gateway::PaymentGateway;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Runtime configuration; sections can be reloaded via SIGHUP.
    pub config: SharedConfig,
    /// Senders for the background processor queues.
    pub events: EventSenders,
    /// Payment gateway client. Built at startup; endpoint changes need a
    /// restart, only secrets reload.
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: SharedConfig,
        events: EventSenders,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db,
            config,
            events,
            gateway,
        }
    }
}
