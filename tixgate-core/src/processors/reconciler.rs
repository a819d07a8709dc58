//! Reconciler processor.
//!
//! Booked counters are maintained incrementally by reserve/release;
//! drift (a crashed process between statements, or manual surgery on
//! ticket rows) is caught here. The reconciler locks each ledger and
//! rewrites it from the surviving ticket rows on an interval, and on
//! demand when an admin posts a `ReconcileTick`. Expired OTP codes are
//! purged in the same sweep.

use crate::entities::ledger::RecomputeLedger;
use crate::entities::otp::PurgeExpiredOtps;
use crate::entities::session::ListSessionIds;
use crate::events::{ReconcileTick, ReconcileTickReceiver};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Interval between full sweeps when no tick arrives.
pub const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);

/// Reconciler rebuilds inventory ledgers from ticket rows.
pub struct Reconciler {
    processor: DatabaseProcessor,
    tick_rx: ReconcileTickReceiver,
    shutdown_rx: watch::Receiver<bool>,
    interval: std::time::Duration,
}

impl Reconciler {
    pub fn new(
        pool: PgPool,
        tick_rx: ReconcileTickReceiver,
        shutdown_rx: watch::Receiver<bool>,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
            tick_rx,
            shutdown_rx,
            interval,
        }
    }

    /// Run the Reconciler.
    pub async fn run(mut self) {
        info!("Reconciler started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Reconciler received shutdown signal");
                        break;
                    }
                }

                Some(tick) = self.tick_rx.recv() => {
                    debug!(tick = ?tick, "Received ReconcileTick");
                    if let Err(e) = self.handle_tick(tick).await {
                        error!(error = %e, "Reconcile failed");
                    }
                }

                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.sweep_all().await {
                        error!(error = %e, "Reconcile sweep failed");
                    }
                }
            }
        }

        info!("Reconciler shutdown complete");
    }

    async fn handle_tick(&self, tick: ReconcileTick) -> Result<(), sqlx::Error> {
        match tick.session_id {
            Some(session_id) => self.recompute_one(session_id).await,
            None => self.sweep_all().await,
        }
    }

    async fn sweep_all(&self) -> Result<(), sqlx::Error> {
        let session_ids = self.processor.process(ListSessionIds).await?;
        debug!(sessions = session_ids.len(), "Reconcile sweep");
        for session_id in session_ids {
            self.recompute_one(session_id).await?;
        }

        let purged = self.processor.process(PurgeExpiredOtps).await?;
        if purged > 0 {
            debug!(purged, "Purged expired OTP codes");
        }
        Ok(())
    }

    async fn recompute_one(&self, session_id: Uuid) -> Result<(), sqlx::Error> {
        match self.processor.process(RecomputeLedger { session_id }).await? {
            Some(ledger) => {
                debug!(session_id = %session_id, ledger = ?ledger, "Ledger recomputed");
            }
            None => {
                warn!(session_id = %session_id, "Reconcile asked for a session with no ledger");
            }
        }
        Ok(())
    }
}
