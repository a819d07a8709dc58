//! SettlementWatcher processor.
//!
//! The provider's callback is the fast path for settlement; this watcher
//! is the slow path. It wakes on `SettlementTick` (sent right after a
//! charge is accepted) and on its own interval, finds pending
//! transactions old enough that a callback should have arrived, and asks
//! the gateway for their state. Definitive answers go through the same
//! `SettlementEngine` as callbacks, so the two paths cannot double-apply.

use crate::entities::payment_txn::GetPendingTransactions;
use crate::framework::DatabaseProcessor;
use crate::gateway::{ChargeStatus, PaymentGateway};
use crate::settlement::{SettlementEngine, SettlementReport, SettlementResult};
use kanau::processor::Processor;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Leave a pending transaction alone until it is this old; younger ones
/// are still inside the callback's normal latency.
const MIN_PENDING_AGE_SECONDS: i64 = 60;

/// Transactions polled per sweep.
const SWEEP_LIMIT: i64 = 20;

/// Interval between sweeps when no tick arrives.
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// SettlementWatcher resolves pending transactions the callback missed.
pub struct SettlementWatcher {
    processor: DatabaseProcessor,
    gateway: Arc<dyn PaymentGateway>,
    engine: SettlementEngine,
    tick_rx: crate::events::SettlementTickReceiver,
    shutdown_rx: watch::Receiver<bool>,
}

impl SettlementWatcher {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        engine: SettlementEngine,
        tick_rx: crate::events::SettlementTickReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
            gateway,
            engine,
            tick_rx,
            shutdown_rx,
        }
    }

    /// Run the SettlementWatcher.
    pub async fn run(mut self) {
        info!("SettlementWatcher started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("SettlementWatcher received shutdown signal");
                        break;
                    }
                }

                Some(_) = self.tick_rx.recv() => {
                    debug!("Received SettlementTick");
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Settlement sweep failed");
                    }
                }

                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Settlement sweep failed");
                    }
                }
            }
        }

        info!("SettlementWatcher shutdown complete");
    }

    /// One sweep over stale pending transactions.
    async fn sweep(&self) -> Result<(), sqlx::Error> {
        let pending = self
            .processor
            .process(GetPendingTransactions {
                min_age_seconds: MIN_PENDING_AGE_SECONDS,
                limit: SWEEP_LIMIT,
            })
            .await?;
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "Polling gateway for pending transactions");

        for txn in pending {
            let status = match self.gateway.lookup(&txn.external_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        external_id = %txn.external_id,
                        error = %e,
                        "Gateway status lookup failed"
                    );
                    continue;
                }
            };
            let result = match status {
                // Still in flight at the provider; check again next sweep.
                ChargeStatus::Pending => continue,
                ChargeStatus::Paid => SettlementResult::Paid,
                ChargeStatus::Failed => SettlementResult::Failed,
            };
            let report = SettlementReport {
                external_id: txn.external_id.clone(),
                result,
                provider_txn_id: None,
                raw_payload: None,
            };
            match self.engine.apply(&report).await {
                Ok(outcome) => {
                    info!(
                        external_id = %txn.external_id,
                        outcome = ?outcome,
                        "Resolved pending transaction by polling"
                    );
                }
                Err(e) => {
                    error!(
                        external_id = %txn.external_id,
                        error = %e,
                        "Failed to apply polled settlement"
                    );
                }
            }
        }
        Ok(())
    }
}
