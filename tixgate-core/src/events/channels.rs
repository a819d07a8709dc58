//! Event channel factories and handles.

use super::types::{NotificationEvent, ReconcileTick, SettlementTick};
use tokio::sync::mpsc;

/// Default buffer size for event channels. Enough for counter-rush
/// bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for NotificationEvent events.
pub type NotificationEventSender = mpsc::Sender<NotificationEvent>;
/// Receiver handle for NotificationEvent events.
pub type NotificationEventReceiver = mpsc::Receiver<NotificationEvent>;

/// Sender handle for SettlementTick events.
pub type SettlementTickSender = mpsc::Sender<SettlementTick>;
/// Receiver handle for SettlementTick events.
pub type SettlementTickReceiver = mpsc::Receiver<SettlementTick>;

/// Sender handle for ReconcileTick events.
pub type ReconcileTickSender = mpsc::Sender<ReconcileTick>;
/// Receiver handle for ReconcileTick events.
pub type ReconcileTickReceiver = mpsc::Receiver<ReconcileTick>;

/// Create a new NotificationEvent channel.
pub fn notification_event_channel() -> (NotificationEventSender, NotificationEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new SettlementTick channel.
pub fn settlement_tick_channel() -> (SettlementTickSender, SettlementTickReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new ReconcileTick channel.
pub fn reconcile_tick_channel() -> (ReconcileTickSender, ReconcileTickReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Container for every event sender the API layer can emit into.
#[derive(Clone)]
pub struct EventSenders {
    /// Sender for NotificationEvent events
    pub notification: NotificationEventSender,
    /// Sender for SettlementTick events
    pub settlement_tick: SettlementTickSender,
    /// Sender for ReconcileTick events
    pub reconcile_tick: ReconcileTickSender,
}

impl EventSenders {
    /// Create a new EventSenders container.
    pub fn new(
        notification: NotificationEventSender,
        settlement_tick: SettlementTickSender,
        reconcile_tick: ReconcileTickSender,
    ) -> Self {
        Self {
            notification,
            settlement_tick,
            reconcile_tick,
        }
    }
}
