//! Event plumbing between the API layer and the background processors.
//!
//! # Event Flow
//!
//! 1. Checkout / settlement callbacks emit `NotificationEvent` ->
//!    `NotificationSender`
//! 2. Checkout emits `SettlementTick` -> `SettlementWatcher` (which also
//!    wakes on its own interval)
//! 3. Admin recompute emits `ReconcileTick` -> `Reconciler` (which also
//!    wakes on its own interval)
//!
//! Events are idempotent and ephemeral: they carry identifiers, not
//! data, and processors re-fetch current state from the database.

pub mod channels;
pub mod types;

pub use channels::{
    notification_event_channel, reconcile_tick_channel, settlement_tick_channel, EventSenders,
    NotificationEventReceiver, NotificationEventSender, ReconcileTickReceiver, ReconcileTickSender,
    SettlementTickReceiver, SettlementTickSender, DEFAULT_CHANNEL_BUFFER,
};

pub use types::{NotificationEvent, ReconcileTick, SettlementTick};
