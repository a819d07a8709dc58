//! Event type definitions.
//!
//! Events carry identifiers rather than full rows; the handling
//! processor re-fetches current state, so a replayed or stale event is
//! harmless.

use compact_str::CompactString;
use uuid::Uuid;

/// Triggers an outbound SMS through the `NotificationSender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A ticket became active (cash checkout, or a settled digital
    /// payment). Sends the confirmation message with the ticket code.
    TicketConfirmed { ticket_id: Uuid },
    /// A digital payment was rejected after checkout. Sends the failure
    /// notice so the buyer can retry.
    TicketFailed { ticket_id: Uuid },
    /// A one-time code was issued for this phone; the sender looks up
    /// the current unconsumed code and delivers it.
    OtpIssued { phone: CompactString },
}

/// Wakes the `SettlementWatcher` ahead of its poll interval, emitted
/// right after checkout records a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementTick;

/// Wakes the `Reconciler`. `session_id: None` means sweep every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileTick {
    pub session_id: Option<Uuid>,
}
