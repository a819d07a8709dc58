//! Background processors.
//!
//! - `SettlementWatcher`: polls the gateway for pending transactions
//!   whose callback never arrived, applies the answers
//! - `NotificationSender`: receives `NotificationEvent`, delivers SMS
//!   with bounded retry
//! - `Reconciler`: periodically recomputes inventory ledgers from ticket
//!   rows and purges expired OTP codes

pub mod notification_sender;
pub mod reconciler;
pub mod settlement_watcher;

pub use notification_sender::NotificationSender;
pub use reconciler::Reconciler;
pub use settlement_watcher::SettlementWatcher;
