use crate::objects::AttendeeCategory;
use crate::signature::Signature;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request payload for a gate scan.
///
/// `raw_code` is whatever the scanner produced: a bare ticket code or a
/// full link containing one. The server sanitizes it before lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub raw_code: String,
    /// Identifier of the scanning device or gate agent, recorded for audit.
    pub agent_id: Uuid,
}

impl Signature for ScanRequest {}

/// The ordered verification gates. A scan passes gates strictly in this
/// order; the first failing gate terminates verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    Sanitize,
    Lookup,
    Payment,
    Date,
    TimeWindow,
    Usage,
    Commit,
}

/// Why a scan was denied. Carries the first failing gate's reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    MalformedCode,
    NotFound,
    Unpaid,
    WrongDay,
    WrongTime,
    AlreadyUsed,
}

/// One evaluated gate in the diagnostic trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCheck {
    pub gate: GateName,
    pub passed: bool,
    /// Human-readable detail for support and audit.
    pub detail: String,
}

/// Outcome of a gate scan: admit with a summary, or deny with the first
/// failing gate's reason. Both carry the trail of every gate evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "UPPERCASE")]
pub enum ScanOutcome {
    Admit {
        ticket_id: Uuid,
        code: CompactString,
        purchaser_name: String,
        category: AttendeeCategory,
        quantity: u32,
        session_name: String,
        /// Unix timestamp of the admit.
        verified_at: i64,
        trail: Vec<GateCheck>,
    },
    Deny {
        reason: DenyReason,
        failed_gate: GateName,
        trail: Vec<GateCheck>,
    },
}

impl ScanOutcome {
    /// Whether the scan admitted the ticket holder.
    pub fn is_admit(&self) -> bool {
        matches!(self, ScanOutcome::Admit { .. })
    }
}
