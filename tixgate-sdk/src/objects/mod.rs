pub mod assign;
pub mod purchase;
pub mod verify;

pub use assign::{
    AssignRequest, AssignmentResponse, CancelAssignmentRequest, OtpIssueRequest, OtpVerifyRequest,
    OtpVerifyResponse,
};
pub use purchase::{PurchaseReceipt, PurchaseRequest, TicketSummary};
pub use verify::{DenyReason, GateCheck, GateName, ScanOutcome, ScanRequest};

use serde::{Deserialize, Serialize};

/// Attendee category for capacity and pricing.
///
/// This is the API/DTO version. For database operations, see the
/// `sqlx::Type` enums in `tixgate-core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeCategory {
    Adult,
    Student,
    Child,
}

/// Payment state of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Lifecycle state of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Active,
    Used,
    Cancelled,
    Failed,
}

/// State of a ticket assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Active,
    Cancelled,
}

impl std::fmt::Display for AttendeeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendeeCategory::Adult => write!(f, "adult"),
            AttendeeCategory::Student => write!(f, "student"),
            AttendeeCategory::Child => write!(f, "child"),
        }
    }
}
