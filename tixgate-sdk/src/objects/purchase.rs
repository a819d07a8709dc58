use crate::objects::{AttendeeCategory, PaymentStatus, TicketStatus};
use crate::signature::Signature;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request payload for purchasing tickets.
///
/// Sent by the sales counter (or purchase form backend) to the Sales API.
/// `total_amount` is the amount the purchaser was charged and must equal
/// `unit_price * quantity` exactly; a mismatch is rejected, never
/// silently corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub day_id: Uuid,
    pub session_id: Uuid,
    pub price_id: Uuid,
    pub payment_method_id: Uuid,
    pub category: AttendeeCategory,
    pub quantity: u32,
    pub purchaser_name: String,
    pub purchaser_phone: CompactString,
    pub total_amount: rust_decimal::Decimal,
    /// Student-ticket extras, required by some venues for the student
    /// category and ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_school: Option<String>,
}

impl Signature for PurchaseRequest {}

/// Response returned by a successful purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub ticket_id: Uuid,
    /// Human-presentable code printed on the ticket and encoded in the QR.
    pub ticket_code: CompactString,
    pub payment_status: PaymentStatus,
    pub status: TicketStatus,
    /// Set for digital payments that were accepted by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
}

/// Request payload for looking up a ticket by its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLookupRequest {
    pub code: CompactString,
}

impl Signature for TicketLookupRequest {}

/// Public view of a ticket, returned by lookup endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSummary {
    pub ticket_id: Uuid,
    pub code: CompactString,
    pub session_id: Uuid,
    pub purchaser_name: String,
    pub category: AttendeeCategory,
    pub quantity: u32,
    pub total_amount: rust_decimal::Decimal,
    pub payment_status: PaymentStatus,
    pub status: TicketStatus,
    /// Unix timestamp of when the ticket was created.
    pub created_at: i64,
    /// Unix timestamp of gate verification, if the ticket was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<i64>,
}
