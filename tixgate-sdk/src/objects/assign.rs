use crate::objects::{AssignmentStatus, AttendeeCategory};
use crate::signature::Signature;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request payload for assigning a paid ticket to a new named attendee.
///
/// When `require_otp` is set, the caller must have verified an OTP for
/// the assignee's phone (`POST /otp/verify`) before sending this request;
/// the server records whether that happened in the assignment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRequest {
    pub ticket_id: Uuid,
    pub assignee_name: String,
    pub assignee_phone: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_email: Option<String>,
    pub assignee_category: AttendeeCategory,
    pub agent_id: Uuid,
    #[serde(default)]
    pub require_otp: bool,
    /// Set by the caller after a successful `POST /otp/verify`.
    #[serde(default)]
    pub otp_verified: bool,
}

impl Signature for AssignRequest {}

/// Response for a created or fetched assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResponse {
    pub assignment_id: Uuid,
    pub ticket_id: Uuid,
    pub assignee_name: String,
    pub assignee_phone: CompactString,
    pub status: AssignmentStatus,
    pub otp_required: bool,
    pub otp_verified: bool,
    /// Unix timestamp of when the assignment was created.
    pub created_at: i64,
}

/// Request payload for cancelling an assignment. Only the agent that
/// created the assignment may cancel it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAssignmentRequest {
    pub assignment_id: Uuid,
    pub agent_id: Uuid,
}

impl Signature for CancelAssignmentRequest {}

/// Request payload for issuing an OTP to a phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpIssueRequest {
    pub phone: CompactString,
}

impl Signature for OtpIssueRequest {}

/// Request payload for verifying (and consuming) an OTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: CompactString,
    pub code: CompactString,
}

impl Signature for OtpVerifyRequest {}

/// Response for an OTP verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyResponse {
    pub verified: bool,
}
