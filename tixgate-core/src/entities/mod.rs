pub mod assignment;
pub mod attendee;
pub mod event_day;
pub mod ledger;
pub mod otp;
pub mod payment_method;
pub mod payment_txn;
pub mod price;
pub mod session;
pub mod ticket;

use tixgate_sdk::objects::{
    AssignmentStatus as SdkAssignmentStatus, AttendeeCategory as SdkAttendeeCategory,
    PaymentStatus as SdkPaymentStatus, TicketStatus as SdkTicketStatus,
};

/// Attendee category for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `tixgate_sdk::objects::AttendeeCategory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "attendee_category")]
pub enum AttendeeCategory {
    Adult,
    Student,
    Child,
}

impl AttendeeCategory {
    /// All categories, in ledger column order.
    pub const ALL: [AttendeeCategory; 3] = [
        AttendeeCategory::Adult,
        AttendeeCategory::Student,
        AttendeeCategory::Child,
    ];
}

/// Payment state of a ticket for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "payment_status")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Lifecycle state of a ticket for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "ticket_status")]
pub enum TicketStatus {
    Pending,
    Active,
    Used,
    Cancelled,
    Failed,
}

/// Payment transaction state for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "transaction_status")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Error,
    Cancelled,
}

/// Assignment state for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "assignment_status")]
pub enum AssignmentStatus {
    Active,
    Cancelled,
}

/// Payment method kind: cash settles at the counter, digital goes through
/// the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "payment_method_kind")]
pub enum PaymentMethodKind {
    Cash,
    Digital,
}

impl From<AttendeeCategory> for SdkAttendeeCategory {
    fn from(value: AttendeeCategory) -> Self {
        match value {
            AttendeeCategory::Adult => SdkAttendeeCategory::Adult,
            AttendeeCategory::Student => SdkAttendeeCategory::Student,
            AttendeeCategory::Child => SdkAttendeeCategory::Child,
        }
    }
}

impl From<SdkAttendeeCategory> for AttendeeCategory {
    fn from(value: SdkAttendeeCategory) -> Self {
        match value {
            SdkAttendeeCategory::Adult => AttendeeCategory::Adult,
            SdkAttendeeCategory::Student => AttendeeCategory::Student,
            SdkAttendeeCategory::Child => AttendeeCategory::Child,
        }
    }
}

impl From<PaymentStatus> for SdkPaymentStatus {
    fn from(value: PaymentStatus) -> Self {
        match value {
            PaymentStatus::Unpaid => SdkPaymentStatus::Unpaid,
            PaymentStatus::Pending => SdkPaymentStatus::Pending,
            PaymentStatus::Paid => SdkPaymentStatus::Paid,
            PaymentStatus::Failed => SdkPaymentStatus::Failed,
            PaymentStatus::Refunded => SdkPaymentStatus::Refunded,
        }
    }
}

impl From<TicketStatus> for SdkTicketStatus {
    fn from(value: TicketStatus) -> Self {
        match value {
            TicketStatus::Pending => SdkTicketStatus::Pending,
            TicketStatus::Active => SdkTicketStatus::Active,
            TicketStatus::Used => SdkTicketStatus::Used,
            TicketStatus::Cancelled => SdkTicketStatus::Cancelled,
            TicketStatus::Failed => SdkTicketStatus::Failed,
        }
    }
}

impl From<AssignmentStatus> for SdkAssignmentStatus {
    fn from(value: AssignmentStatus) -> Self {
        match value {
            AssignmentStatus::Active => SdkAssignmentStatus::Active,
            AssignmentStatus::Cancelled => SdkAssignmentStatus::Cancelled,
        }
    }
}
