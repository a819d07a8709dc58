use crate::entities::{AttendeeCategory, PaymentStatus, TicketStatus};
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

/// A sold ticket. Created once by the purchase pipeline; `payment_status`
/// moves via the settlement path, `status` moves to `Used` exactly once
/// via the verification commit.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub session_id: Uuid,
    pub code: CompactString,
    pub purchaser_name: String,
    pub purchaser_phone: CompactString,
    pub category: AttendeeCategory,
    pub adult_count: i32,
    pub student_count: i32,
    pub child_count: i32,
    pub total_count: i32,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub status: TicketStatus,
    pub student_id: Option<String>,
    pub student_school: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: time::PrimitiveDateTime,
    pub verified_at: Option<time::PrimitiveDateTime>,
}

/// Data for inserting a new ticket.
#[derive(Debug, Clone)]
pub struct TicketInsert {
    pub session_id: Uuid,
    pub code: CompactString,
    pub purchaser_name: String,
    pub purchaser_phone: CompactString,
    pub category: AttendeeCategory,
    pub quantity: i32,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub status: TicketStatus,
    pub student_id: Option<String>,
    pub student_school: Option<String>,
}

impl TicketInsert {
    fn count_for(&self, category: AttendeeCategory) -> i32 {
        if self.category == category {
            self.quantity
        } else {
            0
        }
    }
}

impl Ticket {
    /// Insert a ticket inside the purchase transaction. Returns the new id.
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        insert: &TicketInsert,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO tickets
                (id, session_id, code, purchaser_name, purchaser_phone, category,
                 adult_count, student_count, child_count, total_count, total_amount,
                 payment_status, status, student_id, student_school)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(id)
        .bind(insert.session_id)
        .bind(insert.code.as_str())
        .bind(&insert.purchaser_name)
        .bind(insert.purchaser_phone.as_str())
        .bind(insert.category)
        .bind(insert.count_for(AttendeeCategory::Adult))
        .bind(insert.count_for(AttendeeCategory::Student))
        .bind(insert.count_for(AttendeeCategory::Child))
        .bind(insert.quantity)
        .bind(insert.total_amount)
        .bind(insert.payment_status)
        .bind(insert.status)
        .bind(&insert.student_id)
        .bind(&insert.student_school)
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Compare-and-set transition to `Used`, stamping the verification
    /// time. Only succeeds while the ticket is still `Active`, so of two
    /// concurrent scans exactly one wins.
    pub async fn mark_used_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: Uuid,
        verified_at: time::PrimitiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'used', verified_at = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(ticket_id)
        .bind(verified_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Settlement promotion: `Pending`/`Unpaid` ticket becomes
    /// `Paid`/`Active`. Compare-and-set so a late or duplicate callback
    /// cannot resurrect a used or failed ticket.
    pub async fn promote_paid_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET payment_status = 'paid', status = 'active'
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(ticket_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Settlement rejection: `Pending` ticket becomes `Failed`/`Failed`.
    pub async fn mark_failed_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET payment_status = 'failed', status = 'failed'
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(ticket_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct GetTicketById {
    pub ticket_id: Uuid,
}

impl Processor<GetTicketById> for DatabaseProcessor {
    type Output = Option<Ticket>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTicketById")]
    async fn process(&self, query: GetTicketById) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(TICKET_SELECT_BY_ID)
            .bind(query.ticket_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetTicketByCode {
    pub code: CompactString,
}

impl Processor<GetTicketByCode> for DatabaseProcessor {
    type Output = Option<Ticket>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTicketByCode")]
    async fn process(&self, query: GetTicketByCode) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, session_id, code, purchaser_name, purchaser_phone, category,
                   adult_count, student_count, child_count, total_count, total_amount,
                   payment_status, status, student_id, student_school, metadata,
                   created_at, verified_at
            FROM tickets
            WHERE code = $1
            "#,
        )
        .bind(query.code.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}

const TICKET_SELECT_BY_ID: &str = r#"
SELECT id, session_id, code, purchaser_name, purchaser_phone, category,
       adult_count, student_count, child_count, total_count, total_amount,
       payment_status, status, student_id, student_school, metadata,
       created_at, verified_at
FROM tickets
WHERE id = $1
"#;

/// What an outbound ticket SMS needs: the holder's phone plus enough
/// session detail to render the message.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TicketNotificationView {
    pub code: CompactString,
    pub purchaser_phone: CompactString,
    pub session_name: String,
    pub held_on: time::Date,
    pub starts_at: time::Time,
}

#[derive(Debug, Clone)]
pub struct GetTicketNotificationView {
    pub ticket_id: Uuid,
}

impl Processor<GetTicketNotificationView> for DatabaseProcessor {
    type Output = Option<TicketNotificationView>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTicketNotificationView")]
    async fn process(
        &self,
        query: GetTicketNotificationView,
    ) -> Result<Option<TicketNotificationView>, sqlx::Error> {
        sqlx::query_as::<_, TicketNotificationView>(
            r#"
            SELECT t.code, t.purchaser_phone, s.name AS session_name,
                   d.held_on, s.starts_at
            FROM tickets t
            JOIN sessions s ON s.id = t.session_id
            JOIN event_days d ON d.id = s.day_id
            WHERE t.id = $1
            "#,
        )
        .bind(query.ticket_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Everything the verification gates need about a scanned code, fetched
/// in one joined query: the ticket plus its session window and day date.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TicketForScan {
    pub ticket_id: Uuid,
    pub code: CompactString,
    pub purchaser_name: String,
    pub category: AttendeeCategory,
    pub total_count: i32,
    pub payment_status: PaymentStatus,
    pub status: TicketStatus,
    pub session_id: Uuid,
    pub session_name: String,
    pub starts_at: time::Time,
    pub ends_at: time::Time,
    pub held_on: time::Date,
}

#[derive(Debug, Clone)]
pub struct GetTicketForScan {
    pub code: CompactString,
}

impl Processor<GetTicketForScan> for DatabaseProcessor {
    type Output = Option<TicketForScan>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTicketForScan")]
    async fn process(&self, query: GetTicketForScan) -> Result<Option<TicketForScan>, sqlx::Error> {
        sqlx::query_as::<_, TicketForScan>(
            r#"
            SELECT t.id AS ticket_id, t.code, t.purchaser_name, t.category,
                   t.total_count, t.payment_status, t.status,
                   s.id AS session_id, s.name AS session_name,
                   s.starts_at, s.ends_at, d.held_on
            FROM tickets t
            JOIN sessions s ON s.id = t.session_id
            JOIN event_days d ON d.id = s.day_id
            WHERE t.code = $1
            "#,
        )
        .bind(query.code.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}
