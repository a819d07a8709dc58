use crate::entities::{AssignmentStatus, AttendeeCategory};
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use uuid::Uuid;

/// Name of the partial unique index enforcing at most one ACTIVE
/// assignment per ticket.
pub const ACTIVE_ASSIGNMENT_INDEX: &str = "ux_assignments_active";

/// A ticket assignment: transfers attendance of a paid ticket to a named
/// person. Ownership lives here, not in mutated ticket purchaser fields;
/// the original owner is snapshotted into `metadata` for audit.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub assignee_name: String,
    pub assignee_phone: CompactString,
    pub assignee_email: Option<String>,
    pub assignee_category: AttendeeCategory,
    pub agent_id: Uuid,
    pub status: AssignmentStatus,
    pub otp_required: bool,
    pub otp_verified: bool,
    pub metadata: serde_json::Value,
    pub created_at: time::PrimitiveDateTime,
    pub cancelled_at: Option<time::PrimitiveDateTime>,
}

/// Data for inserting a new assignment.
#[derive(Debug, Clone)]
pub struct AssignmentInsert {
    pub ticket_id: Uuid,
    pub assignee_name: String,
    pub assignee_phone: CompactString,
    pub assignee_email: Option<String>,
    pub assignee_category: AttendeeCategory,
    pub agent_id: Uuid,
    pub otp_required: bool,
    pub otp_verified: bool,
    pub metadata: serde_json::Value,
}

impl Assignment {
    /// Insert an ACTIVE assignment. The partial unique index makes the
    /// check-then-insert race-free: a concurrent second insert for the
    /// same ticket fails with a unique violation, which the caller maps
    /// to `AlreadyAssigned`.
    pub async fn insert_active_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        insert: &AssignmentInsert,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO assignments
                (id, ticket_id, assignee_name, assignee_phone, assignee_email,
                 assignee_category, agent_id, status, otp_required, otp_verified, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(insert.ticket_id)
        .bind(&insert.assignee_name)
        .bind(insert.assignee_phone.as_str())
        .bind(&insert.assignee_email)
        .bind(insert.assignee_category)
        .bind(insert.agent_id)
        .bind(insert.otp_required)
        .bind(insert.otp_verified)
        .bind(&insert.metadata)
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Compare-and-set cancellation by the creating agent. Returns the
    /// cancelled row, or `None` when the assignment is not active or the
    /// agent does not own it.
    pub async fn cancel_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        assignment_id: Uuid,
        agent_id: Uuid,
    ) -> Result<Option<Assignment>, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(
            r#"
            UPDATE assignments
            SET status = 'cancelled', cancelled_at = NOW()
            WHERE id = $1 AND agent_id = $2 AND status = 'active'
            RETURNING id, ticket_id, assignee_name, assignee_phone, assignee_email,
                      assignee_category, agent_id, status, otp_required, otp_verified,
                      metadata, created_at, cancelled_at
            "#,
        )
        .bind(assignment_id)
        .bind(agent_id)
        .fetch_optional(&mut **tx)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetAssignmentById {
    pub assignment_id: Uuid,
}

impl Processor<GetAssignmentById> for DatabaseProcessor {
    type Output = Option<Assignment>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetAssignmentById")]
    async fn process(&self, query: GetAssignmentById) -> Result<Option<Assignment>, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(
            r#"
            SELECT id, ticket_id, assignee_name, assignee_phone, assignee_email,
                   assignee_category, agent_id, status, otp_required, otp_verified,
                   metadata, created_at, cancelled_at
            FROM assignments
            WHERE id = $1
            "#,
        )
        .bind(query.assignment_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Whether a database error is the unique violation raised by the
/// at-most-one-active-assignment index.
pub fn is_active_assignment_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                && db_err
                    .constraint()
                    .is_some_and(|name| name == ACTIVE_ASSIGNMENT_INDEX)
        }
        _ => false,
    }
}
