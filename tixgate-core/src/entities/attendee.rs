use crate::entities::AttendeeCategory;
use uuid::Uuid;

/// One row per purchased unit. The ticket-level `Used` flag is
/// authoritative for admission; these rows exist for per-seat audit and
/// are stamped together with the ticket at verification time.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Attendee {
    pub id: i64,
    pub ticket_id: Uuid,
    pub category: AttendeeCategory,
    pub is_used: bool,
    pub scanned_at: Option<time::PrimitiveDateTime>,
}

impl Attendee {
    /// Insert `quantity` attendee rows for a ticket in a single query,
    /// inside the purchase transaction.
    pub async fn insert_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: Uuid,
        category: AttendeeCategory,
        quantity: i32,
    ) -> Result<u64, sqlx::Error> {
        if quantity <= 0 {
            return Ok(0);
        }

        let mut query_builder =
            sqlx::QueryBuilder::new("INSERT INTO attendees (ticket_id, category) ");

        query_builder.push_values(0..quantity, |mut b, _| {
            b.push_bind(ticket_id).push_bind(category);
        });

        let result = query_builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// Stamp every attendee row of a ticket as used, in the same
    /// transaction as the ticket's own `Used` transition.
    pub async fn mark_all_used_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: Uuid,
        scanned_at: time::PrimitiveDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE attendees
            SET is_used = TRUE, scanned_at = $2
            WHERE ticket_id = $1 AND NOT is_used
            "#,
        )
        .bind(ticket_id)
        .bind(scanned_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}
