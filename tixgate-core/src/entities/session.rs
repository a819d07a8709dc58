use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// A bookable time slot within an event day, with its own capacity
/// (tracked separately in `session_inventory`).
///
/// Invariant: belongs to exactly one day. `is_active` is cleared by the
/// purchase pipeline once the session sells out.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub day_id: Uuid,
    pub name: String,
    pub starts_at: time::Time,
    pub ends_at: time::Time,
    pub is_active: bool,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub struct GetSessionById {
    pub session_id: Uuid,
}

impl Processor<GetSessionById> for DatabaseProcessor {
    type Output = Option<Session>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSessionById")]
    async fn process(&self, query: GetSessionById) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, day_id, name, starts_at, ends_at, is_active, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(query.session_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// List all session ids, used by the reconciler sweep.
pub struct ListSessionIds;

impl Processor<ListSessionIds> for DatabaseProcessor {
    type Output = Vec<Uuid>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListSessionIds")]
    async fn process(&self, _query: ListSessionIds) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM sessions ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
    }
}
