use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// An event day: a calendar date on which one or more sessions run.
///
/// Admin-created and rarely mutated; never deleted while tickets
/// reference it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EventDay {
    pub id: Uuid,
    pub name: String,
    pub held_on: time::Date,
    pub is_active: bool,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub struct GetEventDayById {
    pub day_id: Uuid,
}

impl Processor<GetEventDayById> for DatabaseProcessor {
    type Output = Option<EventDay>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventDayById")]
    async fn process(&self, query: GetEventDayById) -> Result<Option<EventDay>, sqlx::Error> {
        sqlx::query_as::<_, EventDay>(
            r#"
            SELECT id, name, held_on, is_active, created_at
            FROM event_days
            WHERE id = $1
            "#,
        )
        .bind(query.day_id)
        .fetch_optional(&self.pool)
        .await
    }
}
