use crate::entities::AttendeeCategory;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Per-session, per-category unit price.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionPrice {
    pub id: Uuid,
    pub session_id: Uuid,
    pub category: AttendeeCategory,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct GetSessionPriceById {
    pub price_id: Uuid,
}

impl Processor<GetSessionPriceById> for DatabaseProcessor {
    type Output = Option<SessionPrice>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetSessionPriceById")]
    async fn process(&self, query: GetSessionPriceById) -> Result<Option<SessionPrice>, sqlx::Error> {
        sqlx::query_as::<_, SessionPrice>(
            r#"
            SELECT id, session_id, category, unit_price
            FROM session_prices
            WHERE id = $1
            "#,
        )
        .bind(query.price_id)
        .fetch_optional(&self.pool)
        .await
    }
}
