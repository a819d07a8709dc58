use crate::entities::PaymentMethodKind;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// A configured way to pay: cash at the counter or a digital provider
/// behind the gateway adapter.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    pub kind: PaymentMethodKind,
    pub provider: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct GetPaymentMethodById {
    pub method_id: Uuid,
}

impl Processor<GetPaymentMethodById> for DatabaseProcessor {
    type Output = Option<PaymentMethod>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPaymentMethodById")]
    async fn process(&self, query: GetPaymentMethodById) -> Result<Option<PaymentMethod>, sqlx::Error> {
        sqlx::query_as::<_, PaymentMethod>(
            r#"
            SELECT id, name, kind, provider, is_active
            FROM payment_methods
            WHERE id = $1
            "#,
        )
        .bind(query.method_id)
        .fetch_optional(&self.pool)
        .await
    }
}
