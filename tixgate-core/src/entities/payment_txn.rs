use crate::entities::TransactionStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

/// A payment transaction as tracked against the gateway.
///
/// `external_id` is the identifier we hand to the gateway at checkout and
/// the key the settlement callback matches on. `ticket_id` is nullable in
/// the schema for provider payloads that arrive before matching, but
/// transactions created by the purchase pipeline always carry it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub external_id: String,
    pub provider_txn_id: Option<String>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// Data for inserting a new payment transaction.
#[derive(Debug, Clone)]
pub struct PaymentTransactionInsert {
    pub ticket_id: Uuid,
    pub external_id: String,
    pub provider_txn_id: Option<String>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub raw_payload: Option<serde_json::Value>,
}

impl PaymentTransaction {
    /// Insert a transaction row. Works inside or outside the purchase
    /// transaction; returns the new id.
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        insert: &PaymentTransactionInsert,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (id, ticket_id, external_id, provider_txn_id, amount, status, raw_payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(insert.ticket_id)
        .bind(&insert.external_id)
        .bind(&insert.provider_txn_id)
        .bind(insert.amount)
        .bind(insert.status)
        .bind(&insert.raw_payload)
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Settlement update: move a transaction out of `Pending`, recording
    /// the provider's transaction id and raw payload. Compare-and-set on
    /// the pending state so a duplicate callback is a no-op.
    pub async fn settle_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        external_id: &str,
        new_status: TransactionStatus,
        provider_txn_id: Option<&str>,
        raw_payload: Option<&serde_json::Value>,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        sqlx::query_as::<_, PaymentTransaction>(
            r#"
            UPDATE payment_transactions
            SET status = $2,
                provider_txn_id = COALESCE($3, provider_txn_id),
                raw_payload = COALESCE($4, raw_payload),
                updated_at = NOW()
            WHERE external_id = $1 AND status = 'pending'
            RETURNING id, ticket_id, external_id, provider_txn_id, amount, status,
                      raw_payload, created_at, updated_at
            "#,
        )
        .bind(external_id)
        .bind(new_status)
        .bind(provider_txn_id)
        .bind(raw_payload)
        .fetch_optional(&mut **tx)
        .await
    }
}

#[derive(Debug, Clone)]
/// Pending transactions older than `min_age_seconds`, for the settlement
/// watcher's gateway polling sweep.
pub struct GetPendingTransactions {
    pub min_age_seconds: i64,
    pub limit: i64,
}

impl Processor<GetPendingTransactions> for DatabaseProcessor {
    type Output = Vec<PaymentTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPendingTransactions")]
    async fn process(
        &self,
        query: GetPendingTransactions,
    ) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
        sqlx::query_as::<_, PaymentTransaction>(
            r#"
            SELECT id, ticket_id, external_id, provider_txn_id, amount, status,
                   raw_payload, created_at, updated_at
            FROM payment_transactions
            WHERE status = 'pending'
              AND created_at < NOW() - make_interval(secs => $1::DOUBLE PRECISION)
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(query.min_age_seconds as f64)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}
