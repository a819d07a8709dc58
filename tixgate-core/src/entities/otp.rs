//! One-time passwords for assignment confirmation.
//!
//! Codes are 6 digits, generated per phone number, short-lived, and
//! single use. Consumption is a compare-and-set UPDATE so two concurrent
//! verification attempts with the same code cannot both succeed.

use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use rand::Rng;

/// How long an issued code stays valid.
pub const OTP_TTL_SECONDS: i64 = 5 * 60;

/// Generate a fresh 6-digit code, zero-padded.
pub fn generate_code() -> CompactString {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    compact_str::format_compact!("{n:06}")
}

#[derive(Debug, Clone)]
/// Store a new OTP for a phone number. Previously issued unconsumed codes
/// for the same phone are invalidated so only the latest one verifies.
pub struct IssueOtp {
    pub phone: CompactString,
    pub code: CompactString,
}

impl Processor<IssueOtp> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:IssueOtp")]
    async fn process(&self, cmd: IssueOtp) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE otp_codes SET consumed = TRUE WHERE phone = $1 AND NOT consumed")
            .bind(cmd.phone.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO otp_codes (phone, code, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3::DOUBLE PRECISION))
            "#,
        )
        .bind(cmd.phone.as_str())
        .bind(cmd.code.as_str())
        .bind(OTP_TTL_SECONDS as f64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Verify and consume an OTP in one statement. Returns whether a live,
/// unconsumed code matched.
pub struct ConsumeOtp {
    pub phone: CompactString,
    pub code: CompactString,
}

impl Processor<ConsumeOtp> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ConsumeOtp")]
    async fn process(&self, cmd: ConsumeOtp) -> Result<bool, sqlx::Error> {
        let consumed_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE otp_codes
            SET consumed = TRUE
            WHERE phone = $1 AND code = $2 AND NOT consumed AND expires_at > NOW()
            RETURNING id
            "#,
        )
        .bind(cmd.phone.as_str())
        .bind(cmd.code.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(consumed_id.is_some())
    }
}

/// The live code for a phone, read by the notification sender when it
/// delivers the OTP message.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ActiveOtp {
    pub code: CompactString,
    pub expires_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub struct GetActiveOtp {
    pub phone: CompactString,
}

impl Processor<GetActiveOtp> for DatabaseProcessor {
    type Output = Option<ActiveOtp>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveOtp")]
    async fn process(&self, query: GetActiveOtp) -> Result<Option<ActiveOtp>, sqlx::Error> {
        sqlx::query_as::<_, ActiveOtp>(
            r#"
            SELECT code, expires_at
            FROM otp_codes
            WHERE phone = $1 AND NOT consumed AND expires_at > NOW()
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(query.phone.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Delete expired codes; run periodically by the reconciler sweep.
pub struct PurgeExpiredOtps;

impl Processor<PurgeExpiredOtps> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeExpiredOtps")]
    async fn process(&self, _cmd: PurgeExpiredOtps) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
