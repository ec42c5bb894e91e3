use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One-time code row. Single-use: deleted on successful verification,
/// expired rows are swept in the background.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OtpCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub otp: String,
    pub otp_expiry: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl OtpCode {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.otp_expiry <= now
    }

    /// A supplied code is accepted only when it matches this row and the
    /// row has not expired.
    pub fn accepts(&self, supplied: &str, now: OffsetDateTime) -> bool {
        self.otp == supplied && !self.is_expired(now)
    }

    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        otp: &str,
        otp_expiry: OffsetDateTime,
    ) -> Result<OtpCode, sqlx::Error> {
        sqlx::query_as::<_, OtpCode>(
            r#"
            INSERT INTO otp_codes (user_id, otp, otp_expiry)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, otp, otp_expiry, created_at
            "#,
        )
        .bind(user_id)
        .bind(otp)
        .bind(otp_expiry)
        .fetch_one(db)
        .await
    }

    /// Newest outstanding code for a user. Older rows are ignored by
    /// verification even if still valid.
    pub async fn latest_for_user(
        db: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<OtpCode>, sqlx::Error> {
        sqlx::query_as::<_, OtpCode>(
            r#"
            SELECT id, user_id, otp, otp_expiry, created_at
            FROM otp_codes
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM otp_codes WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete_expired(db: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE otp_expiry <= now()")
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn row(expiry: OffsetDateTime) -> OtpCode {
        OtpCode {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            otp: "482913".into(),
            otp_expiry: expiry,
            created_at: expiry - Duration::minutes(10),
        }
    }

    #[test]
    fn fresh_code_is_not_expired() {
        let now = OffsetDateTime::now_utc();
        assert!(!row(now + Duration::minutes(10)).is_expired(now));
    }

    #[test]
    fn past_expiry_is_expired() {
        let now = OffsetDateTime::now_utc();
        assert!(row(now - Duration::seconds(1)).is_expired(now));
        assert!(row(now).is_expired(now));
    }

    #[test]
    fn matching_code_within_ttl_is_accepted() {
        let now = OffsetDateTime::now_utc();
        assert!(row(now + Duration::minutes(5)).accepts("482913", now));
    }

    #[test]
    fn expired_code_is_rejected_even_when_it_matches() {
        let now = OffsetDateTime::now_utc();
        assert!(!row(now - Duration::seconds(1)).accepts("482913", now));
    }

    #[test]
    fn wrong_code_is_rejected() {
        let now = OffsetDateTime::now_utc();
        assert!(!row(now + Duration::minutes(5)).accepts("000000", now));
    }
}
