//! OTP repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AppResult;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::OtpStore;
use crate::models::Otp;

#[derive(Clone)]
pub struct OtpRepository {
    pool: PgPool,
}

impl OtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for OtpRepository {
    async fn upsert(
        &self,
        user_id: Uuid,
        code: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<Otp> {
        info!("Issuing OTP for user: {}", user_id);

        let otp = sqlx::query_as::<_, Otp>(
            r#"
            INSERT INTO otps (user_id, code, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                code = EXCLUDED.code,
                created_at = EXCLUDED.created_at
            RETURNING id, user_id, code, created_at
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(otp)
    }

    async fn find(&self, user_id: Uuid, code: &str) -> AppResult<Option<Otp>> {
        let otp = sqlx::query_as::<_, Otp>(
            r#"
            SELECT id, user_id, code, created_at
            FROM otps
            WHERE user_id = $1 AND code = $2
            "#,
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(otp)
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM otps WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
