//! User repository for database operations

use async_trait::async_trait;
use common::{AppError, AppResult, models::PaymentStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::UserStore;
use crate::models::{AuthProvider, NewUser, User};

const USER_COLUMNS: &str = "id, name, phone_number, email, password_hash, payment_status, \
     providers, google_id, facebook_id, otp_status, created_at, updated_at";

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} = $1 AND deleted_at IS NULL",
            USER_COLUMNS, filter
        );

        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

fn user_from_row(row: &PgRow) -> User {
    let providers: Vec<String> = row.get("providers");

    User {
        id: row.get("id"),
        name: row.get("name"),
        phone_number: row.get("phone_number"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        payment_status: PaymentStatus::from_column(row.get::<&str, _>("payment_status")),
        providers: providers
            .iter()
            .filter_map(|p| AuthProvider::parse(p))
            .collect(),
        google_id: row.get("google_id"),
        facebook_id: row.get("facebook_id"),
        otp_status: row.get("otp_status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn provider_column(provider: AuthProvider) -> Option<&'static str> {
    match provider {
        AuthProvider::Local => None,
        AuthProvider::Google => Some("google_id"),
        AuthProvider::Facebook => Some("facebook_id"),
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_phone(&self, phone_number: &str) -> AppResult<Option<User>> {
        self.find_one("phone_number", phone_number).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_provider_id(
        &self,
        provider: AuthProvider,
        external_id: &str,
    ) -> AppResult<Option<User>> {
        match provider_column(provider) {
            Some(column) => self.find_one(column, external_id).await,
            None => Ok(None),
        }
    }

    async fn create(&self, new_user: &NewUser) -> AppResult<User> {
        info!("Creating new user: {}", new_user.name);

        let providers: Vec<&str> = new_user.providers.iter().map(|p| p.as_str()).collect();
        let sql = format!(
            r#"
            INSERT INTO users (name, phone_number, email, password_hash, providers,
                               google_id, facebook_id, otp_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(&new_user.name)
            .bind(&new_user.phone_number)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&providers)
            .bind(&new_user.google_id)
            .bind(&new_user.facebook_id)
            .bind(new_user.otp_status)
            .fetch_one(&self.pool)
            .await?;

        Ok(user_from_row(&row))
    }

    async fn mark_verified(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET otp_status = TRUE, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User not found"));
        }

        Ok(())
    }

    async fn link_provider(
        &self,
        id: Uuid,
        provider: AuthProvider,
        external_id: &str,
    ) -> AppResult<User> {
        let column = provider_column(provider)
            .ok_or_else(|| AppError::validation("local is not an external provider"))?;

        info!("Linking {} identity to user: {}", provider.as_str(), id);

        let sql = format!(
            r#"
            UPDATE users SET
                {column} = $2,
                providers = CASE WHEN $3 = ANY(providers) THEN providers
                                 ELSE array_append(providers, $3) END,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {columns}
            "#,
            column = column,
            columns = USER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(external_id)
            .bind(provider.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(user_from_row(&row))
    }
}
