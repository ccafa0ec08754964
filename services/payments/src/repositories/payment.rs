//! PostgreSQL payment repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AppResult, models::PaymentStatus};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

use super::PaymentStore;
use crate::models::{
    Customer, NewPaymentHistory, PaymentHistoryEntry, Plan, SubscriptionUpdate, UserPayment,
    UserPaymentHistory,
};

const PAYMENT_COLUMNS: &str = "id, user_id, plan_id, amount, currency, number_of_valid_years, \
     plan_exp_date, user_payment_history_id, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, user_id, plan_id, amount, currency, gateway_order_id, \
     gateway_payment_id, number_of_valid_years, plan_exp_date, billing_instrument, status, \
     coupon_id, offer_id, email, phone_number, created_at";

const PLAN_COLUMNS: &str = "id, name, amount, plan_type, language, created_at";

#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_ledger_and_snapshot(
        tx: &mut Transaction<'_, Postgres>,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> AppResult<(UserPayment, UserPaymentHistory)> {
        let sql = format!(
            r#"
            INSERT INTO user_payment_histories (
                user_id, plan_id, amount, currency, gateway_order_id, gateway_payment_id,
                number_of_valid_years, plan_exp_date, billing_instrument, status,
                coupon_id, offer_id, email, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            HISTORY_COLUMNS
        );

        let history: UserPaymentHistory = sqlx::query_as(&sql)
            .bind(entry.user_id)
            .bind(entry.plan_id)
            .bind(entry.amount)
            .bind(&entry.currency)
            .bind(&entry.gateway_order_id)
            .bind(&entry.gateway_payment_id)
            .bind(entry.number_of_valid_years)
            .bind(entry.plan_exp_date)
            .bind(&entry.billing_instrument)
            .bind(&entry.status)
            .bind(entry.coupon_id)
            .bind(entry.offer_id)
            .bind(&entry.email)
            .bind(&entry.phone_number)
            .fetch_one(&mut **tx)
            .await?;

        let sql = format!(
            r#"
            INSERT INTO user_payments (
                user_id, plan_id, amount, currency, number_of_valid_years, plan_exp_date,
                user_payment_history_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) WHERE deleted_at IS NULL DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                number_of_valid_years = EXCLUDED.number_of_valid_years,
                plan_exp_date = EXCLUDED.plan_exp_date,
                user_payment_history_id = EXCLUDED.user_payment_history_id,
                updated_at = NOW()
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let payment: UserPayment = sqlx::query_as(&sql)
            .bind(snapshot.user_id)
            .bind(snapshot.plan_id)
            .bind(snapshot.amount)
            .bind(&snapshot.currency)
            .bind(snapshot.number_of_valid_years)
            .bind(snapshot.plan_exp_date)
            .bind(history.id)
            .fetch_one(&mut **tx)
            .await?;

        Ok((payment, history))
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn find_customer(&self, user_id: Uuid) -> AppResult<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, phone_number, payment_status
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Customer {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            phone_number: row.get("phone_number"),
            payment_status: PaymentStatus::from_column(row.get::<&str, _>("payment_status")),
        }))
    }

    async fn find_plan(&self, plan_id: Uuid) -> AppResult<Option<Plan>> {
        let sql = format!(
            "SELECT {} FROM plans WHERE id = $1 AND deleted_at IS NULL",
            PLAN_COLUMNS
        );

        let plan = sqlx::query_as(&sql)
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(plan)
    }

    async fn list_plans(&self, language: Option<&str>) -> AppResult<Vec<Plan>> {
        let sql = format!(
            r#"
            SELECT {} FROM plans
            WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR language = $1)
            ORDER BY amount ASC, name ASC
            "#,
            PLAN_COLUMNS
        );

        let plans = sqlx::query_as(&sql)
            .bind(language)
            .fetch_all(&self.pool)
            .await?;

        Ok(plans)
    }

    async fn find_user_payment(&self, user_id: Uuid) -> AppResult<Option<UserPayment>> {
        let sql = format!(
            "SELECT {} FROM user_payments WHERE user_id = $1 AND deleted_at IS NULL",
            PAYMENT_COLUMNS
        );

        let payment = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn latest_history(&self, user_id: Uuid) -> AppResult<Option<UserPaymentHistory>> {
        let sql = format!(
            r#"
            SELECT {} FROM user_payment_histories
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            HISTORY_COLUMNS
        );

        let history = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(history)
    }

    async fn history_contains_payment(&self, gateway_payment_id: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_payment_histories
                WHERE gateway_payment_id = $1 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(gateway_payment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn record_order(
        &self,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> AppResult<(UserPayment, UserPaymentHistory)> {
        let mut tx = self.pool.begin().await?;
        let written = Self::write_ledger_and_snapshot(&mut tx, entry, snapshot).await?;
        tx.commit().await?;

        info!(
            "Recorded order {:?} for user {}",
            entry.gateway_order_id, entry.user_id
        );
        Ok(written)
    }

    async fn record_reconciliation(
        &self,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> AppResult<(UserPayment, UserPaymentHistory)> {
        let mut tx = self.pool.begin().await?;
        let written = Self::write_ledger_and_snapshot(&mut tx, entry, snapshot).await?;

        sqlx::query(
            "UPDATE users SET payment_status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(PaymentStatus::Premium.as_str())
        .bind(entry.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Recorded payment {:?} for user {}",
            entry.gateway_payment_id, entry.user_id
        );
        Ok(written)
    }

    async fn plan_payment_history(&self, user_id: Uuid) -> AppResult<Vec<PaymentHistoryEntry>> {
        let entries = sqlx::query_as(
            r#"
            SELECT h.id, h.user_id, h.plan_id, h.amount, h.currency, h.gateway_order_id,
                   h.gateway_payment_id, h.number_of_valid_years, h.plan_exp_date,
                   h.billing_instrument, h.status, h.coupon_id, h.offer_id, h.email,
                   h.phone_number, h.created_at, p.name AS plan_name
            FROM user_payment_histories h
            LEFT JOIN plans p ON p.id = h.plan_id
            WHERE h.user_id = $1 AND h.deleted_at IS NULL
            ORDER BY h.created_at DESC, h.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn expire_lapsed_plans(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users SET payment_status = $1, updated_at = NOW()
            WHERE payment_status = $2
              AND deleted_at IS NULL
              AND id IN (
                  SELECT user_id FROM user_payments
                  WHERE deleted_at IS NULL AND plan_exp_date < $3
              )
            "#,
        )
        .bind(PaymentStatus::Free.as_str())
        .bind(PaymentStatus::Premium.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
