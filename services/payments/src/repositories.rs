//! Persistence for plans, subscriptions and the payment ledger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AppResult;
use uuid::Uuid;

use crate::models::{
    Customer, NewPaymentHistory, PaymentHistoryEntry, Plan, SubscriptionUpdate, UserPayment,
    UserPaymentHistory,
};

pub mod payment;

pub use payment::PaymentRepository;

/// Reads skip soft-deleted rows
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_customer(&self, user_id: Uuid) -> AppResult<Option<Customer>>;

    async fn find_plan(&self, plan_id: Uuid) -> AppResult<Option<Plan>>;

    async fn list_plans(&self, language: Option<&str>) -> AppResult<Vec<Plan>>;

    async fn find_user_payment(&self, user_id: Uuid) -> AppResult<Option<UserPayment>>;

    /// Most recently created ledger row for the user, whatever its status
    async fn latest_history(&self, user_id: Uuid) -> AppResult<Option<UserPaymentHistory>>;

    async fn history_contains_payment(&self, gateway_payment_id: &str) -> AppResult<bool>;

    /// Append the order-time ledger row and point the snapshot at it, atomically
    async fn record_order(
        &self,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> AppResult<(UserPayment, UserPaymentHistory)>;

    /// Append the ledger row, upsert the snapshot and mark the user premium,
    /// atomically
    async fn record_reconciliation(
        &self,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> AppResult<(UserPayment, UserPaymentHistory)>;

    /// Ledger rows joined with plan names, newest first
    async fn plan_payment_history(&self, user_id: Uuid) -> AppResult<Vec<PaymentHistoryEntry>>;

    /// Return premium users whose current plan lapsed before `now` to free;
    /// yields the number of users changed
    async fn expire_lapsed_plans(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
