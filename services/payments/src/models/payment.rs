use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Ledger status of the row written when an order is opened
pub const ORDER_CREATED: &str = "created";

/// Current subscription snapshot, one live row per user
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserPayment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub number_of_valid_years: i32,
    pub plan_exp_date: DateTime<Utc>,
    /// Ledger row that produced this snapshot
    pub user_payment_history_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One append-only ledger row
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserPaymentHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub number_of_valid_years: i32,
    pub plan_exp_date: DateTime<Utc>,
    pub billing_instrument: String,
    pub status: String,
    pub coupon_id: Option<Uuid>,
    pub offer_id: Option<Uuid>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row joined with the name of its plan
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PaymentHistoryEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub history: UserPaymentHistory,
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentHistory {
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub number_of_valid_years: i32,
    pub plan_exp_date: DateTime<Utc>,
    pub billing_instrument: String,
    pub status: String,
    pub coupon_id: Option<Uuid>,
    pub offer_id: Option<Uuid>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Values written over the user's snapshot row
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpdate {
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub number_of_valid_years: i32,
    pub plan_exp_date: DateTime<Utc>,
}

impl SubscriptionUpdate {
    /// Snapshot mirroring a ledger row
    pub fn from_ledger(entry: &NewPaymentHistory) -> Self {
        Self {
            user_id: entry.user_id,
            plan_id: entry.plan_id,
            amount: entry.amount,
            currency: entry.currency.clone(),
            number_of_valid_years: entry.number_of_valid_years,
            plan_exp_date: entry.plan_exp_date,
        }
    }
}
