//! In-memory store, fake gateway and fixed clock for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AppResult,
    jwt::{JwtConfig, JwtService, SigningKeys},
    models::PaymentStatus,
    notification::InMemoryNotificationQueue,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::gateway::{GatewayError, GatewayOrder, GatewayPayment, PaymentGateway};
use crate::models::{
    Customer, NewPaymentHistory, PaymentHistoryEntry, Plan, SubscriptionUpdate, UserPayment,
    UserPaymentHistory,
};
use crate::repositories::PaymentStore;
use crate::service::{Clock, PaymentService};

pub fn jwt_service() -> JwtService {
    JwtService::new(JwtConfig {
        keys: SigningKeys::Secret("test-secret".to_string()),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
    })
    .unwrap()
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
struct Tables {
    customers: Vec<Customer>,
    plans: Vec<Plan>,
    payments: Vec<UserPayment>,
    histories: Vec<UserPaymentHistory>,
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryPaymentStore {
    pub fn add_customer(&self, customer: Customer) {
        self.tables.lock().unwrap().customers.push(customer);
    }

    pub fn add_plan(&self, plan: Plan) {
        self.tables.lock().unwrap().plans.push(plan);
    }

    pub fn histories(&self) -> Vec<UserPaymentHistory> {
        self.tables.lock().unwrap().histories.clone()
    }

    pub fn is_premium(&self, user_id: Uuid) -> bool {
        self.tables
            .lock()
            .unwrap()
            .customers
            .iter()
            .any(|c| c.id == user_id && c.payment_status == PaymentStatus::Premium)
    }

    pub fn set_status(&self, user_id: Uuid, status: PaymentStatus) {
        for customer in &mut self.tables.lock().unwrap().customers {
            if customer.id == user_id {
                customer.payment_status = status;
            }
        }
    }

    pub fn clear_email(&self, user_id: Uuid) {
        for customer in &mut self.tables.lock().unwrap().customers {
            if customer.id == user_id {
                customer.email = None;
            }
        }
    }

    /// A past successful payment leaving the user covered until `plan_exp_date`
    pub fn seed_subscription(
        &self,
        user_id: Uuid,
        plan_id: Option<Uuid>,
        plan_exp_date: DateTime<Utc>,
    ) {
        let entry = NewPaymentHistory {
            user_id,
            plan_id,
            amount: 49900,
            currency: "INR".to_string(),
            gateway_order_id: Some("order_0".to_string()),
            gateway_payment_id: Some("pay_0".to_string()),
            number_of_valid_years: 1,
            plan_exp_date,
            billing_instrument: "card".to_string(),
            status: "captured".to_string(),
            coupon_id: None,
            offer_id: None,
            email: None,
            phone_number: None,
        };
        self.write(&entry, &SubscriptionUpdate::from_ledger(&entry));
    }

    fn write(
        &self,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> (UserPayment, UserPaymentHistory) {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();

        let history = UserPaymentHistory {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            plan_id: entry.plan_id,
            amount: entry.amount,
            currency: entry.currency.clone(),
            gateway_order_id: entry.gateway_order_id.clone(),
            gateway_payment_id: entry.gateway_payment_id.clone(),
            number_of_valid_years: entry.number_of_valid_years,
            plan_exp_date: entry.plan_exp_date,
            billing_instrument: entry.billing_instrument.clone(),
            status: entry.status.clone(),
            coupon_id: entry.coupon_id,
            offer_id: entry.offer_id,
            email: entry.email.clone(),
            phone_number: entry.phone_number.clone(),
            created_at: now,
        };
        tables.histories.push(history.clone());

        let existing = tables
            .payments
            .iter()
            .position(|p| p.user_id == snapshot.user_id);
        let payment = UserPayment {
            id: existing
                .map(|i| tables.payments[i].id)
                .unwrap_or_else(Uuid::new_v4),
            user_id: snapshot.user_id,
            plan_id: snapshot.plan_id,
            amount: snapshot.amount,
            currency: snapshot.currency.clone(),
            number_of_valid_years: snapshot.number_of_valid_years,
            plan_exp_date: snapshot.plan_exp_date,
            user_payment_history_id: Some(history.id),
            created_at: existing
                .map(|i| tables.payments[i].created_at)
                .unwrap_or(now),
            updated_at: now,
        };
        match existing {
            Some(i) => tables.payments[i] = payment.clone(),
            None => tables.payments.push(payment.clone()),
        }

        (payment, history)
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_customer(&self, user_id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .customers
            .iter()
            .find(|c| c.id == user_id)
            .cloned())
    }

    async fn find_plan(&self, plan_id: Uuid) -> AppResult<Option<Plan>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned())
    }

    async fn list_plans(&self, language: Option<&str>) -> AppResult<Vec<Plan>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .plans
            .iter()
            .filter(|p| language.is_none_or(|l| p.language == l))
            .cloned()
            .collect())
    }

    async fn find_user_payment(&self, user_id: Uuid) -> AppResult<Option<UserPayment>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn latest_history(&self, user_id: Uuid) -> AppResult<Option<UserPaymentHistory>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .histories
            .iter()
            .rev()
            .find(|h| h.user_id == user_id)
            .cloned())
    }

    async fn history_contains_payment(&self, gateway_payment_id: &str) -> AppResult<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .histories
            .iter()
            .any(|h| h.gateway_payment_id.as_deref() == Some(gateway_payment_id)))
    }

    async fn record_order(
        &self,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> AppResult<(UserPayment, UserPaymentHistory)> {
        Ok(self.write(entry, snapshot))
    }

    async fn record_reconciliation(
        &self,
        entry: &NewPaymentHistory,
        snapshot: &SubscriptionUpdate,
    ) -> AppResult<(UserPayment, UserPaymentHistory)> {
        let written = self.write(entry, snapshot);
        self.set_status(entry.user_id, PaymentStatus::Premium);
        Ok(written)
    }

    async fn plan_payment_history(&self, user_id: Uuid) -> AppResult<Vec<PaymentHistoryEntry>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .histories
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id)
            .map(|h| PaymentHistoryEntry {
                history: h.clone(),
                plan_name: tables
                    .plans
                    .iter()
                    .find(|p| Some(p.id) == h.plan_id)
                    .map(|p| p.name.clone()),
            })
            .collect())
    }

    async fn expire_lapsed_plans(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut tables = self.tables.lock().unwrap();
        let lapsed: Vec<Uuid> = tables
            .payments
            .iter()
            .filter(|p| p.plan_exp_date < now)
            .map(|p| p.user_id)
            .collect();

        let mut changed = 0;
        for customer in &mut tables.customers {
            if customer.payment_status == PaymentStatus::Premium && lapsed.contains(&customer.id) {
                customer.payment_status = PaymentStatus::Free;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Gateway that opens every order and reports every payment as captured
#[derive(Clone)]
pub struct FakeGateway {
    order_id: Arc<Mutex<Option<String>>>,
    owner: Arc<Mutex<Option<Uuid>>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            order_id: Arc::new(Mutex::new(Some("order_1".to_string()))),
            owner: Arc::default(),
        }
    }
}

impl FakeGateway {
    /// Order id reported on fetched payments
    pub fn set_order_id(&self, order_id: Option<&str>) {
        *self.order_id.lock().unwrap() = order_id.map(str::to_string);
    }

    /// User id reported in the notes of fetched payments
    pub fn set_owner(&self, owner: Option<Uuid>) {
        *self.owner.lock().unwrap() = owner;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        _notes: Value,
    ) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            id: "order_1".to_string(),
            amount,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        Ok(GatewayPayment {
            id: payment_id.to_string(),
            order_id: self.order_id.lock().unwrap().clone(),
            method: Some("upi".to_string()),
            status: "captured".to_string(),
            amount: 49900,
            currency: "INR".to_string(),
            notes: match *self.owner.lock().unwrap() {
                Some(owner) => json!({"user_id": owner.to_string()}),
                None => Value::Null,
            },
        })
    }
}

pub struct Harness {
    pub service: PaymentService,
    pub store: InMemoryPaymentStore,
    pub gateway: FakeGateway,
    pub notifications: InMemoryNotificationQueue,
    pub customer: Customer,
    pub plan: Plan,
}

pub fn harness(now: DateTime<Utc>) -> Harness {
    build(now, InMemoryNotificationQueue::new())
}

pub fn harness_with_failing_queue(now: DateTime<Utc>) -> Harness {
    build(now, InMemoryNotificationQueue::failing())
}

fn build(now: DateTime<Utc>, notifications: InMemoryNotificationQueue) -> Harness {
    let store = InMemoryPaymentStore::default();
    let gateway = FakeGateway::default();

    let customer = Customer {
        id: Uuid::new_v4(),
        name: "Asha".to_string(),
        email: Some("asha@farm.in".to_string()),
        phone_number: Some("9876543210".to_string()),
        payment_status: PaymentStatus::Free,
    };
    let plan = Plan {
        id: Uuid::new_v4(),
        name: "Gold".to_string(),
        amount: 49900,
        plan_type: "yearly".to_string(),
        language: "en".to_string(),
        created_at: now,
    };
    store.add_customer(customer.clone());
    store.add_plan(plan.clone());
    gateway.set_owner(Some(customer.id));

    let service = PaymentService::new(
        Arc::new(store.clone()),
        Arc::new(gateway.clone()),
        Arc::new(notifications.clone()),
        Arc::new(FixedClock(now)),
        "admin@farm.in".to_string(),
    );

    Harness {
        service,
        store,
        gateway,
        notifications,
        customer,
        plan,
    }
}
