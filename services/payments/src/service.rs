//! Plan purchase and payment reconciliation
//!
//! An order is opened with the gateway first; the client pays against it and
//! then asks for reconciliation, which confirms the payment with the gateway,
//! extends the subscription by one year and records the outcome.

use chrono::{DateTime, Utc};
use common::{
    AppError, AppResult,
    notification::{Notification, NotificationQueue, dispatch},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::expiry::next_expiry;
use crate::gateway::{GatewayPayment, PaymentGateway};
use crate::models::{
    Customer, NewPaymentHistory, PaymentHistoryEntry, Plan, SubscriptionUpdate, UserPayment,
    payment::ORDER_CREATED,
};
use crate::repositories::PaymentStore;
use crate::webhook::WebhookEvent;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_valid_years() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub plan_id: Uuid,
    /// Smallest currency unit
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_valid_years")]
    pub number_of_valid_years: i32,
    /// Defaults to the user's current expiry
    pub plan_exp_date: Option<DateTime<Utc>>,
    pub billing_instrument: Option<String>,
    pub coupon_id: Option<Uuid>,
    pub offer_id: Option<Uuid>,
}

/// What the client needs to complete payment with the gateway
#[derive(Debug, Clone, Serialize)]
pub struct OrderDescriptor {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub payment: UserPayment,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetails {
    pub payment: UserPayment,
    pub exp_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Reconciled,
    /// The payment is already in the ledger
    AlreadyRecorded,
    Ignored,
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifications: Arc<dyn NotificationQueue>,
    clock: Arc<dyn Clock>,
    admin_email: String,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifications: Arc<dyn NotificationQueue>,
        clock: Arc<dyn Clock>,
        admin_email: String,
    ) -> Self {
        Self {
            store,
            gateway,
            notifications,
            clock,
            admin_email,
        }
    }

    /// Open a gateway order and record it against the user's subscription
    pub async fn create_user_payment(
        &self,
        user_id: Uuid,
        request: &CreatePaymentRequest,
    ) -> AppResult<OrderDescriptor> {
        info!(
            "Creating payment order for user {} and plan {}",
            user_id, request.plan_id
        );

        let customer = self.customer(user_id).await?;
        self.store
            .find_plan(request.plan_id)
            .await?
            .ok_or_else(|| AppError::not_found("Plan not found"))?;

        let order = self
            .gateway
            .create_order(
                request.amount,
                &request.currency,
                &receipt_for(user_id),
                json!({
                    "user_id": user_id.to_string(),
                    "plan_id": request.plan_id.to_string(),
                }),
            )
            .await?;

        let plan_exp_date = match request.plan_exp_date {
            Some(date) => date,
            None => self
                .store
                .latest_history(user_id)
                .await?
                .map(|latest| latest.plan_exp_date)
                .unwrap_or_else(|| self.clock.now()),
        };

        let entry = NewPaymentHistory {
            user_id,
            plan_id: Some(request.plan_id),
            amount: order.amount,
            currency: order.currency.clone(),
            gateway_order_id: Some(order.id.clone()),
            gateway_payment_id: None,
            number_of_valid_years: request.number_of_valid_years,
            plan_exp_date,
            billing_instrument: request
                .billing_instrument
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            status: ORDER_CREATED.to_string(),
            coupon_id: request.coupon_id,
            offer_id: request.offer_id,
            email: customer.email.clone(),
            phone_number: customer.phone_number.clone(),
        };

        let (payment, _) = self
            .store
            .record_order(&entry, &SubscriptionUpdate::from_ledger(&entry))
            .await?;
        info!("Opened order {} for user {}", order.id, user_id);

        Ok(OrderDescriptor {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            payment,
        })
    }

    /// Confirm a completed payment and extend the subscription by a year
    pub async fn get_user_payment_details(
        &self,
        user_id: Uuid,
        payment_id: &str,
    ) -> AppResult<PaymentDetails> {
        info!("Reconciling payment {} for user {}", payment_id, user_id);

        let customer = self.customer(user_id).await?;

        let gateway_payment = self.gateway.fetch_payment(payment_id).await?;
        if gateway_payment.order_id.is_none() {
            return Err(AppError::validation(
                "Payment is not linked to an order at the gateway",
            ));
        }
        if payment_owner(&gateway_payment) != Some(user_id) {
            warn!(
                "User {} tried to reconcile payment {} opened for another user",
                user_id, payment_id
            );
            return Err(AppError::forbidden("Payment belongs to another user"));
        }
        if self
            .store
            .history_contains_payment(&gateway_payment.id)
            .await?
        {
            return Err(AppError::conflict("Payment has already been applied"));
        }

        let current = self
            .store
            .find_user_payment(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment not found"))?;

        let plan = match current.plan_id {
            Some(plan_id) => self.store.find_plan(plan_id).await?,
            None => None,
        };

        let latest = self.store.latest_history(user_id).await?;
        let exp_date = next_expiry(latest.map(|h| h.plan_exp_date), self.clock.now())
            .ok_or_else(|| AppError::internal("Computed plan expiry is not a valid date"))?;

        let entry = NewPaymentHistory {
            user_id,
            plan_id: current.plan_id,
            amount: gateway_payment.amount,
            currency: gateway_payment.currency.clone(),
            gateway_order_id: gateway_payment.order_id.clone(),
            gateway_payment_id: Some(gateway_payment.id.clone()),
            number_of_valid_years: 1,
            plan_exp_date: exp_date,
            billing_instrument: gateway_payment
                .method
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            status: gateway_payment.status.clone(),
            coupon_id: None,
            offer_id: None,
            email: customer.email.clone(),
            phone_number: customer.phone_number.clone(),
        };

        let (payment, _) = self
            .store
            .record_reconciliation(&entry, &SubscriptionUpdate::from_ledger(&entry))
            .await?;
        info!(
            "User {} is premium until {}",
            user_id,
            exp_date.format("%Y-%m-%d")
        );

        self.notify(&customer, plan.as_ref(), &gateway_payment, exp_date);

        let missing = customer.missing_contact_details();
        if !missing.is_empty() {
            warn!(
                "Payment {} for user {} was recorded but contact details are incomplete",
                payment_id, user_id
            );
            return Err(AppError::Validation(
                missing
                    .into_iter()
                    .map(|field| format!("{} is required", field))
                    .collect(),
            ));
        }

        Ok(PaymentDetails { payment, exp_date })
    }

    /// Reconcile a captured payment pushed by the gateway
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> AppResult<WebhookOutcome> {
        let Some(payment) = event.captured_payment() else {
            info!("Ignoring {} webhook", event.event);
            return Ok(WebhookOutcome::Ignored);
        };

        let user_id = payment_owner(payment)
            .ok_or_else(|| AppError::validation("Payment notes carry no valid user_id"))?;

        if self.store.history_contains_payment(&payment.id).await? {
            info!("Payment {} already recorded", payment.id);
            return Ok(WebhookOutcome::AlreadyRecorded);
        }

        self.get_user_payment_details(user_id, &payment.id).await?;
        Ok(WebhookOutcome::Reconciled)
    }

    pub async fn get_plan_payment_history(
        &self,
        user_id: Uuid,
    ) -> AppResult<Vec<PaymentHistoryEntry>> {
        self.store.plan_payment_history(user_id).await
    }

    pub async fn list_plans(&self, language: Option<&str>) -> AppResult<Vec<Plan>> {
        self.store.list_plans(language).await
    }

    async fn customer(&self, user_id: Uuid) -> AppResult<Customer> {
        self.store
            .find_customer(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    fn notify(
        &self,
        customer: &Customer,
        plan: Option<&Plan>,
        payment: &GatewayPayment,
        exp_date: DateTime<Utc>,
    ) {
        let plan_name = plan.map(|p| p.name.clone());

        if let Some(to) = customer.email.clone().or_else(|| customer.phone_number.clone()) {
            dispatch(
                self.notifications.clone(),
                Notification {
                    to,
                    subject: "Payment received".to_string(),
                    template: "payment_receipt".to_string(),
                    data: json!({
                        "name": customer.name,
                        "plan": plan_name,
                        "amount": payment.amount,
                        "currency": payment.currency,
                        "payment_id": payment.id,
                        "exp_date": exp_date,
                    }),
                },
            );
        }

        dispatch(
            self.notifications.clone(),
            Notification {
                to: self.admin_email.clone(),
                subject: "New subscription payment".to_string(),
                template: "admin_payment_summary".to_string(),
                data: json!({
                    "user_id": customer.id,
                    "name": customer.name,
                    "email": customer.email,
                    "phone_number": customer.phone_number,
                    "plan": plan_name,
                    "amount": payment.amount,
                    "currency": payment.currency,
                    "payment_id": payment.id,
                }),
            },
        );
    }
}

/// User the order was opened for, as carried in the payment notes
fn payment_owner(payment: &GatewayPayment) -> Option<Uuid> {
    payment.notes["user_id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn receipt_for(user_id: Uuid) -> String {
    let id = user_id.simple().to_string();
    format!("rcpt_{}", &id[..12])
}
