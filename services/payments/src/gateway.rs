//! Payment gateway client
//!
//! [`PaymentGateway`] is the seam the payment flow talks to; [`RazorpayClient`]
//! implements it over the Razorpay REST API. Amounts are in the smallest
//! currency unit (paise for INR).

use async_trait::async_trait;
use common::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { status, .. } if status == 400 || status == 404 => {
                AppError::not_found("Payment not found at the gateway")
            }
            other => {
                error!("{}", other);
                AppError::internal("Payment gateway unavailable")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Payment as reported by the gateway
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    /// Absent when the gateway cannot tie the payment to an order
    #[serde(default)]
    pub order_id: Option<String>,
    /// Billing instrument: card, upi, netbanking, ...
    #[serde(default)]
    pub method: Option<String>,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub notes: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayOrder, GatewayError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}

#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(base_url: &str, key_id: &str, key_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayOrder, GatewayError> {
        info!("Creating gateway order for {} {}", amount, currency);

        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
                "notes": notes,
            }))
            .send()
            .await?;

        Self::read(response).await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        info!("Fetching gateway payment {}", payment_id);

        let response = self
            .http
            .get(format!("{}/payments/{}", self.base_url, payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        Self::read(response).await
    }
}
