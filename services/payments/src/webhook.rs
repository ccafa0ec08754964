//! Gateway webhook signatures and payloads

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::gateway::GatewayPayment;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Event acted upon; every other event is acknowledged and ignored
pub const PAYMENT_CAPTURED: &str = "payment.captured";

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of the raw body under the webhook secret
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison against the expected signature
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let provided = signature.trim().to_ascii_lowercase();
    sign(secret, body)
        .is_some_and(|expected| expected.as_bytes().ct_eq(provided.as_bytes()).into())
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<PaymentEnvelope>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEnvelope {
    pub entity: GatewayPayment,
}

impl WebhookEvent {
    pub fn captured_payment(&self) -> Option<&GatewayPayment> {
        if self.event != PAYMENT_CAPTURED {
            return None;
        }
        self.payload.payment.as_ref().map(|p| &p.entity)
    }
}
