//! Service settings read from `PAYMENTS__*` environment variables
//!
//! Gateway credentials are required: `PAYMENTS__GATEWAY__KEY_ID` and
//! `PAYMENTS__GATEWAY__KEY_SECRET`. Setting `PAYMENTS__GATEWAY__WEBHOOK_SECRET`
//! turns on HMAC verification of webhook bodies.

use serde::Deserialize;

use crate::jobs::DEFAULT_SCHEDULE;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewaySettings {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: Option<String>,
}

impl GatewaySettings {
    /// Secret for webhook HMAC checks; a blank value counts as unset
    pub fn signing_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PaymentSettings {
    pub bind_address: String,
    /// Recipient of the per-payment admin summary
    pub admin_email: String,
    /// Six-field cron expression for the plan expiry sweep
    pub expiry_schedule: String,
    pub gateway: GatewaySettings,
}

impl PaymentSettings {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("admin_email", "admin@dairyfarm.local")?
            .set_default("expiry_schedule", DEFAULT_SCHEDULE)?
            .set_default("gateway.base_url", "https://api.razorpay.com/v1")?
            .add_source(
                config::Environment::with_prefix("PAYMENTS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
