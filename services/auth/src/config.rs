//! Service settings read from `AUTH__*` environment variables
//!
//! `AUTH__BIND_ADDRESS`, `AUTH__EXPOSE_OTP` and, per provider,
//! `AUTH__GOOGLE__CLIENT_ID` / `__CLIENT_SECRET` / `__REDIRECT_URL` (same for
//! `AUTH__FACEBOOK__*`). A provider without credentials is simply not offered.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OAuthProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthSettings {
    pub bind_address: String,
    /// Echo issued OTP codes in responses; for local development only
    pub expose_otp: bool,
    pub google: Option<OAuthProviderSettings>,
    pub facebook: Option<OAuthProviderSettings>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            expose_otp: false,
            google: None,
            facebook: None,
        }
    }
}

impl AuthSettings {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("expose_otp", false)?
            .add_source(
                config::Environment::with_prefix("AUTH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
