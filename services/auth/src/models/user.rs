//! User model and related functionality

use chrono::{DateTime, Utc};
use common::models::PaymentStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ways an account can sign in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
    Facebook,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::Google => "google",
            AuthProvider::Facebook => "facebook",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(AuthProvider::Local),
            "google" => Some(AuthProvider::Google),
            "facebook" => Some(AuthProvider::Facebook),
            _ => None,
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Login identifier for local accounts; absent on OAuth-only accounts
    pub phone_number: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub payment_status: PaymentStatus,
    pub providers: Vec<AuthProvider>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    /// Set once the phone number has been proven with an OTP
    pub otp_status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn external_id(&self, provider: AuthProvider) -> Option<&str> {
        match provider {
            AuthProvider::Local => None,
            AuthProvider::Google => self.google_id.as_deref(),
            AuthProvider::Facebook => self.facebook_id.as_deref(),
        }
    }
}

/// New user creation payload; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub providers: Vec<AuthProvider>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub otp_status: bool,
}

impl NewUser {
    /// Phone-and-password account awaiting OTP verification
    pub fn local(name: &str, phone_number: &str, password_hash: String) -> Self {
        Self {
            name: name.trim().to_string(),
            phone_number: Some(phone_number.to_string()),
            email: None,
            password_hash: Some(password_hash),
            providers: vec![AuthProvider::Local],
            google_id: None,
            facebook_id: None,
            otp_status: false,
        }
    }

    /// Account created from a provider profile, active from the start
    pub fn external(
        provider: AuthProvider,
        external_id: &str,
        name: &str,
        email: Option<String>,
    ) -> Self {
        let (google_id, facebook_id) = match provider {
            AuthProvider::Google => (Some(external_id.to_string()), None),
            AuthProvider::Facebook => (None, Some(external_id.to_string())),
            AuthProvider::Local => (None, None),
        };

        Self {
            name: name.to_string(),
            phone_number: None,
            email,
            password_hash: None,
            providers: vec![provider],
            google_id,
            facebook_id,
            otp_status: true,
        }
    }
}
