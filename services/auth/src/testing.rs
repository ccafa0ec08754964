//! In-memory stores and fake OAuth providers for unit tests

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{
    AppError, AppResult,
    jwt::{JwtConfig, JwtService, SigningKeys},
    models::PaymentStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::{AuthProvider, NewUser, Otp, User};
use crate::oauth::{
    AuthorizationRequest, AuthorizationStates, OAuthStrategy, OAuthUserProfile,
    PendingAuthorization,
};
use crate::repositories::{OtpStore, UserStore};
use crate::service::AuthService;
use crate::session::SessionStore;

pub fn jwt_service() -> JwtService {
    JwtService::new(JwtConfig {
        keys: SigningKeys::Secret("test-secret".to_string()),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
    })
    .unwrap()
}

#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<Vec<User>>>,
}

impl InMemoryUserStore {
    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    fn update<F: FnOnce(&mut User)>(&self, id: Uuid, change: F) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        change(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.get(id))
    }

    async fn find_by_phone(&self, phone_number: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: AuthProvider,
        external_id: &str,
    ) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.external_id(provider) == Some(external_id))
            .cloned())
    }

    async fn create(&self, new_user: &NewUser) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();

        let taken = users.iter().any(|u| {
            (new_user.phone_number.is_some() && u.phone_number == new_user.phone_number)
                || (new_user.google_id.is_some() && u.google_id == new_user.google_id)
                || (new_user.facebook_id.is_some() && u.facebook_id == new_user.facebook_id)
        });
        if taken {
            return Err(AppError::conflict("Resource already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            phone_number: new_user.phone_number.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            payment_status: PaymentStatus::Free,
            providers: new_user.providers.clone(),
            google_id: new_user.google_id.clone(),
            facebook_id: new_user.facebook_id.clone(),
            otp_status: new_user.otp_status,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn mark_verified(&self, id: Uuid) -> AppResult<()> {
        self.update(id, |user| user.otp_status = true).map(|_| ())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        self.update(id, |user| user.password_hash = Some(password_hash.to_string()))
            .map(|_| ())
    }

    async fn link_provider(
        &self,
        id: Uuid,
        provider: AuthProvider,
        external_id: &str,
    ) -> AppResult<User> {
        self.update(id, |user| {
            match provider {
                AuthProvider::Google => user.google_id = Some(external_id.to_string()),
                AuthProvider::Facebook => user.facebook_id = Some(external_id.to_string()),
                AuthProvider::Local => {}
            }
            if !user.providers.contains(&provider) {
                user.providers.push(provider);
            }
        })
    }
}

#[derive(Default, Clone)]
pub struct InMemoryOtpStore {
    otps: Arc<Mutex<HashMap<Uuid, Otp>>>,
}

impl InMemoryOtpStore {
    pub fn current(&self, user_id: Uuid) -> Option<Otp> {
        self.otps.lock().unwrap().get(&user_id).cloned()
    }

    /// Pretend the user's passcode was issued `age` ago
    pub fn backdate(&self, user_id: Uuid, age: Duration) {
        if let Some(otp) = self.otps.lock().unwrap().get_mut(&user_id) {
            otp.created_at = Utc::now() - age;
        }
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn upsert(&self, user_id: Uuid, code: &str, created_at: DateTime<Utc>) -> AppResult<Otp> {
        let otp = Otp {
            id: Uuid::new_v4(),
            user_id,
            code: code.to_string(),
            created_at,
        };
        self.otps.lock().unwrap().insert(user_id, otp.clone());
        Ok(otp)
    }

    async fn find(&self, user_id: Uuid, code: &str) -> AppResult<Option<Otp>> {
        Ok(self
            .otps
            .lock()
            .unwrap()
            .get(&user_id)
            .filter(|otp| otp.code == code)
            .cloned())
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        self.otps.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, String>>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, user_id: Uuid, refresh_token: &str, _ttl_seconds: u64) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(user_id, refresh_token.to_string());
        Ok(())
    }

    async fn current(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.sessions.lock().unwrap().get(&user_id).cloned())
    }

    async fn remove(&self, user_id: Uuid) -> Result<()> {
        self.sessions.lock().unwrap().remove(&user_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAuthorizationStates {
    pending: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
}

#[async_trait]
impl AuthorizationStates for InMemoryAuthorizationStates {
    async fn save(&self, csrf_state: &str, pending: &PendingAuthorization) -> Result<()> {
        self.pending
            .lock()
            .unwrap()
            .insert(csrf_state.to_string(), pending.clone());
        Ok(())
    }

    async fn take(&self, csrf_state: &str) -> Result<Option<PendingAuthorization>> {
        Ok(self.pending.lock().unwrap().remove(csrf_state))
    }
}

/// Provider that accepts one code and answers with a fixed profile
pub struct StaticStrategy {
    pub profile: OAuthUserProfile,
    pub code: String,
}

#[async_trait]
impl OAuthStrategy for StaticStrategy {
    fn provider(&self) -> AuthProvider {
        self.profile.provider
    }

    fn authorize_url(&self) -> AuthorizationRequest {
        AuthorizationRequest {
            url: format!("https://{}.test/authorize?state=fixed-state", self.provider().as_str()),
            csrf_state: "fixed-state".to_string(),
            pkce_verifier: "fixed-verifier".to_string(),
        }
    }

    async fn resolve_profile(&self, code: &str, pkce_verifier: &str) -> Result<OAuthUserProfile> {
        if code != self.code || pkce_verifier != "fixed-verifier" {
            anyhow::bail!("authorization code rejected");
        }
        Ok(self.profile.clone())
    }
}

/// Service wired to fresh in-memory stores, returned alongside them
pub struct Harness {
    pub service: AuthService,
    pub users: InMemoryUserStore,
    pub otps: InMemoryOtpStore,
    pub sessions: InMemorySessionStore,
}

pub fn harness() -> Harness {
    let users = InMemoryUserStore::default();
    let otps = InMemoryOtpStore::default();
    let sessions = InMemorySessionStore::default();

    let service = AuthService::new(
        Arc::new(users.clone()),
        Arc::new(otps.clone()),
        jwt_service(),
        Arc::new(sessions.clone()),
    );

    Harness {
        service,
        users,
        otps,
        sessions,
    }
}
