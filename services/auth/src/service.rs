//! Account activation, credential checks and token issuance
//!
//! Business rules only: persistence goes through [`UserStore`] / [`OtpStore`],
//! refresh sessions through [`SessionStore`]. How an OTP reaches the user is
//! the caller's concern; operations that issue one hand back the plain code.

use chrono::Utc;
use common::{
    AppError, AppResult,
    jwt::{JwtService, TokenType},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{NewUser, User};
use crate::oauth::OAuthUserProfile;
use crate::otp;
use crate::password::{hash_password, verify_password};
use crate::repositories::{OtpStore, UserStore};
use crate::session::SessionStore;

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Result of a successful sign-in
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: TokenPair,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub otp: String,
}

/// A freshly issued passcode and the user it belongs to
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub user: User,
    pub otp: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    otps: Arc<dyn OtpStore>,
    tokens: JwtService,
    sessions: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        otps: Arc<dyn OtpStore>,
        tokens: JwtService,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            users,
            otps,
            tokens,
            sessions,
        }
    }

    pub async fn register(
        &self,
        name: &str,
        phone_number: &str,
        password: &str,
    ) -> AppResult<Registration> {
        info!("Registering user with phone number {}", phone_number);

        if self.users.find_by_phone(phone_number).await?.is_some() {
            return Err(AppError::conflict("Phone number is already registered"));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create(&NewUser::local(name, phone_number, password_hash))
            .await?;

        let otp = self.issue_otp(user.id).await?;
        info!("Registered user {}", user.id);

        Ok(Registration { user, otp })
    }

    /// Consume a passcode and activate the account
    pub async fn verify_otp(&self, user_id: Uuid, code: &str) -> AppResult<()> {
        info!("Verifying OTP for user {}", user_id);

        let otp = self
            .otps
            .find(user_id, code)
            .await?
            .ok_or_else(|| AppError::not_found("Invalid OTP"))?;

        if otp::is_expired(otp.created_at, Utc::now()) {
            return Err(AppError::expired("OTP has expired"));
        }

        self.otps.delete(user_id).await?;
        self.users.mark_verified(user_id).await?;
        info!("User {} verified", user_id);

        Ok(())
    }

    pub async fn resend_otp(&self, user_id: Uuid) -> AppResult<IssuedOtp> {
        info!("Resending OTP for user {}", user_id);

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let otp = self.issue_otp(user.id).await?;
        Ok(IssuedOtp { user, otp })
    }

    pub async fn login(&self, phone_number: &str, password: &str) -> AppResult<AuthSession> {
        info!("Login attempt for phone number {}", phone_number);

        let user = self
            .users
            .find_by_phone(phone_number)
            .await?
            .ok_or_else(invalid_credentials)?;

        if !user.otp_status {
            return Err(AppError::forbidden("Account is not verified"));
        }

        let password_hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;
        if !verify_password(password_hash, password)? {
            return Err(invalid_credentials());
        }

        let token = self.issue_tokens(&user).await?;
        info!("User {} logged in", user.id);

        Ok(AuthSession { token, user })
    }

    pub async fn forgot_password(&self, phone_number: &str) -> AppResult<IssuedOtp> {
        info!("Password reset requested for phone number {}", phone_number);

        let user = self
            .users
            .find_by_phone(phone_number)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let otp = self.issue_otp(user.id).await?;
        Ok(IssuedOtp { user, otp })
    }

    /// Prove the phone number with a passcode, then replace the password
    ///
    /// Existing refresh sessions are revoked.
    pub async fn reset_password(
        &self,
        phone_number: &str,
        code: &str,
        new_password: &str,
    ) -> AppResult<()> {
        info!("Resetting password for phone number {}", phone_number);

        let user = self
            .users
            .find_by_phone(phone_number)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        self.verify_otp(user.id, code).await?;

        let password_hash = hash_password(new_password)?;
        self.users.update_password(user.id, &password_hash).await?;
        self.sessions.remove(user.id).await?;
        info!("Password reset for user {}", user.id);

        Ok(())
    }

    /// Sign in a user an OAuth provider has already vouched for
    pub async fn build_oauth_response(&self, user: User) -> AppResult<AuthSession> {
        let token = self.issue_tokens(&user).await?;
        Ok(AuthSession { token, user })
    }

    /// Match a provider profile to an account, linking by email or creating one
    pub async fn find_or_create_oauth_user(&self, profile: &OAuthUserProfile) -> AppResult<User> {
        if let Some(user) = self
            .users
            .find_by_provider_id(profile.provider, &profile.id)
            .await?
        {
            return Ok(user);
        }

        if let Some(email) = profile.email.as_deref() {
            if let Some(user) = self.users.find_by_email(email).await? {
                if user.external_id(profile.provider).is_some() {
                    return Err(AppError::conflict(format!(
                        "Account is already linked to another {} identity",
                        profile.provider.as_str()
                    )));
                }
                info!(
                    "Linking {} identity to user {}",
                    profile.provider.as_str(),
                    user.id
                );
                return self
                    .users
                    .link_provider(user.id, profile.provider, &profile.id)
                    .await;
            }
        }

        info!("Creating user from {} profile", profile.provider.as_str());
        self.users
            .create(&NewUser::external(
                profile.provider,
                &profile.id,
                &profile.name,
                profile.email.clone(),
            ))
            .await
    }

    /// Trade the current refresh token for a new pair; older tokens stop working
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let user_id = self.session_owner(refresh_token).await?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::authentication("Invalid refresh token"))?;

        info!("Rotating refresh token for user {}", user.id);
        self.issue_tokens(&user).await
    }

    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        let user_id = self.session_owner(refresh_token).await?;
        self.sessions.remove(user_id).await?;
        info!("User {} logged out", user_id);

        Ok(())
    }

    async fn session_owner(&self, refresh_token: &str) -> AppResult<Uuid> {
        let claims = self.tokens.validate_token(refresh_token).map_err(|e| {
            warn!("Rejected refresh token: {}", e);
            AppError::authentication("Invalid refresh token")
        })?;

        if claims.token_type != TokenType::Refresh {
            return Err(AppError::authentication("Invalid refresh token"));
        }

        match self.sessions.current(claims.sub).await? {
            Some(current) if current == refresh_token => Ok(claims.sub),
            _ => Err(AppError::authentication("Session expired or revoked")),
        }
    }

    async fn issue_otp(&self, user_id: Uuid) -> AppResult<String> {
        let code = otp::generate_code();
        self.otps.upsert(user_id, &code, Utc::now()).await?;
        Ok(code)
    }

    async fn issue_tokens(&self, user: &User) -> AppResult<TokenPair> {
        let access_token = self
            .tokens
            .generate_access_token(user.id, user.payment_status)?;
        let refresh_token = self
            .tokens
            .generate_refresh_token(user.id, user.payment_status)?;

        self.sessions
            .save(user.id, &refresh_token, self.tokens.refresh_token_expiry())
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_expiry(),
        })
    }
}

fn invalid_credentials() -> AppError {
    AppError::authentication("Invalid phone number or password")
}
