//! Persistence for users and one-time passcodes
//!
//! Business rules talk to the [`UserStore`] and [`OtpStore`] traits; the
//! PostgreSQL repositories are the production implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AppResult;
use uuid::Uuid;

use crate::models::{AuthProvider, NewUser, Otp, User};

pub mod otp;
pub mod user;

pub use otp::OtpRepository;
pub use user::UserRepository;

/// Lookups ignore soft-deleted users
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_phone(&self, phone_number: &str) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_provider_id(
        &self,
        provider: AuthProvider,
        external_id: &str,
    ) -> AppResult<Option<User>>;

    /// Fails with `Conflict` when a live user already holds the phone number
    /// or provider id
    async fn create(&self, new_user: &NewUser) -> AppResult<User>;

    async fn mark_verified(&self, id: Uuid) -> AppResult<()>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()>;

    /// Attach a provider identity to an existing account
    async fn link_provider(
        &self,
        id: Uuid,
        provider: AuthProvider,
        external_id: &str,
    ) -> AppResult<User>;
}

/// At most one passcode row exists per user
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Insert or overwrite the user's passcode, resetting its creation time
    async fn upsert(&self, user_id: Uuid, code: &str, created_at: DateTime<Utc>)
    -> AppResult<Otp>;

    /// Exact match on both user and code
    async fn find(&self, user_id: Uuid, code: &str) -> AppResult<Option<Otp>>;

    async fn delete(&self, user_id: Uuid) -> AppResult<()>;
}
