//! Refresh-token sessions
//!
//! Each user holds one current refresh token. Rotating or logging out
//! replaces or removes it, which invalidates every older refresh token.

use anyhow::Result;
use async_trait::async_trait;
use common::cache::RedisPool;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, user_id: Uuid, refresh_token: &str, ttl_seconds: u64) -> Result<()>;

    async fn current(&self, user_id: Uuid) -> Result<Option<String>>;

    async fn remove(&self, user_id: Uuid) -> Result<()>;
}

/// Session manager keeping sessions in Redis with a TTL
#[derive(Clone)]
pub struct SessionManager {
    redis_pool: RedisPool,
}

impl SessionManager {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    fn key(user_id: Uuid) -> String {
        format!("session:{}", user_id)
    }
}

#[async_trait]
impl SessionStore for SessionManager {
    async fn save(&self, user_id: Uuid, refresh_token: &str, ttl_seconds: u64) -> Result<()> {
        info!("Storing session for user: {}", user_id);
        self.redis_pool
            .set(&Self::key(user_id), refresh_token, Some(ttl_seconds))
            .await
    }

    async fn current(&self, user_id: Uuid) -> Result<Option<String>> {
        self.redis_pool.get(&Self::key(user_id)).await
    }

    async fn remove(&self, user_id: Uuid) -> Result<()> {
        info!("Deleting session for user: {}", user_id);
        self.redis_pool.delete(&Self::key(user_id)).await
    }
}
