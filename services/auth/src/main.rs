use anyhow::Result;
use common::{
    cache::{RedisConfig, RedisPool},
    database::{self, DatabaseConfig},
    jwt::{JwtConfig, JwtService},
    notification::RedisNotificationQueue,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod models;
mod oauth;
mod otp;
mod password;
mod rate_limiter;
mod repositories;
mod routes;
mod service;
mod session;
mod state;
#[cfg(test)]
mod testing;

use crate::{
    config::AuthSettings,
    oauth::{AuthStrategyRegistry, RedisAuthorizationStates},
    rate_limiter::{AttemptLimiter, AttemptLimiterConfig},
    repositories::{OtpRepository, UserRepository},
    service::AuthService,
    session::SessionManager,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let settings = AuthSettings::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    database::run_migrations(&pool).await?;

    // Initialize Redis connection pool
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config)?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let auth_service = AuthService::new(
        Arc::new(UserRepository::new(pool.clone())),
        Arc::new(OtpRepository::new(pool)),
        jwt_service,
        Arc::new(SessionManager::new(redis_pool.clone())),
    );

    let app_state = AppState {
        auth_service,
        strategies: AuthStrategyRegistry::from_settings(&settings)?,
        authorization_states: Arc::new(RedisAuthorizationStates::new(redis_pool.clone())),
        notifications: Arc::new(RedisNotificationQueue::new(redis_pool)),
        rate_limiter: AttemptLimiter::new(AttemptLimiterConfig::default()),
        settings: Arc::new(settings.clone()),
    };

    info!("Authentication service initialized successfully");

    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    info!("Authentication service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
