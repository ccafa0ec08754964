use anyhow::Result;
use common::{
    cache::{RedisConfig, RedisPool},
    database::{self, DatabaseConfig},
    jwt::{JwtConfig, JwtService},
    notification::RedisNotificationQueue,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod expiry;
mod gateway;
mod jobs;
mod middleware;
mod models;
mod repositories;
mod routes;
mod service;
mod state;
#[cfg(test)]
mod testing;
mod webhook;

use crate::{
    config::PaymentSettings,
    gateway::RazorpayClient,
    jobs::PlanExpiryJob,
    repositories::PaymentRepository,
    service::{PaymentService, SystemClock},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting payment service");

    let settings = PaymentSettings::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    database::run_migrations(&pool).await?;

    let redis_pool = RedisPool::new(&RedisConfig::from_env()?)?;

    // Verify-only unless a private key is configured
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let store = Arc::new(PaymentRepository::new(pool));
    let gateway = RazorpayClient::new(
        &settings.gateway.base_url,
        &settings.gateway.key_id,
        &settings.gateway.key_secret,
    );

    let payment_service = PaymentService::new(
        store.clone(),
        Arc::new(gateway),
        Arc::new(RedisNotificationQueue::new(redis_pool)),
        Arc::new(SystemClock),
        settings.admin_email.clone(),
    );

    let _scheduler = PlanExpiryJob::new(store)
        .start(&settings.expiry_schedule)
        .await?;

    let webhook_secret = settings.gateway.signing_secret().map(str::to_string);
    if webhook_secret.is_none() {
        warn!(
            "PAYMENTS__GATEWAY__WEBHOOK_SECRET is not set; webhook bodies are accepted without HMAC verification"
        );
    }

    let app_state = AppState {
        payment_service,
        jwt_service,
        webhook_secret,
    };

    info!("Payment service initialized successfully");

    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    info!("Payment service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
