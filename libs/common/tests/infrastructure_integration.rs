//! Integration tests for the infrastructure components
//!
//! These need a running PostgreSQL and Redis (`DATABASE_URL`, `REDIS_URL`)
//! and are ignored by default: `cargo test -- --ignored`.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    notification::{Notification, NotificationQueue, OUTBOX_KEY, RedisNotificationQueue},
};
use sqlx::Row;

#[tokio::test]
#[ignore]
async fn test_migrations_create_core_tables() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    run_migrations(&pool).await?;

    for table in ["users", "otps", "plans", "user_payments", "user_payment_histories"] {
        let row = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
            .bind(format!("public.{}", table))
            .fetch_one(&pool)
            .await?;
        let present: bool = row.get("present");
        assert!(present, "table {} missing after migrations", table);
    }

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_redis_round_trip_and_outbox() -> Result<(), Box<dyn std::error::Error>> {
    let redis_pool = RedisPool::new(&RedisConfig::from_env()?)?;
    assert!(redis_pool.health_check().await?, "Redis health check failed");

    redis_pool.set("integration:key", "value", Some(10)).await?;
    assert_eq!(
        redis_pool.take("integration:key").await?,
        Some("value".to_string())
    );
    assert_eq!(redis_pool.get("integration:key").await?, None);

    let queue = RedisNotificationQueue::new(redis_pool.clone());
    queue
        .enqueue(Notification {
            to: "admin@farm.in".to_string(),
            subject: "Integration".to_string(),
            template: "integration".to_string(),
            data: serde_json::json!({}),
        })
        .await?;
    redis_pool.delete(OUTBOX_KEY).await?;

    Ok(())
}
