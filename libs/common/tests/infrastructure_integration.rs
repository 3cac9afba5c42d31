//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL (with the bundled migrations) and Redis
//! are reachable. They need live services and are ignored by default:
//! `cargo test -p common -- --ignored`.

use common::{
    cache::{RedisConfig, RedisStore},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires running PostgreSQL and Redis"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    run_migrations(&pool).await?;

    let row = sqlx::query("SELECT COUNT(*) AS total FROM push_tokens WHERE is_active = FALSE")
        .fetch_one(&pool)
        .await?;
    let total: i64 = row.get("total");
    assert!(total >= 0);

    let redis = RedisStore::new(&RedisConfig::from_env())?;
    assert!(redis.health_check().await?, "Redis health check failed");

    redis.set("integration_test_key", "ExponentPushToken[it]", Some(10)).await?;
    assert_eq!(
        redis.get("integration_test_key").await?,
        Some("ExponentPushToken[it]".to_string())
    );

    redis.delete("integration_test_key").await?;
    assert_eq!(redis.get("integration_test_key").await?, None);

    Ok(())
}
