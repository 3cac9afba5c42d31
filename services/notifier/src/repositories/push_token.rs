//! Push token repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use super::PushTokenRepository;
use crate::models::{DeviceInfo, Platform, PushToken, TokenRegistration};

/// Push token repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgPushTokenRepository {
    pool: PgPool,
}

impl PgPushTokenRepository {
    /// Create a new push token repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn token_from_row(row: PgRow) -> Result<PushToken> {
    let device_info: Option<Json<DeviceInfo>> = row.try_get("device_info")?;
    let platform: String = row.try_get("platform")?;

    Ok(PushToken {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token: row.try_get("token")?,
        device_info: device_info.map(|Json(info)| info),
        platform: platform.parse()?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PushTokenRepository for PgPushTokenRepository {
    async fn find_by_token(&self, token: &str) -> Result<Option<PushToken>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, token, device_info, platform, is_active, created_at, updated_at
            FROM push_tokens
            WHERE token = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(token_from_row).transpose()
    }

    async fn insert(&self, registration: &TokenRegistration) -> Result<PushToken> {
        let row = sqlx::query(
            r#"
            INSERT INTO push_tokens (user_id, token, device_info, platform)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token, device_info, platform, is_active, created_at, updated_at
            "#,
        )
        .bind(registration.user_id)
        .bind(&registration.token)
        .bind(Json(&registration.device_info))
        .bind(registration.platform.as_str())
        .fetch_one(&self.pool)
        .await?;

        token_from_row(row)
    }

    async fn reactivate(&self, id: Uuid, registration: &TokenRegistration) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE push_tokens
            SET user_id = $2, device_info = $3, platform = $4, is_active = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(registration.user_id)
        .bind(Json(&registration.device_info))
        .bind(registration.platform.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate(&self, user_id: Uuid, token: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE push_tokens
            SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND token = $2
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn active_tokens_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<String>> {
        let tokens: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT token
            FROM push_tokens
            WHERE user_id = ANY($1) AND is_active = TRUE
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    async fn active_tokens(&self) -> Result<Vec<String>> {
        let tokens: Vec<String> =
            sqlx::query_scalar("SELECT token FROM push_tokens WHERE is_active = TRUE")
                .fetch_all(&self.pool)
                .await?;

        Ok(tokens)
    }

    async fn active_platforms(&self) -> Result<Vec<Platform>> {
        let platforms: Vec<String> =
            sqlx::query_scalar("SELECT platform FROM push_tokens WHERE is_active = TRUE")
                .fetch_all(&self.pool)
                .await?;

        platforms.iter().map(|p| p.parse()).collect()
    }

    async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM push_tokens
            WHERE is_active = FALSE AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
