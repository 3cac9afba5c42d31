//! Notification history repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};

use super::HistoryRepository;
use crate::models::{NewHistoryEntry, NotificationData, NotificationHistory};

/// Notification history repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgHistoryRepository {
    pool: PgPool,
}

impl PgHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn history_from_row(row: PgRow) -> Result<NotificationHistory> {
    let data: Option<Json<NotificationData>> = row.try_get("data")?;

    Ok(NotificationHistory {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        data: data.map(|Json(data)| data),
        target_tokens: row.try_get("target_tokens")?,
        sent_count: row.try_get("sent_count")?,
        failed_count: row.try_get("failed_count")?,
        sent_by: row.try_get("sent_by")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl HistoryRepository for PgHistoryRepository {
    async fn append(&self, entry: &NewHistoryEntry) -> Result<NotificationHistory> {
        let row = sqlx::query(
            r#"
            INSERT INTO notification_history
                (title, body, data, target_tokens, sent_count, failed_count, sent_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, title, body, data, target_tokens, sent_count, failed_count,
                      sent_by, created_at
            "#,
        )
        .bind(&entry.title)
        .bind(&entry.body)
        .bind(Json(&entry.data))
        .bind(&entry.target_tokens)
        .bind(entry.sent_count)
        .bind(entry.failed_count)
        .bind(entry.sent_by)
        .fetch_one(&self.pool)
        .await?;

        history_from_row(row)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<NotificationHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, body, data, target_tokens, sent_count, failed_count,
                   sent_by, created_at
            FROM notification_history
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(history_from_row).collect()
    }
}
