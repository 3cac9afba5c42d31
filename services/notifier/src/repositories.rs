//! Record store access for push tokens and notification history
//!
//! The manager only sees these traits; `postgres` implements them over the
//! shared PostgreSQL pool and `memory` keeps rows in process for tests and
//! local runs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{NewHistoryEntry, NotificationHistory, Platform, PushToken, TokenRegistration};

pub mod history;
pub mod memory;
pub mod push_token;

pub use history::PgHistoryRepository;
pub use memory::InMemoryRecordStore;
pub use push_token::PgPushTokenRepository;

/// Storage of device push tokens
#[async_trait]
pub trait PushTokenRepository: Send + Sync {
    /// Find the row holding this exact token value
    async fn find_by_token(&self, token: &str) -> Result<Option<PushToken>>;

    /// Insert a fresh, active row
    async fn insert(&self, registration: &TokenRegistration) -> Result<PushToken>;

    /// Rebind an existing row to the registration and mark it active
    async fn reactivate(&self, id: Uuid, registration: &TokenRegistration) -> Result<()>;

    /// Flag the row for this user and token inactive; returns rows touched
    async fn deactivate(&self, user_id: Uuid, token: &str) -> Result<u64>;

    /// Token values of active rows owned by any of `user_ids`
    async fn active_tokens_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<String>>;

    /// Token values of every active row
    async fn active_tokens(&self) -> Result<Vec<String>>;

    /// Platform of every active row
    async fn active_platforms(&self) -> Result<Vec<Platform>>;

    /// Hard-delete inactive rows last updated before `cutoff`; returns the count
    async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Append-only log of send attempts
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn append(&self, entry: &NewHistoryEntry) -> Result<NotificationHistory>;

    /// Most recent rows first
    async fn recent(&self, limit: i64) -> Result<Vec<NotificationHistory>>;
}
