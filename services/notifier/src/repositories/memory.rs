//! In-process record store used by tests and database-less runs

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{HistoryRepository, PushTokenRepository};
use crate::models::{NewHistoryEntry, NotificationHistory, Platform, PushToken, TokenRegistration};

/// Push tokens and history rows held in memory
#[derive(Default)]
pub struct InMemoryRecordStore {
    tokens: Mutex<Vec<PushToken>>,
    history: Mutex<Vec<NotificationHistory>>,
    unavailable: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, as an unreachable store would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a row verbatim, bypassing the registration path
    pub async fn seed_token(&self, token: PushToken) {
        self.tokens.lock().await.push(token);
    }

    pub async fn tokens(&self) -> Vec<PushToken> {
        self.tokens.lock().await.clone()
    }

    pub async fn history(&self) -> Vec<NotificationHistory> {
        self.history.lock().await.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("record store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl PushTokenRepository for InMemoryRecordStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<PushToken>> {
        self.check_available()?;
        let tokens = self.tokens.lock().await;
        Ok(tokens
            .iter()
            .filter(|row| row.token == token)
            .max_by_key(|row| row.updated_at)
            .cloned())
    }

    async fn insert(&self, registration: &TokenRegistration) -> Result<PushToken> {
        self.check_available()?;
        let now = Utc::now();
        let row = PushToken {
            id: Uuid::new_v4(),
            user_id: registration.user_id,
            token: registration.token.clone(),
            device_info: Some(registration.device_info.clone()),
            platform: registration.platform,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.tokens.lock().await.push(row.clone());
        Ok(row)
    }

    async fn reactivate(&self, id: Uuid, registration: &TokenRegistration) -> Result<()> {
        self.check_available()?;
        let mut tokens = self.tokens.lock().await;
        if let Some(row) = tokens.iter_mut().find(|row| row.id == id) {
            row.user_id = registration.user_id;
            row.device_info = Some(registration.device_info.clone());
            row.platform = registration.platform;
            row.is_active = true;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn deactivate(&self, user_id: Uuid, token: &str) -> Result<u64> {
        self.check_available()?;
        let now = Utc::now();
        let mut touched = 0;
        for row in self
            .tokens
            .lock()
            .await
            .iter_mut()
            .filter(|row| row.user_id == user_id && row.token == token)
        {
            row.is_active = false;
            row.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn active_tokens_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<String>> {
        self.check_available()?;
        let tokens = self.tokens.lock().await;
        Ok(tokens
            .iter()
            .filter(|row| row.is_active && user_ids.contains(&row.user_id))
            .map(|row| row.token.clone())
            .collect())
    }

    async fn active_tokens(&self) -> Result<Vec<String>> {
        self.check_available()?;
        let tokens = self.tokens.lock().await;
        Ok(tokens
            .iter()
            .filter(|row| row.is_active)
            .map(|row| row.token.clone())
            .collect())
    }

    async fn active_platforms(&self) -> Result<Vec<Platform>> {
        self.check_available()?;
        let tokens = self.tokens.lock().await;
        Ok(tokens
            .iter()
            .filter(|row| row.is_active)
            .map(|row| row.platform)
            .collect())
    }

    async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check_available()?;
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|row| row.is_active || row.updated_at >= cutoff);
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl HistoryRepository for InMemoryRecordStore {
    async fn append(&self, entry: &NewHistoryEntry) -> Result<NotificationHistory> {
        self.check_available()?;
        let row = NotificationHistory {
            id: Uuid::new_v4(),
            title: entry.title.clone(),
            body: entry.body.clone(),
            data: Some(entry.data.clone()),
            target_tokens: entry.target_tokens.clone(),
            sent_count: entry.sent_count,
            failed_count: entry.failed_count,
            sent_by: entry.sent_by,
            created_at: Utc::now(),
        };
        self.history.lock().await.push(row.clone());
        Ok(row)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<NotificationHistory>> {
        self.check_available()?;
        let history = self.history.lock().await;
        let mut rows: Vec<NotificationHistory> = history.iter().rev().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceInfo;
    use chrono::Duration;

    fn registration(user_id: Uuid, token: &str) -> TokenRegistration {
        TokenRegistration {
            user_id,
            token: token.to_string(),
            device_info: DeviceInfo::default(),
            platform: Platform::Android,
        }
    }

    #[tokio::test]
    async fn deactivate_only_touches_matching_user_and_token() {
        let store = InMemoryRecordStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.insert(&registration(alice, "tok-a")).await.unwrap();
        store.insert(&registration(bob, "tok-b")).await.unwrap();

        assert_eq!(store.deactivate(alice, "tok-b").await.unwrap(), 0);
        assert_eq!(store.deactivate(alice, "tok-a").await.unwrap(), 1);

        assert_eq!(store.active_tokens().await.unwrap(), vec!["tok-b".to_string()]);
    }

    #[tokio::test]
    async fn delete_inactive_respects_cutoff() {
        let store = InMemoryRecordStore::new();
        let row = store.insert(&registration(Uuid::new_v4(), "old")).await.unwrap();
        store.seed_token(PushToken {
            id: Uuid::new_v4(),
            is_active: false,
            updated_at: Utc::now() - Duration::days(40),
            token: "stale".to_string(),
            ..row
        })
        .await;

        let removed = store
            .delete_inactive_before(Utc::now() - Duration::days(30))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.tokens().await.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryRecordStore::new();
        store.set_unavailable(true);

        assert!(store.active_tokens().await.is_err());
        assert!(store.recent(10).await.is_err());
    }
}
