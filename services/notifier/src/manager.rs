//! Token and dispatch manager
//!
//! Owns the device registration lifecycle (permission, push token, local
//! cache, record-store sync) and every send path (single token, a set of
//! users, broadcast). Constructed once by the application root with its
//! collaborators injected and shared behind an `Arc`.
//!
//! Record-store and history failures are logged and swallowed; gateway and
//! permission failures propagate to the caller.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::{Duration, Utc};
use tokio::{
    sync::{RwLock, broadcast},
    task::JoinHandle,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    device::{DeviceNotifications, PermissionStatus},
    error::{NotifierError, NotifierResult},
    gateway::{PushGateway, PushMessage, PushTicket},
    identity::{AuthUser, IdentityProvider},
    kv::{KeyValueStore, PUSH_TOKEN_KEY},
    listeners::{ListenerHandle, ListenerRegistry},
    models::{
        DeviceInfo, NewHistoryEntry, NotificationContent, NotificationData, NotificationHistory,
        NotificationRequest, NotificationResponse, Platform, ReceivedNotification, TokenStats,
        TokenRegistration,
    },
    preferences::PreferencesStore,
    repositories::{HistoryRepository, PushTokenRepository},
};

/// Default number of history rows returned
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Default retention window for inactive tokens, in days
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

const DEFAULT_SOUND: &str = "default";

/// External services the manager drives
#[derive(Clone)]
pub struct Collaborators {
    pub device: Arc<dyn DeviceNotifications>,
    pub kv: Arc<dyn KeyValueStore>,
    pub tokens: Arc<dyn PushTokenRepository>,
    pub history: Arc<dyn HistoryRepository>,
    pub gateway: Arc<dyn PushGateway>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub struct NotificationManager {
    device: Arc<dyn DeviceNotifications>,
    kv: Arc<dyn KeyValueStore>,
    tokens: Arc<dyn PushTokenRepository>,
    history: Arc<dyn HistoryRepository>,
    gateway: Arc<dyn PushGateway>,
    identity: Arc<dyn IdentityProvider>,
    push_token: RwLock<Option<String>>,
    received: ListenerRegistry<ReceivedNotification>,
    responses: ListenerRegistry<NotificationResponse>,
    listener_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationManager {
    pub fn new(collaborators: Collaborators) -> Self {
        let Collaborators {
            device,
            kv,
            tokens,
            history,
            gateway,
            identity,
        } = collaborators;

        Self {
            device,
            kv,
            tokens,
            history,
            gateway,
            identity,
            push_token: RwLock::new(None),
            received: ListenerRegistry::new(),
            responses: ListenerRegistry::new(),
            listener_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register the device, start the event listeners and sync the token.
    ///
    /// Returns the issued token, or `None` on a simulator. Fails with
    /// [`NotifierError::PermissionDenied`] when a physical device refuses
    /// notification permission.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> NotifierResult<Option<String>> {
        let token = self.register_for_push().await?;
        self.start_listeners();

        if let Err(e) = self.save_token().await {
            info!("Push token not synced: {}", e);
        }

        Ok(token)
    }

    /// Stop forwarding device events. Registered callbacks stay registered.
    pub fn dispose(&self) {
        let mut tasks = self
            .listener_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    async fn register_for_push(&self) -> NotifierResult<Option<String>> {
        if self.device.platform() == Platform::Android {
            self.device
                .ensure_default_channel()
                .await
                .map_err(NotifierError::device)?;
        }

        if !self.device.is_physical_device() {
            warn!("Must use physical device for push notifications");
            return Ok(None);
        }

        let mut status = self
            .device
            .permission_status()
            .await
            .map_err(NotifierError::device)?;
        if status != PermissionStatus::Granted {
            status = self
                .device
                .request_permission()
                .await
                .map_err(NotifierError::device)?;
        }
        if status != PermissionStatus::Granted {
            return Err(NotifierError::PermissionDenied);
        }

        let token = self
            .device
            .push_token()
            .await
            .map_err(NotifierError::device)?;
        *self.push_token.write().await = Some(token.clone());

        self.kv
            .set_item(PUSH_TOKEN_KEY, &token)
            .await
            .map_err(|e| NotifierError::LocalStorage(e.to_string()))?;

        info!(token = %token, "Push token obtained");
        Ok(Some(token))
    }

    fn start_listeners(&self) {
        self.dispose();

        let received = forward(self.device.received_events(), self.received.clone());
        let responses = forward(self.device.response_events(), self.responses.clone());

        self.listener_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([received, responses]);
    }

    /// Call `callback` for every notification received in the foreground
    pub fn on_notification_received(
        &self,
        callback: impl Fn(&ReceivedNotification) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.received.subscribe(callback)
    }

    /// Call `callback` whenever the user interacts with a notification
    pub fn on_notification_response(
        &self,
        callback: impl Fn(&NotificationResponse) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.responses.subscribe(callback)
    }

    async fn require_user(&self, operation: &'static str) -> NotifierResult<AuthUser> {
        self.identity
            .current_user()
            .await
            .ok_or(NotifierError::NotSignedIn(operation))
    }

    /// Upsert the current token for the signed-in user.
    ///
    /// Without a token this is a no-op; record-store failures are logged.
    #[instrument(skip(self))]
    pub async fn save_token(&self) -> NotifierResult<()> {
        let user = self.require_user("save push tokens").await?;

        let Some(token) = self.push_token.read().await.clone() else {
            info!("No push token available to save");
            return Ok(());
        };

        let registration = TokenRegistration {
            user_id: user.id,
            token,
            device_info: self.device.device_info(),
            platform: self.device.platform(),
        };

        if let Err(e) = self.upsert_token(&registration).await {
            error!(error = %e, "Error saving push token");
        }
        Ok(())
    }

    /// Update the row holding this token, or insert one.
    ///
    /// Read-then-write: two registrations of the same token racing each
    /// other both write the same device/user pairing, so the last one wins.
    async fn upsert_token(&self, registration: &TokenRegistration) -> Result<()> {
        match self.tokens.find_by_token(&registration.token).await? {
            Some(existing) => {
                self.tokens.reactivate(existing.id, registration).await?;
                info!(token_id = %existing.id, "Push token updated");
            }
            None => {
                let row = self.tokens.insert(registration).await?;
                info!(token_id = %row.id, "Push token saved");
            }
        }
        Ok(())
    }

    /// Active tokens belonging to any of `user_ids`
    pub async fn get_user_tokens(&self, user_ids: &[Uuid]) -> Vec<String> {
        self.tokens
            .active_tokens_for_users(user_ids)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Error getting user tokens");
                Vec::new()
            })
    }

    /// Every active token regardless of owner
    pub async fn get_all_active_tokens(&self) -> Vec<String> {
        self.tokens.active_tokens().await.unwrap_or_else(|e| {
            error!(error = %e, "Error getting active tokens");
            Vec::new()
        })
    }

    /// Show a notification on this device right away
    pub async fn send_local_notification(
        &self,
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotifierResult<String> {
        self.device
            .schedule(local_content(title, body, data), None)
            .await
            .map_err(|e| {
                error!(error = %e, "Error sending local notification");
                NotifierError::device(e)
            })
    }

    /// Send one push message to one token
    #[instrument(skip(self, body, data))]
    pub async fn send_push_notification(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotifierResult<Vec<PushTicket>> {
        let message = PushMessage::new(token, title, body, data);
        let targets = vec![token.to_string()];

        match self.gateway.send(&message).await {
            Ok(tickets) => {
                info!(tickets = tickets.len(), "Push notification sent");
                self.record_history(title, body, data, targets, 1, 0).await;
                Ok(tickets)
            }
            Err(e) => {
                error!(error = %e, "Error sending push notification");
                self.record_history(title, body, data, targets, 0, 1).await;
                Err(e.into())
            }
        }
    }

    /// Send one message per token in a single gateway request
    #[instrument(skip(self, tokens, body, data), fields(targets = tokens.len()))]
    pub async fn send_bulk_notifications(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotifierResult<Vec<PushTicket>> {
        if tokens.is_empty() {
            return Err(NotifierError::EmptyTargets);
        }

        let messages: Vec<PushMessage> = tokens
            .iter()
            .map(|token| PushMessage::new(token, title, body, data))
            .collect();

        match self.gateway.send_batch(&messages).await {
            Ok(tickets) => {
                let (sent, failed) = ticket_counts(&tickets);
                info!(sent, failed, "Bulk notifications sent");
                self.record_history(title, body, data, tokens.to_vec(), sent, failed)
                    .await;
                Ok(tickets)
            }
            Err(e) => {
                error!(error = %e, "Error sending bulk notifications");
                let failed = i32::try_from(tokens.len()).unwrap_or(i32::MAX);
                self.record_history(title, body, data, tokens.to_vec(), 0, failed)
                    .await;
                Err(e.into())
            }
        }
    }

    /// Send to every active token owned by `user_ids`
    pub async fn send_notification_to_users(
        &self,
        user_ids: &[Uuid],
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotifierResult<Vec<PushTicket>> {
        self.require_user("send notifications to users").await?;

        let tokens = self.get_user_tokens(user_ids).await;
        if tokens.is_empty() {
            return Err(NotifierError::NoActiveTokens(
                "No active tokens found for specified users",
            ));
        }

        self.send_bulk_notifications(&tokens, title, body, data)
            .await
    }

    /// Send to every active token
    pub async fn send_broadcast_notification(
        &self,
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotifierResult<Vec<PushTicket>> {
        self.require_user("send broadcast notifications").await?;

        let tokens = self.get_all_active_tokens().await;
        if tokens.is_empty() {
            return Err(NotifierError::NoActiveTokens("No active tokens found"));
        }

        self.send_bulk_notifications(&tokens, title, body, data)
            .await
    }

    async fn record_history(
        &self,
        title: &str,
        body: &str,
        data: &NotificationData,
        target_tokens: Vec<String>,
        sent_count: i32,
        failed_count: i32,
    ) {
        let entry = NewHistoryEntry {
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
            target_tokens,
            sent_count,
            failed_count,
            sent_by: self.identity.current_user().await.map(|user| user.id),
        };

        if let Err(e) = self.history.append(&entry).await {
            error!(error = %e, "Error saving notification history");
        }
    }

    /// Latest send attempts, newest first
    pub async fn get_notification_history(&self, limit: i64) -> Vec<NotificationHistory> {
        self.history.recent(limit).await.unwrap_or_else(|e| {
            error!(error = %e, "Error getting notification history");
            Vec::new()
        })
    }

    /// Schedule a local notification.
    ///
    /// `seconds` is accepted but the notification is handed to the device
    /// with an immediate trigger, matching the deployed app.
    pub async fn schedule_notification(
        &self,
        title: &str,
        body: &str,
        seconds: u64,
        data: &NotificationData,
    ) -> NotifierResult<String> {
        if seconds > 0 {
            warn!(
                requested_delay_secs = seconds,
                "Requested delay is not applied; the notification fires immediately"
            );
        }

        let identifier = self
            .device
            .schedule(local_content(title, body, data), None)
            .await
            .map_err(|e| {
                error!(error = %e, "Error scheduling notification");
                NotifierError::device(e)
            })?;

        info!(identifier = %identifier, "Notification scheduled");
        Ok(identifier)
    }

    pub async fn cancel_scheduled_notification(&self, identifier: &str) -> NotifierResult<()> {
        self.device
            .cancel_scheduled(identifier)
            .await
            .map_err(|e| {
                error!(error = %e, "Error cancelling notification");
                NotifierError::device(e)
            })?;

        info!(identifier = %identifier, "Notification cancelled");
        Ok(())
    }

    pub async fn get_all_scheduled_notifications(&self) -> Vec<NotificationRequest> {
        self.device.scheduled().await.unwrap_or_else(|e| {
            error!(error = %e, "Error getting scheduled notifications");
            Vec::new()
        })
    }

    /// Cancel everything scheduled; on Android also clear the tray
    pub async fn clear_all_notifications(&self) {
        if let Err(e) = self.device.cancel_all_scheduled().await {
            error!(error = %e, "Error clearing scheduled notifications");
            return;
        }
        if self.device.platform() == Platform::Android {
            if let Err(e) = self.device.dismiss_all().await {
                error!(error = %e, "Error dismissing notifications");
            }
        }
    }

    /// Flag the signed-in user's row for this device's token inactive.
    ///
    /// Silently does nothing when nobody is signed in or no token is cached.
    pub async fn deactivate_current_token(&self) {
        let Some(user) = self.identity.current_user().await else {
            return;
        };
        self.deactivate_token_for(user.id).await;
    }

    /// Flag `user_id`'s row for this device's token inactive.
    ///
    /// Used on sign-out, when the identity provider no longer reports the
    /// departing user.
    pub async fn deactivate_token_for(&self, user_id: Uuid) {
        let Some(token) = self.current_token().await else {
            return;
        };

        match self.tokens.deactivate(user_id, &token).await {
            Ok(rows) => info!(rows, "Token deactivated"),
            Err(e) => error!(error = %e, "Error deactivating token"),
        }
    }

    /// Delete inactive tokens untouched for `days_old` days; returns the count
    pub async fn cleanup_inactive_tokens(&self, days_old: u32) -> u64 {
        let Some(cutoff) = Duration::try_days(i64::from(days_old))
            .and_then(|window| Utc::now().checked_sub_signed(window))
        else {
            warn!(days_old, "Retention window exceeds the representable date range");
            return 0;
        };

        match self.tokens.delete_inactive_before(cutoff).await {
            Ok(deleted) => {
                info!(deleted, days_old, "Cleaned up inactive tokens");
                deleted
            }
            Err(e) => {
                error!(error = %e, "Error cleaning up inactive tokens");
                0
            }
        }
    }

    /// Token obtained during this session
    pub async fn get_token(&self) -> Option<String> {
        self.push_token.read().await.clone()
    }

    /// Token cached in local storage, possibly from an earlier session
    pub async fn get_stored_token(&self) -> Option<String> {
        self.kv.get_item(PUSH_TOKEN_KEY).await.unwrap_or_else(|e| {
            error!(error = %e, "Error getting stored token");
            None
        })
    }

    /// Preferences stored alongside the cached token
    pub fn preferences(&self) -> PreferencesStore {
        PreferencesStore::new(self.kv.clone())
    }

    async fn current_token(&self) -> Option<String> {
        match self.get_token().await {
            Some(token) => Some(token),
            None => self.get_stored_token().await,
        }
    }

    pub fn get_device_info(&self) -> DeviceInfo {
        self.device.device_info()
    }

    pub async fn are_notifications_enabled(&self) -> bool {
        match self.device.permission_status().await {
            Ok(status) => status == PermissionStatus::Granted,
            Err(e) => {
                error!(error = %e, "Error checking notification permissions");
                false
            }
        }
    }

    pub async fn request_notification_permissions(&self) -> bool {
        match self.device.request_permission().await {
            Ok(status) => status == PermissionStatus::Granted,
            Err(e) => {
                error!(error = %e, "Error requesting notification permissions");
                false
            }
        }
    }

    /// Active token counts per platform
    pub async fn get_token_stats_by_platform(&self) -> TokenStats {
        match self.tokens.active_platforms().await {
            Ok(platforms) => TokenStats::from_platforms(platforms),
            Err(e) => {
                error!(error = %e, "Error getting token stats");
                TokenStats::default()
            }
        }
    }
}

impl Drop for NotificationManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn forward<T>(mut events: broadcast::Receiver<T>, registry: ListenerRegistry<T>) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => registry.emit(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn local_content(title: &str, body: &str, data: &NotificationData) -> NotificationContent {
    NotificationContent {
        title: title.to_string(),
        body: body.to_string(),
        data: data.clone(),
        sound: Some(DEFAULT_SOUND.to_string()),
    }
}

/// `(ok tickets, remaining tickets)`
fn ticket_counts(tickets: &[PushTicket]) -> (i32, i32) {
    let sent = tickets.iter().filter(|t| t.is_ok()).count();
    let failed = tickets.len() - sent;
    (
        i32::try_from(sent).unwrap_or(i32::MAX),
        i32::try_from(failed).unwrap_or(i32::MAX),
    )
}
