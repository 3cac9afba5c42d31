//! Device notification service
//!
//! The OS facility the manager drives: permissions, push-token issuance,
//! local scheduling and the two notification event streams. [`LocalDevice`]
//! is an in-process implementation used by the notifier binary (a headless
//! device session) and by the tests.

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    DeviceInfo, NotificationContent, NotificationRequest, NotificationResponse,
    NotificationTrigger, Platform, ReceivedNotification,
};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[async_trait]
pub trait DeviceNotifications: Send + Sync {
    /// False on simulators and emulators, which cannot receive pushes
    fn is_physical_device(&self) -> bool;

    fn platform(&self) -> Platform;

    fn device_info(&self) -> DeviceInfo;

    async fn permission_status(&self) -> Result<PermissionStatus>;

    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Register with the push service and return the issued token
    async fn push_token(&self) -> Result<String>;

    /// Create the Android `default` channel
    async fn ensure_default_channel(&self) -> Result<()>;

    /// Hand a notification to the scheduler; `None` fires it immediately
    async fn schedule(
        &self,
        content: NotificationContent,
        trigger: Option<NotificationTrigger>,
    ) -> Result<String>;

    async fn cancel_scheduled(&self, identifier: &str) -> Result<()>;

    async fn scheduled(&self) -> Result<Vec<NotificationRequest>>;

    async fn cancel_all_scheduled(&self) -> Result<()>;

    /// Remove every notification currently shown in the tray
    async fn dismiss_all(&self) -> Result<()>;

    /// Notifications arriving while the app is in the foreground
    fn received_events(&self) -> broadcast::Receiver<ReceivedNotification>;

    /// User interactions with delivered notifications
    fn response_events(&self) -> broadcast::Receiver<NotificationResponse>;
}

/// Settings for an in-process device
#[derive(Debug, Clone)]
pub struct LocalDeviceConfig {
    pub platform: Platform,
    pub physical: bool,
    /// Answer to the next permission prompt
    pub grant_permission: bool,
    /// Token handed out on registration; `None` makes registration fail
    pub push_token: Option<String>,
    pub info: DeviceInfo,
}

impl Default for LocalDeviceConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Android,
            physical: true,
            grant_permission: true,
            push_token: Some(format!("ExponentPushToken[{}]", Uuid::new_v4().simple())),
            info: DeviceInfo {
                os_name: Some("Android".to_string()),
                ..Default::default()
            },
        }
    }
}

struct DeviceState {
    permission: PermissionStatus,
    default_channel: bool,
    scheduled: Vec<NotificationRequest>,
    presented: Vec<ReceivedNotification>,
}

struct Inner {
    config: LocalDeviceConfig,
    state: Mutex<DeviceState>,
    received_tx: broadcast::Sender<ReceivedNotification>,
    response_tx: broadcast::Sender<NotificationResponse>,
}

impl Inner {
    async fn present(&self, request: NotificationRequest) {
        let notification = ReceivedNotification {
            date: Utc::now(),
            request,
        };
        self.state.lock().await.presented.push(notification.clone());
        // No subscriber just means nobody is listening yet.
        let _ = self.received_tx.send(notification);
    }
}

/// In-process device notification service
#[derive(Clone)]
pub struct LocalDevice {
    inner: Arc<Inner>,
}

impl LocalDevice {
    pub fn new(config: LocalDeviceConfig) -> Self {
        let (received_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (response_tx, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(DeviceState {
                    permission: PermissionStatus::Undetermined,
                    default_channel: false,
                    scheduled: Vec::new(),
                    presented: Vec::new(),
                }),
                received_tx,
                response_tx,
            }),
        }
    }

    /// Simulate a remote push arriving while the app is open
    pub async fn deliver(&self, content: NotificationContent) -> String {
        let identifier = Uuid::new_v4().to_string();
        self.inner
            .present(NotificationRequest {
                identifier: identifier.clone(),
                content,
                trigger: None,
            })
            .await;
        identifier
    }

    /// Simulate the user tapping a presented notification
    pub async fn respond(&self, identifier: &str, action_identifier: &str) -> Result<()> {
        let notification = self
            .inner
            .state
            .lock()
            .await
            .presented
            .iter()
            .find(|n| n.request.identifier == identifier)
            .cloned()
            .ok_or_else(|| anyhow!("no presented notification {}", identifier))?;

        let _ = self.inner.response_tx.send(NotificationResponse {
            notification,
            action_identifier: action_identifier.to_string(),
            user_text: None,
        });
        Ok(())
    }

    pub async fn presented(&self) -> Vec<ReceivedNotification> {
        self.inner.state.lock().await.presented.clone()
    }

    pub async fn has_default_channel(&self) -> bool {
        self.inner.state.lock().await.default_channel
    }

    /// Number of live subscribers on the received stream
    pub fn received_listeners(&self) -> usize {
        self.inner.received_tx.receiver_count()
    }

    /// Number of live subscribers on the response stream
    pub fn response_listeners(&self) -> usize {
        self.inner.response_tx.receiver_count()
    }
}

fn trigger_delay(trigger: &NotificationTrigger) -> Option<Duration> {
    if let Some(seconds) = trigger.seconds {
        return Some(Duration::from_secs(seconds));
    }
    trigger
        .date
        .map(|date| (date - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

#[async_trait]
impl DeviceNotifications for LocalDevice {
    fn is_physical_device(&self) -> bool {
        self.inner.config.physical
    }

    fn platform(&self) -> Platform {
        self.inner.config.platform
    }

    fn device_info(&self) -> DeviceInfo {
        self.inner.config.info.clone()
    }

    async fn permission_status(&self) -> Result<PermissionStatus> {
        Ok(self.inner.state.lock().await.permission)
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        let mut state = self.inner.state.lock().await;
        state.permission = if self.inner.config.grant_permission {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        Ok(state.permission)
    }

    async fn push_token(&self) -> Result<String> {
        if !self.inner.config.physical {
            return Err(anyhow!("push tokens are only issued to physical devices"));
        }
        self.inner
            .config
            .push_token
            .clone()
            .ok_or_else(|| anyhow!("device is not registered with the push service"))
    }

    async fn ensure_default_channel(&self) -> Result<()> {
        self.inner.state.lock().await.default_channel = true;
        Ok(())
    }

    async fn schedule(
        &self,
        content: NotificationContent,
        trigger: Option<NotificationTrigger>,
    ) -> Result<String> {
        let identifier = Uuid::new_v4().to_string();
        let request = NotificationRequest {
            identifier: identifier.clone(),
            content,
            trigger: trigger.clone(),
        };

        let delay = trigger.as_ref().and_then(trigger_delay);
        match delay {
            None => self.inner.present(request).await,
            Some(delay) => {
                self.inner.state.lock().await.scheduled.push(request);
                let inner = self.inner.clone();
                let id = identifier.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let due = {
                        let mut state = inner.state.lock().await;
                        state
                            .scheduled
                            .iter()
                            .position(|r| r.identifier == id)
                            .map(|pos| state.scheduled.remove(pos))
                    };
                    if let Some(request) = due {
                        inner.present(request).await;
                    }
                });
            }
        }

        debug!(identifier = %identifier, "Local notification scheduled");
        Ok(identifier)
    }

    async fn cancel_scheduled(&self, identifier: &str) -> Result<()> {
        self.inner
            .state
            .lock()
            .await
            .scheduled
            .retain(|r| r.identifier != identifier);
        Ok(())
    }

    async fn scheduled(&self) -> Result<Vec<NotificationRequest>> {
        Ok(self.inner.state.lock().await.scheduled.clone())
    }

    async fn cancel_all_scheduled(&self) -> Result<()> {
        self.inner.state.lock().await.scheduled.clear();
        Ok(())
    }

    async fn dismiss_all(&self) -> Result<()> {
        self.inner.state.lock().await.presented.clear();
        Ok(())
    }

    fn received_events(&self) -> broadcast::Receiver<ReceivedNotification> {
        self.inner.received_tx.subscribe()
    }

    fn response_events(&self) -> broadcast::Receiver<NotificationResponse> {
        self.inner.response_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationData;

    fn content(title: &str) -> NotificationContent {
        NotificationContent {
            title: title.to_string(),
            body: "body".to_string(),
            data: NotificationData::new(),
            sound: Some("default".to_string()),
        }
    }

    #[tokio::test]
    async fn immediate_schedule_presents_and_emits() {
        let device = LocalDevice::new(LocalDeviceConfig::default());
        let mut events = device.received_events();

        let id = device.schedule(content("now"), None).await.unwrap();

        let received = events.recv().await.unwrap();
        assert_eq!(received.request.identifier, id);
        assert!(device.scheduled().await.unwrap().is_empty());
        assert_eq!(device.presented().await.len(), 1);
    }

    #[tokio::test]
    async fn delayed_schedule_stays_pending_until_cancelled() {
        let device = LocalDevice::new(LocalDeviceConfig::default());
        let trigger = NotificationTrigger {
            seconds: Some(3600),
            date: None,
            repeats: false,
        };

        let id = device.schedule(content("later"), Some(trigger)).await.unwrap();
        assert_eq!(device.scheduled().await.unwrap().len(), 1);

        device.cancel_scheduled(&id).await.unwrap();
        assert!(device.scheduled().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn permission_follows_configured_answer() {
        let device = LocalDevice::new(LocalDeviceConfig {
            grant_permission: false,
            ..Default::default()
        });

        assert_eq!(
            device.permission_status().await.unwrap(),
            PermissionStatus::Undetermined
        );
        assert_eq!(
            device.request_permission().await.unwrap(),
            PermissionStatus::Denied
        );
    }

    #[tokio::test]
    async fn respond_requires_a_presented_notification() {
        let device = LocalDevice::new(LocalDeviceConfig::default());
        let mut responses = device.response_events();

        assert!(device.respond("missing", "tap").await.is_err());

        let id = device.deliver(content("remote")).await;
        device.respond(&id, "tap").await.unwrap();

        let response = responses.recv().await.unwrap();
        assert_eq!(response.notification.request.identifier, id);
        assert_eq!(response.action_identifier, "tap");
    }
}
