//! Session facade over the notification manager
//!
//! Tracks session state (initialization, token, last notification, user),
//! follows identity transitions and turns every manager outcome into a
//! [`NotificationResult`]. Errors never escape a facade call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{NotifierError, NotifierResult},
    gateway::PushTicket,
    identity::{AuthEvent, AuthUser, IdentityProvider},
    listeners::ListenerHandle,
    manager::NotificationManager,
    models::{
        NotificationData, NotificationHistory, NotificationRequest, NotificationResponse,
        ReceivedNotification, TokenStats,
    },
    preferences::{Preferences, PreferencesUpdate},
};

/// Snapshot of the facade's session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_initialized: bool,
    pub expo_push_token: Option<String>,
    pub last_notification: Option<ReceivedNotification>,
    pub last_response: Option<NotificationResponse>,
    pub user: Option<AuthUser>,
}

/// Uniform outcome of a facade call
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<PushTicket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<PushTicket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Vec<NotificationRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<NotificationHistory>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TokenStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl NotificationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    fn with_preferences(outcome: anyhow::Result<Preferences>) -> Self {
        match outcome {
            Ok(preferences) => Self {
                preferences: Some(preferences),
                ..Self::ok()
            },
            Err(e) => {
                error!(error = %e, "Preferences storage failed");
                Self::failed(NotifierError::LocalStorage(e.to_string()))
            }
        }
    }

    fn from_outcome<T>(
        outcome: NotifierResult<T>,
        fill: impl FnOnce(Self, T) -> Self,
    ) -> Self {
        match outcome {
            Ok(value) => fill(Self::ok(), value),
            Err(e) => Self::failed(e),
        }
    }
}

#[derive(Clone)]
pub struct NotificationFacade {
    manager: Arc<NotificationManager>,
    identity: Arc<dyn IdentityProvider>,
    state: Arc<Mutex<SessionState>>,
}

/// Live subscriptions held while the facade is mounted.
///
/// Dropping the guard ends the identity subscription, unsubscribes the
/// notification callbacks and stops the manager's device listeners.
pub struct MountGuard {
    auth_task: JoinHandle<()>,
    _received: ListenerHandle,
    _response: ListenerHandle,
    manager: Arc<NotificationManager>,
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.auth_task.abort();
        self.manager.dispose();
    }
}

impl NotificationFacade {
    pub fn new(manager: Arc<NotificationManager>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            manager,
            identity,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// Read the identity, initialize the manager and start following
    /// identity and notification events
    pub async fn mount(&self) -> MountGuard {
        let user = self.identity.current_user().await;
        self.lock_state().user = user;

        // Subscribe before initializing so no transition is missed.
        let auth_events = self.identity.subscribe();

        let state = self.state.clone();
        let received = self.manager.on_notification_received(move |notification| {
            info!(identifier = %notification.request.identifier, "Notification received");
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last_notification = Some(notification.clone());
        });
        let state = self.state.clone();
        let response = self.manager.on_notification_response(move |response| {
            info!(action = %response.action_identifier, "Notification response");
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last_response = Some(response.clone());
        });

        match self.manager.initialize().await {
            Ok(token) => {
                let mut state = self.lock_state();
                state.expo_push_token = token;
                state.is_initialized = true;
            }
            Err(e) => error!(error = %e, "Failed to initialize notifications"),
        }

        let auth_task = tokio::spawn(follow_identity(
            auth_events,
            self.manager.clone(),
            self.state.clone(),
        ));

        MountGuard {
            auth_task,
            _received: received,
            _response: response,
            manager: self.manager.clone(),
        }
    }

    pub async fn send_local_notification(
        &self,
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotificationResult {
        let outcome = self.manager.send_local_notification(title, body, data).await;
        NotificationResult::from_outcome(outcome, |r, id| NotificationResult {
            notification_id: Some(id),
            ..r
        })
    }

    pub async fn send_push_notification(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotificationResult {
        let outcome = self
            .manager
            .send_push_notification(token, title, body, data)
            .await;
        NotificationResult::from_outcome(outcome, |r, tickets| NotificationResult {
            result: Some(tickets),
            ..r
        })
    }

    pub async fn send_bulk_notifications(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotificationResult {
        let outcome = self
            .manager
            .send_bulk_notifications(tokens, title, body, data)
            .await;
        NotificationResult::from_outcome(outcome, |r, tickets| NotificationResult {
            results: Some(tickets),
            ..r
        })
    }

    pub async fn send_notification_to_users(
        &self,
        user_ids: &[Uuid],
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotificationResult {
        let outcome = self
            .manager
            .send_notification_to_users(user_ids, title, body, data)
            .await;
        NotificationResult::from_outcome(outcome, |r, tickets| NotificationResult {
            results: Some(tickets),
            ..r
        })
    }

    pub async fn send_broadcast_notification(
        &self,
        title: &str,
        body: &str,
        data: &NotificationData,
    ) -> NotificationResult {
        let outcome = self
            .manager
            .send_broadcast_notification(title, body, data)
            .await;
        NotificationResult::from_outcome(outcome, |r, tickets| NotificationResult {
            results: Some(tickets),
            ..r
        })
    }

    pub async fn schedule_notification(
        &self,
        title: &str,
        body: &str,
        seconds: u64,
        data: &NotificationData,
    ) -> NotificationResult {
        let outcome = self
            .manager
            .schedule_notification(title, body, seconds, data)
            .await;
        NotificationResult::from_outcome(outcome, |r, id| NotificationResult {
            notification_id: Some(id),
            ..r
        })
    }

    pub async fn cancel_scheduled_notification(&self, identifier: &str) -> NotificationResult {
        let outcome = self.manager.cancel_scheduled_notification(identifier).await;
        NotificationResult::from_outcome(outcome, |r, ()| r)
    }

    pub async fn get_all_scheduled_notifications(&self) -> NotificationResult {
        NotificationResult {
            notifications: Some(self.manager.get_all_scheduled_notifications().await),
            ..NotificationResult::ok()
        }
    }

    pub async fn clear_all_notifications(&self) -> NotificationResult {
        self.manager.clear_all_notifications().await;
        NotificationResult::ok()
    }

    pub async fn get_notification_history(&self, limit: i64) -> NotificationResult {
        NotificationResult {
            history: Some(self.manager.get_notification_history(limit).await),
            ..NotificationResult::ok()
        }
    }

    pub async fn get_all_active_tokens(&self) -> NotificationResult {
        NotificationResult {
            tokens: Some(self.manager.get_all_active_tokens().await),
            ..NotificationResult::ok()
        }
    }

    pub async fn get_user_tokens(&self, user_ids: &[Uuid]) -> NotificationResult {
        NotificationResult {
            tokens: Some(self.manager.get_user_tokens(user_ids).await),
            ..NotificationResult::ok()
        }
    }

    pub async fn deactivate_current_token(&self) -> NotificationResult {
        self.manager.deactivate_current_token().await;
        NotificationResult::ok()
    }

    pub async fn cleanup_inactive_tokens(&self, days_old: u32) -> NotificationResult {
        NotificationResult {
            deleted_count: Some(self.manager.cleanup_inactive_tokens(days_old).await),
            ..NotificationResult::ok()
        }
    }

    pub async fn get_token_stats(&self) -> NotificationResult {
        NotificationResult {
            stats: Some(self.manager.get_token_stats_by_platform().await),
            ..NotificationResult::ok()
        }
    }

    pub async fn are_notifications_enabled(&self) -> NotificationResult {
        NotificationResult {
            enabled: Some(self.manager.are_notifications_enabled().await),
            ..NotificationResult::ok()
        }
    }

    pub async fn request_notification_permissions(&self) -> NotificationResult {
        NotificationResult {
            enabled: Some(self.manager.request_notification_permissions().await),
            ..NotificationResult::ok()
        }
    }

    pub async fn get_stored_token(&self) -> NotificationResult {
        NotificationResult {
            token: self.manager.get_stored_token().await,
            ..NotificationResult::ok()
        }
    }

    pub async fn get_preferences(&self) -> NotificationResult {
        NotificationResult::with_preferences(self.manager.preferences().load().await)
    }

    /// Merge a partial update over the stored preferences
    pub async fn set_preferences(&self, update: PreferencesUpdate) -> NotificationResult {
        NotificationResult::with_preferences(self.manager.preferences().set(update).await)
    }

    pub async fn reset_preferences(&self) -> NotificationResult {
        NotificationResult::with_preferences(self.manager.preferences().reset().await)
    }

    pub async fn toggle_dark_mode(&self) -> NotificationResult {
        NotificationResult::with_preferences(self.manager.preferences().toggle_dark_mode().await)
    }
}

async fn follow_identity(
    mut events: broadcast::Receiver<AuthEvent>,
    manager: Arc<NotificationManager>,
    state: Arc<Mutex<SessionState>>,
) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(user)) => {
                state.lock().unwrap_or_else(PoisonError::into_inner).user = Some(user);
                if let Err(e) = manager.save_token().await {
                    error!(error = %e, "Failed to save token after sign-in");
                }
            }
            Ok(AuthEvent::SignedOut) => {
                let previous = state.lock().unwrap_or_else(PoisonError::into_inner).user.take();
                if let Some(user) = previous {
                    manager.deactivate_token_for(user.id).await;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Identity events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
