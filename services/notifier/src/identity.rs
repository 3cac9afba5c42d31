//! Authenticated identity provider
//!
//! Answers "who is signed in" and publishes sign-in/sign-out transitions.
//! [`SessionIdentity`] keeps the identity in process and is driven by the
//! session endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Option<AuthUser>;

    /// Identity transitions from now on
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

pub struct SessionIdentity {
    current: RwLock<Option<AuthUser>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: RwLock::new(None),
            events,
        }
    }

    pub async fn sign_in(&self, user: AuthUser) {
        info!(user_id = %user.id, "User signed in");
        *self.current.write().await = Some(user.clone());
        let _ = self.events.send(AuthEvent::SignedIn(user));
    }

    pub async fn sign_out(&self) {
        let previous = self.current.write().await.take();
        if let Some(user) = previous {
            info!(user_id = %user.id, "User signed out");
        }
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentity {
    async fn current_user(&self) -> Option<AuthUser> {
        self.current.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
