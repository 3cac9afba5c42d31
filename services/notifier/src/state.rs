//! Application state shared across handlers

use std::sync::Arc;

use crate::{facade::NotificationFacade, identity::SessionIdentity};

#[derive(Clone)]
pub struct AppState {
    pub facade: NotificationFacade,
    pub identity: Arc<SessionIdentity>,
}
