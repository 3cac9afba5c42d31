//! Application state shared across handlers

use std::sync::Arc;

use crate::repositories::LedgerRepository;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerRepository>,
}
