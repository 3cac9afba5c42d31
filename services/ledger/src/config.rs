//! Ledger settings, read from `LEDGER_*` environment variables

use config::ConfigError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    /// Use Postgres; in-memory otherwise
    pub use_database: bool,
}

const DEFAULTS: &[(&str, &str)] = &[("bind_addr", "0.0.0.0:3001"), ("use_database", "true")];

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        common::settings::load("LEDGER", DEFAULTS)
    }
}
