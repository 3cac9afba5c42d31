//! Notifier settings, read from `NOTIFIER_*` environment variables

use config::ConfigError;
use serde::Deserialize;

use crate::{
    device::LocalDeviceConfig,
    gateway::EXPO_PUSH_URL,
    models::Platform,
};

/// Where the device-local token cache lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub gateway_url: String,
    pub kv_backend: KvBackend,
    /// Use Postgres for push tokens and history; in-memory otherwise
    pub use_database: bool,
    pub device_platform: Platform,
    pub device_physical: bool,
    pub device_grant_permission: bool,
    /// Fixed push token for the device session; generated when absent
    pub device_push_token: Option<String>,
    /// Six-field cron expression; an empty string disables the job
    pub cleanup_schedule: String,
    pub retention_days: u32,
}

const DEFAULTS: &[(&str, &str)] = &[
    ("bind_addr", "0.0.0.0:3002"),
    ("gateway_url", EXPO_PUSH_URL),
    ("kv_backend", "memory"),
    ("use_database", "true"),
    ("device_platform", "android"),
    ("device_physical", "true"),
    ("device_grant_permission", "true"),
    ("cleanup_schedule", "0 0 3 * * *"),
    ("retention_days", "30"),
];

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        common::settings::load("NOTIFIER", DEFAULTS)
    }

    pub fn cleanup_enabled(&self) -> bool {
        !self.cleanup_schedule.trim().is_empty()
    }

    pub fn device_config(&self) -> LocalDeviceConfig {
        let defaults = LocalDeviceConfig::default();
        LocalDeviceConfig {
            platform: self.device_platform,
            physical: self.device_physical,
            grant_permission: self.device_grant_permission,
            push_token: self.device_push_token.clone().or(defaults.push_token),
            info: defaults.info,
        }
    }
}
