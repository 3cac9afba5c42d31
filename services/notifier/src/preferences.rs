//! User preferences persisted in the device key-value store
//!
//! Stored under [`PREFERENCES_KEY`] as a versioned envelope
//! `{"state": {"preferences": {...}}, "version": 1}`. Version 0 blobs predate
//! some fields and are merged over the defaults when read.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::kv::KeyValueStore;

pub const PREFERENCES_KEY: &str = "user-preferences";

const PREFERENCES_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "MXN")]
    Mxn,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Es,
    En,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub dark_mode: bool,
    pub currency: Currency,
    pub language: Language,
    pub notifications_enabled: bool,
    pub auto_backup: bool,
    pub biometric_auth: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            currency: Currency::Mxn,
            language: Language::Es,
            notifications_enabled: true,
            auto_backup: true,
            biometric_auth: false,
        }
    }
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub dark_mode: Option<bool>,
    pub currency: Option<Currency>,
    pub language: Option<Language>,
    pub notifications_enabled: Option<bool>,
    pub auto_backup: Option<bool>,
    pub biometric_auth: Option<bool>,
}

impl Preferences {
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(v) = update.dark_mode {
            self.dark_mode = v;
        }
        if let Some(v) = update.currency {
            self.currency = v;
        }
        if let Some(v) = update.language {
            self.language = v;
        }
        if let Some(v) = update.notifications_enabled {
            self.notifications_enabled = v;
        }
        if let Some(v) = update.auto_backup {
            self.auto_backup = v;
        }
        if let Some(v) = update.biometric_auth {
            self.biometric_auth = v;
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredState<P> {
    preferences: P,
}

#[derive(Serialize, Deserialize)]
struct Stored<P> {
    state: StoredState<P>,
    #[serde(default)]
    version: u32,
}

/// Decode a stored blob, migrating older versions
fn decode(raw: &str) -> Result<Preferences> {
    let stored: Stored<Value> = serde_json::from_str(raw)?;

    let preferences = if stored.version < PREFERENCES_VERSION {
        let mut merged = match serde_json::to_value(Preferences::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(persisted) = stored.state.preferences {
            merged.extend(persisted);
        }
        info!(from = stored.version, to = PREFERENCES_VERSION, "Migrated stored preferences");
        serde_json::from_value(Value::Object(merged))?
    } else {
        serde_json::from_value(stored.state.preferences)?
    };

    Ok(preferences)
}

fn encode(preferences: &Preferences) -> Result<String> {
    Ok(serde_json::to_string(&Stored {
        state: StoredState { preferences },
        version: PREFERENCES_VERSION,
    })?)
}

/// Preferences access over a [`KeyValueStore`]
#[derive(Clone)]
pub struct PreferencesStore {
    kv: Arc<dyn KeyValueStore>,
}

impl PreferencesStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Stored preferences; defaults when nothing is stored or the blob is
    /// unreadable
    pub async fn load(&self) -> Result<Preferences> {
        let Some(raw) = self.kv.get_item(PREFERENCES_KEY).await? else {
            return Ok(Preferences::default());
        };

        Ok(decode(&raw).unwrap_or_else(|e| {
            error!(error = %e, "Error loading preferences");
            Preferences::default()
        }))
    }

    async fn save(&self, preferences: &Preferences) -> Result<()> {
        self.kv.set_item(PREFERENCES_KEY, &encode(preferences)?).await
    }

    /// Merge `update` over the stored preferences and persist the result
    pub async fn set(&self, update: PreferencesUpdate) -> Result<Preferences> {
        let mut preferences = self.load().await?;
        preferences.apply(update);
        self.save(&preferences).await?;
        Ok(preferences)
    }

    pub async fn toggle_dark_mode(&self) -> Result<Preferences> {
        let mut preferences = self.load().await?;
        preferences.dark_mode = !preferences.dark_mode;
        self.save(&preferences).await?;
        Ok(preferences)
    }

    /// Drop the stored blob; subsequent loads return the defaults
    pub async fn reset(&self) -> Result<Preferences> {
        self.kv.remove_item(PREFERENCES_KEY).await?;
        Ok(Preferences::default())
    }
}
