//! Records and payloads shared by the notifier modules

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form key/value payload attached to a notification
pub type NotificationData = serde_json::Map<String, serde_json::Value>;

/// Platform a push token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            other => anyhow::bail!("unknown platform: {}", other),
        }
    }
}

/// Hardware and OS metadata stored alongside a token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub platform_api_level: Option<i32>,
}

/// Row of the `push_tokens` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub device_info: Option<DeviceInfo>,
    pub platform: Platform,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything written for a token when a device registers
#[derive(Debug, Clone)]
pub struct TokenRegistration {
    pub user_id: Uuid,
    pub token: String,
    pub device_info: DeviceInfo,
    pub platform: Platform,
}

/// Row of the `notification_history` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationHistory {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub data: Option<NotificationData>,
    pub target_tokens: Vec<String>,
    pub sent_count: i32,
    pub failed_count: i32,
    pub sent_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// History row about to be appended
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub title: String,
    pub body: String,
    pub data: NotificationData,
    pub target_tokens: Vec<String>,
    pub sent_count: i32,
    pub failed_count: i32,
    pub sent_by: Option<Uuid>,
}

/// Active token counts per platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenStats {
    pub ios: u64,
    pub android: u64,
    pub web: u64,
}

impl TokenStats {
    pub fn from_platforms(platforms: impl IntoIterator<Item = Platform>) -> Self {
        platforms
            .into_iter()
            .fold(TokenStats::default(), |mut stats, platform| {
                match platform {
                    Platform::Ios => stats.ios += 1,
                    Platform::Android => stats.android += 1,
                    Platform::Web => stats.web += 1,
                }
                stats
            })
    }
}

/// Displayable content of a local notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: NotificationData,
    pub sound: Option<String>,
}

/// When a scheduled notification fires. `None` at the call site means now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTrigger {
    pub seconds: Option<u64>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repeats: bool,
}

/// A notification handed to the device scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub identifier: String,
    pub content: NotificationContent,
    pub trigger: Option<NotificationTrigger>,
}

/// A notification delivered while the app was in the foreground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedNotification {
    pub date: DateTime<Utc>,
    pub request: NotificationRequest,
}

/// The user's interaction with a delivered notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub notification: ReceivedNotification,
    pub action_identifier: String,
    pub user_text: Option<String>,
}

/// Action identifier reported when the notification body itself is tapped
pub const DEFAULT_ACTION_IDENTIFIER: &str = "expo.modules.notifications.actions.DEFAULT";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        for platform in [Platform::Ios, Platform::Android, Platform::Web] {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert!("blackberry".parse::<Platform>().is_err());
    }

    #[test]
    fn device_info_uses_camel_case_keys() {
        let info = DeviceInfo {
            model_name: Some("Pixel 8".to_string()),
            platform_api_level: Some(34),
            ..Default::default()
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["modelName"], "Pixel 8");
        assert_eq!(json["platformApiLevel"], 34);
    }

    #[test]
    fn token_stats_count_each_platform() {
        let stats = TokenStats::from_platforms([
            Platform::Ios,
            Platform::Android,
            Platform::Android,
            Platform::Web,
        ]);

        assert_eq!(
            stats,
            TokenStats {
                ios: 1,
                android: 2,
                web: 1
            }
        );
    }
}
