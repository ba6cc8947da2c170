//! Bot settings with clone-on-write replacement.
//!
//! Readers take an `Arc` snapshot that is never mutated; writers build a new
//! [`BotSettings`] and swap it in under the exclusive lock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub const DEFAULT_POST_INTERVAL_MINUTES: f64 = 15.0;
pub const MIN_POST_INTERVAL_MINUTES: i64 = 15;
pub const MAX_POST_INTERVAL_MINUTES: i64 = 10_080;
pub const DEFAULT_POST_CHANNEL: &str = "town-square";
pub const DEFAULT_POST_USER: &str = "quotebot";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BotSettings {
    pub post_interval_minutes: f64,
    pub post_channel: String,
    pub post_user: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            post_interval_minutes: DEFAULT_POST_INTERVAL_MINUTES,
            post_channel: DEFAULT_POST_CHANNEL.to_owned(),
            post_user: DEFAULT_POST_USER.to_owned(),
        }
    }
}

/// Partial settings pushed by the host or read from configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub post_interval_minutes: Option<f64>,
    #[serde(default)]
    pub post_channel: Option<String>,
    #[serde(default)]
    pub post_user: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalRejection {
    TooShort,
    TooLong,
}

impl BotSettings {
    /// Zero and empty values fall back to defaults; the interval is clamped into range.
    pub fn from_update(update: SettingsUpdate) -> Self {
        let defaults = Self::default();
        let post_interval_minutes = match update.post_interval_minutes {
            Some(minutes) if minutes.is_finite() && minutes > 0.0 => minutes
                .clamp(MIN_POST_INTERVAL_MINUTES as f64, MAX_POST_INTERVAL_MINUTES as f64),
            _ => defaults.post_interval_minutes,
        };

        Self {
            post_interval_minutes,
            post_channel: non_blank(update.post_channel).unwrap_or(defaults.post_channel),
            post_user: non_blank(update.post_user).unwrap_or(defaults.post_user),
        }
    }

    pub fn with_post_channel(&self, channel: impl Into<String>) -> Self {
        Self { post_channel: channel.into(), ..self.clone() }
    }

    pub fn with_post_interval(&self, minutes: f64) -> Self {
        Self { post_interval_minutes: minutes, ..self.clone() }
    }

    pub fn with_post_user(&self, username: impl Into<String>) -> Self {
        Self { post_user: username.into(), ..self.clone() }
    }
}

pub fn validate_interval(minutes: i64) -> Result<f64, IntervalRejection> {
    if minutes < MIN_POST_INTERVAL_MINUTES {
        return Err(IntervalRejection::TooShort);
    }
    if minutes > MAX_POST_INTERVAL_MINUTES {
        return Err(IntervalRejection::TooLong);
    }
    Ok(minutes as f64)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub struct SettingsHandle {
    current: RwLock<Arc<BotSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: BotSettings) -> Self {
        Self { current: RwLock::new(Arc::new(settings)) }
    }

    pub async fn snapshot(&self) -> Arc<BotSettings> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, settings: BotSettings) -> Arc<BotSettings> {
        let replacement = Arc::new(settings);
        let mut current = self.current.write().await;
        *current = replacement.clone();
        replacement
    }

    /// Derives the replacement from the value current at the time the write lock is held.
    pub async fn update<F>(&self, change: F) -> Arc<BotSettings>
    where
        F: FnOnce(&BotSettings) -> BotSettings,
    {
        let mut current = self.current.write().await;
        let replacement = Arc::new(change(&current));
        *current = replacement.clone();
        replacement
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(BotSettings::default())
    }
}
