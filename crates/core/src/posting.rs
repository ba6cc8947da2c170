use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::HostError;
use crate::host::{NewPost, PostCreator};
use crate::settings::BotSettings;
use crate::store::QuoteStore;

pub const FALLBACK_QUOTE: &str = "There is no void if you don't try to fill it. -- Marty Rubin";

/// Resolved identifiers random quotes are posted to and as.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostTarget {
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PostOutcome {
    Posted { channel_id: String, message: String },
    TooSoon { elapsed_minutes: f64 },
    NoChannel,
    Failed(HostError),
}

#[derive(Debug, Default)]
pub struct RandomPoster {
    last_post: Mutex<Option<DateTime<Utc>>>,
}

impl RandomPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_post(&self) -> Option<DateTime<Utc>> {
        *self.last_post.lock().await
    }

    pub async fn post_random(
        &self,
        store: &QuoteStore,
        settings: &BotSettings,
        target: &PostTarget,
        posts: &dyn PostCreator,
        now: DateTime<Utc>,
    ) -> PostOutcome {
        let Some(channel_id) = target.channel_id.clone() else {
            debug!(event_name = "plugin.post_random.no_channel", "monitored channel unresolved");
            return PostOutcome::NoChannel;
        };

        {
            let mut last_post = self.last_post.lock().await;
            if let Some(previous) = *last_post {
                let elapsed_minutes = (now - previous).num_milliseconds() as f64 / 60_000.0;
                if elapsed_minutes < settings.post_interval_minutes {
                    return PostOutcome::TooSoon { elapsed_minutes };
                }
            }
            *last_post = Some(now);
        }

        let message = store.random().await.unwrap_or_else(|| FALLBACK_QUOTE.to_owned());
        let post =
            NewPost { channel_id: channel_id.clone(), user_id: target.user_id.clone(), message };
        let message = post.message.clone();

        match posts.create_post(post).await {
            Ok(()) => {
                info!(
                    event_name = "plugin.post_random.posted",
                    channel_id = %channel_id,
                    "random quote posted"
                );
                PostOutcome::Posted { channel_id, message }
            }
            Err(error) => {
                warn!(
                    event_name = "plugin.post_random.failed",
                    channel_id = %channel_id,
                    error = %error,
                    "random quote post failed"
                );
                PostOutcome::Failed(error)
            }
        }
    }
}
