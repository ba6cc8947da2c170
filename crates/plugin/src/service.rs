use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use quotebot_core::config::AppConfig;
use quotebot_core::errors::StoreError;
use quotebot_core::host::HostServices;
use quotebot_core::posting::{PostOutcome, PostTarget, RandomPoster};
use quotebot_core::roles;
use quotebot_core::settings::{
    validate_interval, BotSettings, IntervalRejection, SettingsHandle, SettingsUpdate,
};
use quotebot_core::store::QuoteStore;

use crate::commands::{CommandArgs, CommandRouteError, QuoteCommandService};
use crate::responses::{self, CommandResponse};

#[derive(Clone, Debug, PartialEq)]
pub struct QuotebotOptions {
    pub trigger: String,
    pub team_id: String,
    pub quotes_key: String,
    pub settings: BotSettings,
}

impl QuotebotOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            trigger: config.plugin.trigger.clone(),
            team_id: config.plugin.team_id.clone(),
            quotes_key: config.storage.quotes_key.clone(),
            settings: BotSettings::from_update(config.plugin.settings_update()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationReport {
    /// `None` when the persisted list could not be read; the store then starts empty.
    pub quotes_loaded: Option<usize>,
    pub channel_resolved: bool,
    pub user_resolved: bool,
}

/// Shared plugin state: the quote list, current settings, resolved post targets and the
/// random-post clock. One instance is shared by `Arc` across every host callback.
pub struct Quotebot {
    host: HostServices,
    store: QuoteStore,
    settings: SettingsHandle,
    targets: RwLock<PostTarget>,
    poster: RandomPoster,
    team_id: String,
    trigger: String,
}

impl Quotebot {
    pub fn new(host: HostServices, options: QuotebotOptions) -> Self {
        let store = QuoteStore::new(host.kv.clone(), options.quotes_key);
        Self {
            host,
            store,
            settings: SettingsHandle::new(options.settings),
            targets: RwLock::new(PostTarget::default()),
            poster: RandomPoster::new(),
            team_id: options.team_id,
            trigger: options.trigger,
        }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    pub async fn settings(&self) -> Arc<BotSettings> {
        self.settings.snapshot().await
    }

    pub async fn targets(&self) -> PostTarget {
        self.targets.read().await.clone()
    }

    pub async fn last_post(&self) -> Option<DateTime<Utc>> {
        self.poster.last_post().await
    }

    /// Loads quotes and resolves post targets. Failures are logged and leave the bot
    /// running with an empty list or unresolved targets.
    pub async fn activate(&self) -> ActivationReport {
        let quotes_loaded = match self.store.load().await {
            Ok(count) => Some(count),
            Err(error) => {
                warn!(
                    event_name = "plugin.activate.load_failed",
                    key = self.store.key(),
                    error = %error,
                    "unable to load quotes; starting empty"
                );
                None
            }
        };

        let targets = self.resolve_targets().await;
        ActivationReport {
            quotes_loaded,
            channel_resolved: targets.channel_id.is_some(),
            user_resolved: targets.user_id.is_some(),
        }
    }

    /// Re-resolves the channel and bot user named by the current settings.
    ///
    /// The `targets` lock is taken before settings are read and held until the result is
    /// stored, so a concurrent channel or user command cannot be overwritten with targets
    /// resolved from older settings.
    pub async fn resolve_targets(&self) -> PostTarget {
        let mut targets = self.targets.write().await;
        let settings = self.settings.snapshot().await;

        let channel_id =
            match self.host.channels.channel_by_name(&self.team_id, &settings.post_channel).await {
                Ok(channel) => Some(channel.id),
                Err(error) => {
                    warn!(
                        event_name = "plugin.targets.channel_unresolved",
                        team_id = %self.team_id,
                        post_channel = %settings.post_channel,
                        error = %error,
                        "post channel not found"
                    );
                    None
                }
            };

        let user_id = match self.host.identity.user_by_username(&settings.post_user).await {
            Ok(user) => Some(user.id),
            Err(error) => {
                warn!(
                    event_name = "plugin.targets.user_unresolved",
                    post_user = %settings.post_user,
                    error = %error,
                    "post user not found"
                );
                None
            }
        };

        let resolved = PostTarget { channel_id, user_id };
        *targets = resolved.clone();
        resolved
    }

    /// Installs host-pushed settings and re-resolves targets against them.
    pub async fn apply_configuration(&self, update: SettingsUpdate) -> Arc<BotSettings> {
        let installed = self.settings.replace(BotSettings::from_update(update)).await;
        info!(
            event_name = "plugin.configuration.applied",
            post_channel = %installed.post_channel,
            post_interval_minutes = installed.post_interval_minutes,
            post_user = %installed.post_user,
            "settings replaced"
        );
        self.resolve_targets().await;
        installed
    }

    /// Channel activity by anyone but the bot in the monitored channel may trigger a post.
    pub async fn on_channel_activity(
        &self,
        channel_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Option<PostOutcome> {
        let targets = self.targets().await;
        if targets.channel_id.as_deref() != Some(channel_id) {
            return None;
        }
        if targets.user_id.as_deref() == Some(user_id) {
            debug!(event_name = "plugin.activity.own_post", channel_id, "ignoring own activity");
            return None;
        }
        Some(self.post_random_with(&targets, now).await)
    }

    pub async fn post_random(&self, now: DateTime<Utc>) -> PostOutcome {
        let targets = self.targets().await;
        self.post_random_with(&targets, now).await
    }

    async fn post_random_with(&self, targets: &PostTarget, now: DateTime<Utc>) -> PostOutcome {
        let settings = self.settings.snapshot().await;
        self.poster
            .post_random(&self.store, &settings, targets, self.host.posts.as_ref(), now)
            .await
    }

    async fn caller_is_admin(&self, args: &CommandArgs) -> bool {
        roles::is_admin(self.host.identity.as_ref(), &args.user_id).await
    }
}

fn store_outcome<T>(
    result: Result<T, StoreError>,
    on_user_input: impl FnOnce(StoreError) -> CommandResponse,
) -> Result<Result<T, CommandResponse>, CommandRouteError> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(error) if error.is_user_input() => Ok(Err(on_user_input(error))),
        Err(error) => Err(error.into()),
    }
}

#[async_trait]
impl QuoteCommandService for Quotebot {
    async fn show_random(&self, args: &CommandArgs) -> Result<CommandResponse, CommandRouteError> {
        let Some(quote) = self.store.random().await else {
            return Ok(CommandResponse::ephemeral(responses::NO_QUOTES));
        };
        debug!(
            event_name = "plugin.command.show_random",
            correlation_id = %args.request_id,
            "random quote shown"
        );
        Ok(responses::quote_message(&quote))
    }

    async fn show_quote(
        &self,
        tail: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError> {
        let Ok(number) = tail.parse::<i64>() else {
            return self.show_help(args).await;
        };

        let count = self.store.len().await;
        if count == 0 {
            return Ok(CommandResponse::ephemeral(responses::NO_QUOTES));
        }
        match self.store.get(number).await {
            Some(quote) => Ok(responses::quote_message(&quote)),
            None => Ok(responses::quote_missing_message(number, count)),
        }
    }

    async fn add_quote(
        &self,
        text: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError> {
        let outcome = store_outcome(self.store.add(text).await, |_| {
            CommandResponse::ephemeral(responses::EMPTY_QUOTE)
        })?;
        let number = match outcome {
            Ok(number) => number,
            Err(response) => return Ok(response),
        };

        info!(
            event_name = "plugin.command.quote_added",
            correlation_id = %args.request_id,
            user_id = %args.user_id,
            number,
            "quote added"
        );
        Ok(responses::quote_added_message(text, number))
    }

    async fn delete_quote(
        &self,
        tail: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError> {
        if !self.caller_is_admin(args).await {
            return Ok(CommandResponse::ephemeral(responses::DELETE_NOT_ADMIN));
        }
        let Ok(number) = tail.parse::<i64>() else {
            return Ok(CommandResponse::ephemeral(responses::DELETE_NOT_A_NUMBER));
        };

        let outcome = store_outcome(self.store.delete_at(number).await, |_| {
            responses::delete_missing_message(number)
        })?;
        let remaining = match outcome {
            Ok(remaining) => remaining,
            Err(response) => return Ok(response),
        };

        info!(
            event_name = "plugin.command.quote_deleted",
            correlation_id = %args.request_id,
            user_id = %args.user_id,
            number,
            remaining,
            "quote deleted"
        );
        Ok(responses::quote_deleted_message(number, remaining))
    }

    async fn list_quotes(&self, args: &CommandArgs) -> Result<CommandResponse, CommandRouteError> {
        if !self.caller_is_admin(args).await {
            return Ok(CommandResponse::ephemeral(responses::LIST_NOT_ADMIN));
        }
        Ok(responses::quote_list_message(&self.store.snapshot().await))
    }

    async fn show_help(&self, args: &CommandArgs) -> Result<CommandResponse, CommandRouteError> {
        let is_admin = self.caller_is_admin(args).await;
        Ok(responses::help_message(&self.trigger, is_admin))
    }

    async fn show_info(&self, args: &CommandArgs) -> Result<CommandResponse, CommandRouteError> {
        let is_admin = self.caller_is_admin(args).await;
        let count = self.store.len().await;
        let settings = self.settings.snapshot().await;

        let channel = match self.targets().await.channel_id {
            Some(channel_id) => self.host.channels.channel(&channel_id).await.ok(),
            None => None,
        };
        let monitoring = channel
            .as_ref()
            .map(|channel| (channel.display_name.as_str(), settings.post_interval_minutes));

        Ok(responses::info_message(is_admin, count, monitoring))
    }

    async fn set_channel(
        &self,
        name: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError> {
        if !self.caller_is_admin(args).await {
            return Ok(CommandResponse::ephemeral(responses::CHANNEL_NOT_ADMIN));
        }
        let name = name.strip_prefix('~').unwrap_or(name);
        if name.is_empty() {
            return Ok(CommandResponse::ephemeral(responses::CHANNEL_MISSING));
        }

        let channel = match self.host.channels.channel_by_name(&args.team_id, name).await {
            Ok(channel) => channel,
            Err(error) => {
                debug!(
                    event_name = "plugin.command.channel_unknown",
                    correlation_id = %args.request_id,
                    error = %error,
                    "channel lookup failed"
                );
                return Ok(responses::channel_unknown_message(name));
            }
        };

        let display_name = channel.display_name.clone();
        let mut targets = self.targets.write().await;
        self.settings.update(|current| current.with_post_channel(display_name)).await;
        targets.channel_id = Some(channel.id.clone());
        drop(targets);
        info!(
            event_name = "plugin.command.channel_set",
            correlation_id = %args.request_id,
            channel_id = %channel.id,
            "monitored channel changed"
        );
        Ok(responses::channel_set_message(&channel.display_name))
    }

    async fn set_interval(
        &self,
        tail: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError> {
        if !self.caller_is_admin(args).await {
            return Ok(CommandResponse::ephemeral(responses::INTERVAL_NOT_ADMIN));
        }
        let Ok(minutes) = tail.parse::<i64>() else {
            return Ok(CommandResponse::ephemeral(responses::INTERVAL_NOT_A_NUMBER));
        };

        let interval = match validate_interval(minutes) {
            Ok(interval) => interval,
            Err(IntervalRejection::TooShort) => {
                return Ok(CommandResponse::ephemeral(responses::INTERVAL_TOO_SHORT))
            }
            Err(IntervalRejection::TooLong) => {
                return Ok(CommandResponse::ephemeral(responses::INTERVAL_TOO_LONG))
            }
        };

        self.settings.update(|current| current.with_post_interval(interval)).await;
        info!(
            event_name = "plugin.command.interval_set",
            correlation_id = %args.request_id,
            minutes,
            "post interval changed"
        );
        Ok(responses::interval_set_message(minutes))
    }

    async fn set_user(
        &self,
        username: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError> {
        if !self.caller_is_admin(args).await {
            return Ok(CommandResponse::ephemeral(responses::USER_NOT_ADMIN));
        }
        let username = username.strip_prefix('@').unwrap_or(username);
        if username.is_empty() {
            return Ok(CommandResponse::ephemeral(responses::USER_MISSING));
        }

        let Ok(user) = self.host.identity.user_by_username(username).await else {
            return Ok(responses::user_unknown_message(username));
        };

        let mut targets = self.targets.write().await;
        self.settings.update(|current| current.with_post_user(user.username.clone())).await;
        targets.user_id = Some(user.id.clone());
        drop(targets);
        info!(
            event_name = "plugin.command.user_set",
            correlation_id = %args.request_id,
            post_user_id = %user.id,
            "post user changed"
        );
        Ok(responses::user_set_message(&user.username))
    }
}
