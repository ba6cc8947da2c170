use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use quotebot_core::errors::{ApplicationError, InterfaceError};
use quotebot_core::posting::PostOutcome;
use quotebot_core::settings::SettingsUpdate;

use crate::{
    commands::{CommandArgs, CommandRouteError, CommandRouter, QuoteCommandService},
    responses::CommandResponse,
    service::Quotebot,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostEnvelope {
    pub envelope_id: String,
    pub event: HostEvent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    SlashCommand(CommandArgs),
    MessagePosted(ChannelActivity),
    UserJoinedChannel(ChannelActivity),
    UserLeftChannel(ChannelActivity),
    ConfigurationChanged(SettingsUpdate),
    #[serde(other)]
    Unsupported,
}

impl HostEvent {
    pub fn event_type(&self) -> HostEventType {
        match self {
            Self::SlashCommand(_) => HostEventType::SlashCommand,
            Self::MessagePosted(_) => HostEventType::MessagePosted,
            Self::UserJoinedChannel(_) => HostEventType::UserJoinedChannel,
            Self::UserLeftChannel(_) => HostEventType::UserLeftChannel,
            Self::ConfigurationChanged(_) => HostEventType::ConfigurationChanged,
            Self::Unsupported => HostEventType::Unsupported,
        }
    }

    pub fn activity(&self) -> Option<&ChannelActivity> {
        match self {
            Self::MessagePosted(activity)
            | Self::UserJoinedChannel(activity)
            | Self::UserLeftChannel(activity) => Some(activity),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostEventType {
    SlashCommand,
    MessagePosted,
    UserJoinedChannel,
    UserLeftChannel,
    ConfigurationChanged,
    Unsupported,
}

impl HostEventType {
    pub const CHANNEL_ACTIVITY: [HostEventType; 3] =
        [Self::MessagePosted, Self::UserJoinedChannel, Self::UserLeftChannel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlashCommand => "slash_command",
            Self::MessagePosted => "message_posted",
            Self::UserJoinedChannel => "user_joined_channel",
            Self::UserLeftChannel => "user_left_channel",
            Self::ConfigurationChanged => "configuration_changed",
            Self::Unsupported => "unsupported",
        }
    }
}

/// A post, join or leave in some channel. `user_id` is the author or the member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelActivity {
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(CommandResponse),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl DispatchError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let application = match self {
            Self::Handler(EventHandlerError::Route(error)) => ApplicationError::from(error),
        };
        application.into_interface(correlation_id)
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> HostEventType;
    async fn handle(
        &self,
        envelope: &HostEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<HostEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &HostEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            debug!(
                event_name = "plugin.dispatch.unhandled",
                correlation_id = %ctx.correlation_id,
                event_type = envelope.event.event_type().as_str(),
                "no handler registered"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers every handler the bot understands against one shared state value.
pub fn quotebot_dispatcher(
    bot: Arc<Quotebot>,
    router: Arc<CommandRouter<Quotebot>>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(router));
    for kind in HostEventType::CHANNEL_ACTIVITY {
        dispatcher.register(ChannelActivityHandler::new(kind, bot.clone()));
    }
    dispatcher.register(ConfigurationChangedHandler::new(bot));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: Arc<CommandRouter<S>>,
}

impl<S> SlashCommandHandler<S>
where
    S: QuoteCommandService,
{
    pub fn new(router: Arc<CommandRouter<S>>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: QuoteCommandService + 'static,
{
    fn event_type(&self) -> HostEventType {
        HostEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &HostEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let HostEvent::SlashCommand(args) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(match self.router.route(args).await? {
            Some(response) => HandlerResult::Responded(response),
            None => HandlerResult::Ignored,
        })
    }
}

#[async_trait]
pub trait ActivityService: Send + Sync {
    async fn channel_activity(
        &self,
        activity: &ChannelActivity,
        ctx: &EventContext,
    ) -> Option<PostOutcome>;
}

#[async_trait]
impl ActivityService for Quotebot {
    async fn channel_activity(
        &self,
        activity: &ChannelActivity,
        ctx: &EventContext,
    ) -> Option<PostOutcome> {
        let outcome =
            self.on_channel_activity(&activity.channel_id, &activity.user_id, Utc::now()).await;
        debug!(
            event_name = "plugin.activity.handled",
            correlation_id = %ctx.correlation_id,
            channel_id = %activity.channel_id,
            outcome = ?outcome,
            "channel activity handled"
        );
        outcome
    }
}

pub struct ChannelActivityHandler<S> {
    kind: HostEventType,
    service: Arc<S>,
}

impl<S> ChannelActivityHandler<S>
where
    S: ActivityService,
{
    pub fn new(kind: HostEventType, service: Arc<S>) -> Self {
        Self { kind, service }
    }
}

#[async_trait]
impl<S> EventHandler for ChannelActivityHandler<S>
where
    S: ActivityService + 'static,
{
    fn event_type(&self) -> HostEventType {
        self.kind
    }

    async fn handle(
        &self,
        envelope: &HostEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(activity) = envelope.event.activity() else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(match self.service.channel_activity(activity, ctx).await {
            Some(_) => HandlerResult::Processed,
            None => HandlerResult::Ignored,
        })
    }
}

#[async_trait]
pub trait ConfigurationService: Send + Sync {
    async fn configuration_changed(&self, update: &SettingsUpdate, ctx: &EventContext);
}

#[async_trait]
impl ConfigurationService for Quotebot {
    async fn configuration_changed(&self, update: &SettingsUpdate, ctx: &EventContext) {
        debug!(
            event_name = "plugin.configuration.received",
            correlation_id = %ctx.correlation_id,
            "configuration change received"
        );
        self.apply_configuration(update.clone()).await;
    }
}

pub struct ConfigurationChangedHandler<S> {
    service: Arc<S>,
}

impl<S> ConfigurationChangedHandler<S>
where
    S: ConfigurationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ConfigurationChangedHandler<S>
where
    S: ConfigurationService + 'static,
{
    fn event_type(&self) -> HostEventType {
        HostEventType::ConfigurationChanged
    }

    async fn handle(
        &self,
        envelope: &HostEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let HostEvent::ConfigurationChanged(update) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.configuration_changed(update, ctx).await;
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use quotebot_core::errors::{InterfaceError, StoreError};
    use quotebot_core::posting::PostOutcome;
    use quotebot_core::settings::SettingsUpdate;

    use super::{
        ActivityService, ChannelActivity, ChannelActivityHandler, ConfigurationChangedHandler,
        ConfigurationService, DispatchError, EventContext, EventDispatcher, EventHandlerError,
        HandlerResult, HostEnvelope, HostEvent, HostEventType,
    };
    use crate::commands::CommandRouteError;

    #[derive(Default)]
    struct RecordingActivity {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActivityService for RecordingActivity {
        async fn channel_activity(
            &self,
            activity: &ChannelActivity,
            _ctx: &EventContext,
        ) -> Option<PostOutcome> {
            self.seen.lock().expect("lock").push(activity.channel_id.clone());
            (activity.channel_id == "C-town").then_some(PostOutcome::NoChannel)
        }
    }

    #[derive(Default)]
    struct RecordingConfiguration {
        updates: Mutex<Vec<SettingsUpdate>>,
    }

    #[async_trait]
    impl ConfigurationService for RecordingConfiguration {
        async fn configuration_changed(&self, update: &SettingsUpdate, _ctx: &EventContext) {
            self.updates.lock().expect("lock").push(update.clone());
        }
    }

    fn envelope(event: HostEvent) -> HostEnvelope {
        HostEnvelope { envelope_id: "env-1".to_owned(), event }
    }

    #[test]
    fn envelopes_decode_by_type_tag() {
        let raw = r#"{"envelope_id":"env-9","event":{"type":"message_posted",
            "channel_id":"C1","user_id":"U1"}}"#;
        let decoded: HostEnvelope = serde_json::from_str(raw).expect("decode");
        assert_eq!(
            decoded.event,
            HostEvent::MessagePosted(ChannelActivity {
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned()
            })
        );

        let unknown: HostEnvelope =
            serde_json::from_str(r#"{"envelope_id":"env-10","event":{"type":"reaction_added"}}"#)
                .expect("decode");
        assert_eq!(unknown.event, HostEvent::Unsupported);
        assert_eq!(unknown.event.event_type().as_str(), "unsupported");
    }

    #[test]
    fn slash_command_payload_defaults_optional_fields() {
        let raw = r#"{"envelope_id":"env-2","event":{"type":"slash_command",
            "command":"/quote","user_id":"U1"}}"#;
        let decoded: HostEnvelope = serde_json::from_str(raw).expect("decode");
        let HostEvent::SlashCommand(args) = decoded.event else {
            panic!("expected slash command");
        };
        assert_eq!(args.command, "/quote");
        assert!(args.team_id.is_empty());
        assert!(args.request_id.is_empty());
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let result = dispatcher
            .dispatch(&envelope(HostEvent::Unsupported), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn activity_handlers_register_per_kind() {
        let service = Arc::new(RecordingActivity::default());
        let mut dispatcher = EventDispatcher::new();
        for kind in HostEventType::CHANNEL_ACTIVITY {
            dispatcher.register(ChannelActivityHandler::new(kind, service.clone()));
        }
        assert_eq!(dispatcher.handler_count(), 3);

        let activity = |channel: &str| ChannelActivity {
            channel_id: channel.to_owned(),
            user_id: "U1".to_owned(),
        };
        let ctx = EventContext::default();

        let joined = envelope(HostEvent::UserJoinedChannel(activity("C-town")));
        let left = envelope(HostEvent::UserLeftChannel(activity("C-off")));
        assert_eq!(
            dispatcher.dispatch(&joined, &ctx).await.expect("dispatch"),
            HandlerResult::Processed
        );
        assert_eq!(
            dispatcher.dispatch(&left, &ctx).await.expect("dispatch"),
            HandlerResult::Ignored
        );
        assert_eq!(*service.seen.lock().expect("lock"), vec!["C-town", "C-off"]);
    }

    #[tokio::test]
    async fn configuration_handler_forwards_update() {
        let service = Arc::new(RecordingConfiguration::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ConfigurationChangedHandler::new(service.clone()));

        let update = SettingsUpdate {
            post_interval_minutes: Some(30.0),
            ..SettingsUpdate::default()
        };
        let result = dispatcher
            .dispatch(
                &envelope(HostEvent::ConfigurationChanged(update.clone())),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(*service.updates.lock().expect("lock"), vec![update]);
    }

    #[test]
    fn store_failures_become_service_unavailable() {
        let error = DispatchError::Handler(EventHandlerError::Route(CommandRouteError::Store(
            StoreError::Persistence("disk full".to_owned()),
        )));

        let interface = error.into_interface("env-7");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "env-7");
    }
}
