use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use quotebot_core::host::HostServices;
use quotebot_core::settings::{BotSettings, SettingsUpdate};

use crate::commands::{
    CommandArgs, CommandParseError, CommandParser, CommandRouteError, CommandRouter,
};
use crate::events::{
    quotebot_dispatcher, DispatchError, EventContext, EventDispatcher, HandlerResult, HostEnvelope,
};
use crate::responses::CommandResponse;
use crate::service::{ActivationReport, Quotebot, QuotebotOptions};

/// The host-facing plugin: lifecycle hooks plus command and event entry points.
pub struct QuotebotPlugin {
    bot: Arc<Quotebot>,
    router: Arc<CommandRouter<Quotebot>>,
    dispatcher: EventDispatcher,
    active: AtomicBool,
}

impl QuotebotPlugin {
    pub fn new(host: HostServices, options: QuotebotOptions) -> Result<Self, CommandParseError> {
        let parser = CommandParser::new(&options.trigger)?;
        let bot = Arc::new(Quotebot::new(host, options));
        let router = Arc::new(CommandRouter::new(parser, bot.clone()));
        let dispatcher = quotebot_dispatcher(bot.clone(), router.clone());

        Ok(Self { bot, router, dispatcher, active: AtomicBool::new(false) })
    }

    pub fn bot(&self) -> &Arc<Quotebot> {
        &self.bot
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn on_activate(&self) -> ActivationReport {
        self.active.store(true, Ordering::SeqCst);
        let report = self.bot.activate().await;
        info!(
            event_name = "plugin.lifecycle.activated",
            trigger = self.router.parser().trigger(),
            quotes_loaded = ?report.quotes_loaded,
            channel_resolved = report.channel_resolved,
            user_resolved = report.user_resolved,
            "quotebot activated"
        );
        report
    }

    pub fn on_deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        info!(event_name = "plugin.lifecycle.deactivated", "quotebot deactivated");
    }

    pub async fn on_configuration_change(&self, update: SettingsUpdate) -> Arc<BotSettings> {
        self.bot.apply_configuration(update).await
    }

    /// `Ok(None)` when inactive or when the command is for another trigger.
    pub async fn execute_command(
        &self,
        args: &CommandArgs,
    ) -> Result<Option<CommandResponse>, CommandRouteError> {
        if !self.is_active() {
            debug!(
                event_name = "plugin.command.inactive",
                correlation_id = %args.request_id,
                "plugin inactive; command ignored"
            );
            return Ok(None);
        }
        self.router.route(args).await
    }

    pub async fn handle_envelope(
        &self,
        envelope: &HostEnvelope,
    ) -> Result<HandlerResult, DispatchError> {
        if !self.is_active() {
            return Ok(HandlerResult::Ignored);
        }
        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        self.dispatcher.dispatch(envelope, &context).await
    }
}
