use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use quotebot_core::errors::{ApplicationError, StoreError};

use crate::responses::CommandResponse;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Add,
    Channel,
    Delete,
    Help,
    Info,
    Interval,
    List,
    User,
}

impl Verb {
    pub const ALL: [Verb; 8] = [
        Verb::Add,
        Verb::Channel,
        Verb::Delete,
        Verb::Help,
        Verb::Info,
        Verb::Interval,
        Verb::List,
        Verb::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Channel => "channel",
            Self::Delete => "delete",
            Self::Help => "help",
            Self::Info => "info",
            Self::Interval => "interval",
            Self::List => "list",
            Self::User => "user",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        let token = token.to_ascii_lowercase();
        Self::ALL.into_iter().find(|verb| verb.as_str() == token)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandMatch {
    pub verb: Option<Verb>,
    pub tail: String,
}

impl CommandMatch {
    /// The verb as reported to handlers: lower case, empty when absent.
    pub fn verb_str(&self) -> &'static str {
        self.verb.map(|verb| verb.as_str()).unwrap_or("")
    }
}

/// Payload of one slash-command invocation as delivered by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandArgs {
    pub command: String,
    pub user_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuoteCommand {
    ShowRandom,
    Show { tail: String },
    Add { text: String },
    Delete { tail: String },
    List,
    Help,
    Info,
    Channel { name: String },
    Interval { tail: String },
    User { username: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("invalid trigger `{0}`: expected a single word without `/`")]
    InvalidTrigger(String),
    #[error("command pattern failed to compile: {0}")]
    Pattern(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CommandRouteError> for ApplicationError {
    fn from(error: CommandRouteError) -> Self {
        match error {
            CommandRouteError::Store(error) => ApplicationError::Store(error),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CommandParser {
    trigger: String,
    pattern: Regex,
}

impl CommandParser {
    pub fn new(trigger: &str) -> Result<Self, CommandParseError> {
        let malformed = trigger.is_empty()
            || trigger.starts_with('/')
            || trigger.chars().any(char::is_whitespace);
        if malformed {
            return Err(CommandParseError::InvalidTrigger(trigger.to_owned()));
        }

        let verbs = Verb::ALL.map(|verb| verb.as_str()).join("|");
        let pattern = format!(
            r"(?is)^/{trigger}(?:\s+(?:(?P<verb>{verbs})(?:\s+|$))?(?P<tail>.*?))?\s*$",
            trigger = regex::escape(trigger),
        );
        let pattern =
            Regex::new(&pattern).map_err(|error| CommandParseError::Pattern(error.to_string()))?;

        Ok(Self { trigger: trigger.to_owned(), pattern })
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// `None` when the line is not addressed to this trigger.
    pub fn parse(&self, line: &str) -> Option<CommandMatch> {
        let captures = self.pattern.captures(line)?;
        let verb = captures.name("verb").and_then(|token| Verb::parse(token.as_str()));
        let tail = captures.name("tail").map(|tail| tail.as_str().to_owned()).unwrap_or_default();
        Some(CommandMatch { verb, tail })
    }
}

pub fn classify_quote_command(matched: CommandMatch) -> QuoteCommand {
    let CommandMatch { verb, tail } = matched;
    match verb {
        None if tail.is_empty() => QuoteCommand::ShowRandom,
        None => QuoteCommand::Show { tail },
        Some(Verb::Add) => QuoteCommand::Add { text: tail },
        Some(Verb::Delete) => QuoteCommand::Delete { tail },
        Some(Verb::List) => QuoteCommand::List,
        Some(Verb::Help) => QuoteCommand::Help,
        Some(Verb::Info) => QuoteCommand::Info,
        Some(Verb::Channel) => QuoteCommand::Channel { name: tail },
        Some(Verb::Interval) => QuoteCommand::Interval { tail },
        Some(Verb::User) => QuoteCommand::User { username: tail },
    }
}

pub struct CommandRouter<S> {
    parser: CommandParser,
    service: Arc<S>,
}

impl<S> CommandRouter<S>
where
    S: QuoteCommandService,
{
    pub fn new(parser: CommandParser, service: Arc<S>) -> Self {
        Self { parser, service }
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    /// `Ok(None)` means the command belongs to another trigger and gets no response.
    pub async fn route(
        &self,
        args: &CommandArgs,
    ) -> Result<Option<CommandResponse>, CommandRouteError> {
        let Some(matched) = self.parser.parse(&args.command) else {
            debug!(
                event_name = "plugin.command.not_ours",
                correlation_id = %args.request_id,
                "command ignored"
            );
            return Ok(None);
        };

        debug!(
            event_name = "plugin.command.parsed",
            correlation_id = %args.request_id,
            user_id = %args.user_id,
            verb = matched.verb_str(),
            "command parsed"
        );

        let service = &self.service;
        let response = match classify_quote_command(matched) {
            QuoteCommand::ShowRandom => service.show_random(args).await?,
            QuoteCommand::Show { tail } => service.show_quote(&tail, args).await?,
            QuoteCommand::Add { text } => service.add_quote(&text, args).await?,
            QuoteCommand::Delete { tail } => service.delete_quote(&tail, args).await?,
            QuoteCommand::List => service.list_quotes(args).await?,
            QuoteCommand::Help => service.show_help(args).await?,
            QuoteCommand::Info => service.show_info(args).await?,
            QuoteCommand::Channel { name } => service.set_channel(&name, args).await?,
            QuoteCommand::Interval { tail } => service.set_interval(&tail, args).await?,
            QuoteCommand::User { username } => service.set_user(&username, args).await?,
        };
        Ok(Some(response))
    }
}

#[async_trait]
pub trait QuoteCommandService: Send + Sync {
    async fn show_random(&self, args: &CommandArgs)
        -> Result<CommandResponse, CommandRouteError>;

    async fn show_quote(
        &self,
        tail: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn add_quote(
        &self,
        text: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn delete_quote(
        &self,
        tail: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn list_quotes(&self, args: &CommandArgs)
        -> Result<CommandResponse, CommandRouteError>;

    async fn show_help(&self, args: &CommandArgs) -> Result<CommandResponse, CommandRouteError>;

    async fn show_info(&self, args: &CommandArgs) -> Result<CommandResponse, CommandRouteError>;

    async fn set_channel(
        &self,
        name: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn set_interval(
        &self,
        tail: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn set_user(
        &self,
        username: &str,
        args: &CommandArgs,
    ) -> Result<CommandResponse, CommandRouteError>;
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use quotebot_core::errors::StoreError;

    use super::{
        classify_quote_command, CommandArgs, CommandMatch, CommandParseError, CommandParser,
        CommandRouteError, CommandRouter, QuoteCommand, QuoteCommandService, Verb,
    };
    use crate::responses::CommandResponse;

    fn parser() -> CommandParser {
        CommandParser::new("quote").expect("parser")
    }

    #[test]
    fn parse_table() {
        let cases: &[(&str, Option<(&str, &str)>)] = &[
            ("/quote", Some(("", ""))),
            ("/quote   ", Some(("", ""))),
            ("/quote 7", Some(("", "7"))),
            ("/quote add hello world", Some(("add", "hello world"))),
            ("/quote add", Some(("add", ""))),
            ("/quote add   ", Some(("add", ""))),
            ("/QUOTE ADD Mixed Case", Some(("add", "Mixed Case"))),
            ("/quote delete 3  ", Some(("delete", "3"))),
            ("/quote list", Some(("list", ""))),
            ("/quote help", Some(("help", ""))),
            ("/quote info", Some(("info", ""))),
            ("/quote channel ~off-topic", Some(("channel", "~off-topic"))),
            ("/quote interval 60", Some(("interval", "60"))),
            ("/quote user @quotebot", Some(("user", "@quotebot"))),
            ("/quote addendum", Some(("", "addendum"))),
            ("/quote frobnicate now", Some(("", "frobnicate now"))),
            ("/quote debug", Some(("", "debug"))),
            ("/quotes", None),
            ("/other add x", None),
            ("quote add x", None),
            ("", None),
        ];

        let parser = parser();
        for (line, expected) in cases {
            let parsed = parser.parse(line);
            let actual = parsed.as_ref().map(|matched| (matched.verb_str(), matched.tail.as_str()));
            assert_eq!(actual, *expected, "parsing {line:?}");
        }
    }

    #[test]
    fn tail_spans_lines() {
        let parsed = parser().parse("/quote add first line\nsecond line\n").expect("match");

        assert_eq!(parsed.verb, Some(Verb::Add));
        assert_eq!(parsed.tail, "first line\nsecond line");
    }

    #[test]
    fn custom_trigger_is_escaped() {
        let parser = CommandParser::new("q.b").expect("parser");

        assert!(parser.parse("/q.b add x").is_some());
        assert!(parser.parse("/qxb add x").is_none());
        assert_eq!(parser.trigger(), "q.b");
    }

    #[test]
    fn malformed_triggers_are_rejected() {
        for trigger in ["", "/quote", "two words"] {
            assert_eq!(
                CommandParser::new(trigger).err(),
                Some(CommandParseError::InvalidTrigger(trigger.to_owned()))
            );
        }
    }

    #[test]
    fn classify_maps_every_verb() {
        let classify = |verb: Option<Verb>, tail: &str| {
            classify_quote_command(CommandMatch { verb, tail: tail.to_owned() })
        };

        assert_eq!(classify(None, ""), QuoteCommand::ShowRandom);
        assert_eq!(classify(None, "7"), QuoteCommand::Show { tail: "7".to_owned() });
        assert_eq!(classify(Some(Verb::Add), "x"), QuoteCommand::Add { text: "x".to_owned() });
        assert_eq!(classify(Some(Verb::List), "ignored"), QuoteCommand::List);
        assert_eq!(
            classify(Some(Verb::User), "@bot"),
            QuoteCommand::User { username: "@bot".to_owned() }
        );
    }

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
        fail_add: bool,
    }

    impl RecordingService {
        fn record(&self, call: String) -> Result<CommandResponse, CommandRouteError> {
            self.calls.lock().expect("lock").push(call.clone());
            Ok(CommandResponse::ephemeral(call))
        }
    }

    #[async_trait]
    impl QuoteCommandService for RecordingService {
        async fn show_random(
            &self,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record("random".to_owned())
        }

        async fn show_quote(
            &self,
            tail: &str,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record(format!("show:{tail}"))
        }

        async fn add_quote(
            &self,
            text: &str,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            if self.fail_add {
                return Err(StoreError::Persistence("kv down".to_owned()).into());
            }
            self.record(format!("add:{text}"))
        }

        async fn delete_quote(
            &self,
            tail: &str,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record(format!("delete:{tail}"))
        }

        async fn list_quotes(
            &self,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record("list".to_owned())
        }

        async fn show_help(
            &self,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record("help".to_owned())
        }

        async fn show_info(
            &self,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record("info".to_owned())
        }

        async fn set_channel(
            &self,
            name: &str,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record(format!("channel:{name}"))
        }

        async fn set_interval(
            &self,
            tail: &str,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record(format!("interval:{tail}"))
        }

        async fn set_user(
            &self,
            username: &str,
            _args: &CommandArgs,
        ) -> Result<CommandResponse, CommandRouteError> {
            self.record(format!("user:{username}"))
        }
    }

    fn args(command: &str) -> CommandArgs {
        CommandArgs {
            command: command.to_owned(),
            user_id: "U1".to_owned(),
            team_id: "T1".to_owned(),
            channel_id: "C1".to_owned(),
            request_id: "req-1".to_owned(),
        }
    }

    #[tokio::test]
    async fn router_calls_service_entrypoints() {
        let service = Arc::new(RecordingService::default());
        let router = CommandRouter::new(parser(), service.clone());

        for line in [
            "/quote",
            "/quote 2",
            "/quote add A",
            "/quote delete 1",
            "/quote list",
            "/quote help",
            "/quote info",
            "/quote channel town",
            "/quote interval 30",
            "/quote user bot",
        ] {
            let response = router.route(&args(line)).await.expect("route");
            assert!(response.is_some(), "{line} should be answered");
        }

        let calls = service.calls.lock().expect("lock").clone();
        assert_eq!(
            calls,
            vec![
                "random",
                "show:2",
                "add:A",
                "delete:1",
                "list",
                "help",
                "info",
                "channel:town",
                "interval:30",
                "user:bot"
            ]
        );
    }

    #[tokio::test]
    async fn router_ignores_other_triggers() {
        let service = Arc::new(RecordingService::default());
        let router = CommandRouter::new(parser(), service.clone());

        assert_eq!(router.route(&args("/weather today")).await, Ok(None));
        assert!(service.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn router_propagates_store_failures() {
        let service = Arc::new(RecordingService { fail_add: true, ..RecordingService::default() });
        let router = CommandRouter::new(parser(), service);

        let error = router.route(&args("/quote add A")).await.expect_err("store failure");
        assert!(matches!(error, CommandRouteError::Store(StoreError::Persistence(_))));
    }
}
