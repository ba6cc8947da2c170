//! Quotebot plugin - slash commands and channel events
//!
//! This crate holds everything between the host and the quote store:
//! - **Commands** (`commands`) - `/quote add ...`, `/quote 7`, verb parsing and routing
//! - **Responses** (`responses`) - response envelopes and the exact user-facing texts
//! - **Service** (`service`) - `Quotebot`, the shared state behind every callback
//! - **Events** (`events`) - host envelopes, dispatcher and handlers
//! - **Plugin** (`plugin`) - activation, deactivation and configuration hooks
//! - **Runner** (`runner`) - pumps envelopes from a `HostTransport` into the plugin
//!
//! # Architecture
//!
//! ```text
//! HostTransport → PluginRunner → EventDispatcher → SlashCommandHandler → CommandRouter
//!                                      ↓                                      ↓
//!                           ChannelActivityHandler → RandomPoster      Quotebot → QuoteStore
//! ```

pub mod commands;
pub mod events;
pub mod plugin;
pub mod responses;
pub mod runner;
pub mod service;

pub use commands::{CommandArgs, CommandParser, CommandRouter, QuoteCommandService, Verb};
pub use events::{EventDispatcher, HandlerResult, HostEnvelope, HostEvent};
pub use plugin::QuotebotPlugin;
pub use responses::{CommandResponse, ResponseType};
pub use runner::{HostReply, HostTransport, PluginRunner, ReplyStatus, RunSummary, TransportError};
pub use service::{ActivationReport, Quotebot, QuotebotOptions};
