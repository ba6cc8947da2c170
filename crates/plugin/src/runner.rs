use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{HandlerResult, HostEnvelope};
use crate::plugin::QuotebotPlugin;
use crate::responses::CommandResponse;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("envelope could not be decoded: {0}")]
    Decode(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport write failed: {0}")]
    Send(String),
}

impl TransportError {
    /// A malformed envelope is skipped; the stream itself is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Responded,
    Processed,
    Ignored,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    pub class: String,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReply {
    pub envelope_id: String,
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CommandResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

impl HostReply {
    fn from_result(envelope_id: &str, result: HandlerResult) -> Self {
        let (status, response) = match result {
            HandlerResult::Responded(response) => (ReplyStatus::Responded, Some(response)),
            HandlerResult::Processed => (ReplyStatus::Processed, None),
            HandlerResult::Ignored => (ReplyStatus::Ignored, None),
        };
        Self { envelope_id: envelope_id.to_owned(), status, response, error: None }
    }
}

#[async_trait]
pub trait HostTransport: Send + Sync {
    /// `Ok(None)` once the host closed the stream.
    async fn next_envelope(&self) -> Result<Option<HostEnvelope>, TransportError>;
    async fn reply(&self, reply: HostReply) -> Result<(), TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub envelopes: usize,
    pub responded: usize,
    pub failed: usize,
    pub decode_errors: usize,
}

pub struct PluginRunner {
    transport: Arc<dyn HostTransport>,
    plugin: Arc<QuotebotPlugin>,
}

impl PluginRunner {
    pub fn new(transport: Arc<dyn HostTransport>, plugin: Arc<QuotebotPlugin>) -> Self {
        Self { transport, plugin }
    }

    /// Pumps envelopes until the host closes the stream. Handler failures are
    /// answered with an error reply and never stop the loop.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        loop {
            let envelope = match self.transport.next_envelope().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => break,
                Err(error) if error.is_recoverable() => {
                    summary.decode_errors += 1;
                    warn!(
                        event_name = "ingress.host.decode_failed",
                        error = %error,
                        "skipping malformed envelope"
                    );
                    continue;
                }
                Err(error) => {
                    return Err(error).context("host transport failed while reading envelopes");
                }
            };

            summary.envelopes += 1;
            let event_type = envelope.event.event_type();
            debug!(
                event_name = "ingress.host.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = event_type.as_str(),
                correlation_id = %envelope.envelope_id,
                "received host envelope"
            );

            let reply = match self.plugin.handle_envelope(&envelope).await {
                Ok(result) => {
                    if matches!(result, HandlerResult::Responded(_)) {
                        summary.responded += 1;
                    }
                    HostReply::from_result(&envelope.envelope_id, result)
                }
                Err(error) => {
                    summary.failed += 1;
                    warn!(
                        event_name = "ingress.host.dispatch_failed",
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        event_type = event_type.as_str(),
                        error = %error,
                        "event dispatch failed; continuing host loop"
                    );
                    let interface = error.into_interface(envelope.envelope_id.clone());
                    HostReply {
                        envelope_id: envelope.envelope_id.clone(),
                        status: ReplyStatus::Failed,
                        response: None,
                        error: Some(ReplyError {
                            class: interface.class().to_owned(),
                            message: interface.user_message().to_owned(),
                            correlation_id: interface.correlation_id().to_owned(),
                        }),
                    }
                }
            };

            if let Err(error) = self.transport.reply(reply).await {
                warn!(
                    event_name = "ingress.host.reply_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to reply to host envelope"
                );
            }
        }

        info!(
            event_name = "ingress.host.stream_closed",
            envelopes = summary.envelopes,
            responded = summary.responded,
            failed = summary.failed,
            decode_errors = summary.decode_errors,
            "host stream closed"
        );
        self.transport.close().await.context("host transport failed to close")?;
        Ok(summary)
    }
}
