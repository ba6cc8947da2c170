//! JSON-lines host transport.
//!
//! Each input line is one [`HostEnvelope`]; every reply and every post the plugin creates
//! is written back as one line tagged with `type`.

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use quotebot_core::errors::HostError;
use quotebot_core::host::{NewPost, PostCreator};
use quotebot_plugin::events::HostEnvelope;
use quotebot_plugin::runner::{HostReply, HostTransport, TransportError};

pub type StdioTransport = LineTransport<BufReader<Stdin>, Stdout>;

pub fn stdio() -> StdioTransport {
    LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundLine<'a> {
    Reply(&'a HostReply),
    Post(PostLine<'a>),
}

#[derive(Debug, Serialize)]
struct PostLine<'a> {
    post_id: String,
    channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    message: &'a str,
}

pub struct LineTransport<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader: Mutex::new(reader), writer: Mutex::new(writer) }
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    async fn write_line(&self, line: &OutboundLine<'_>) -> Result<(), TransportError> {
        let mut encoded =
            serde_json::to_vec(line).map_err(|error| TransportError::Send(error.to_string()))?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await.map_err(|error| TransportError::Send(error.to_string()))?;
        writer.flush().await.map_err(|error| TransportError::Send(error.to_string()))
    }
}

#[async_trait]
impl<R, W> HostTransport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_envelope(&self) -> Result<Option<HostEnvelope>, TransportError> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|error| TransportError::Receive(error.to_string()))?;
            if read == 0 {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(line.trim())
                .map(Some)
                .map_err(|error| TransportError::Decode(error.to_string()));
        }
    }

    async fn reply(&self, reply: HostReply) -> Result<(), TransportError> {
        self.write_line(&OutboundLine::Reply(&reply)).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await.map_err(|error| TransportError::Send(error.to_string()))
    }
}

#[async_trait]
impl<R, W> PostCreator for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn create_post(&self, post: NewPost) -> Result<(), HostError> {
        let post_id = Uuid::new_v4().to_string();
        let line = OutboundLine::Post(PostLine {
            post_id: post_id.clone(),
            channel_id: &post.channel_id,
            user_id: post.user_id.as_deref(),
            message: &post.message,
        });
        self.write_line(&line).await.map_err(|error| HostError::Unavailable(error.to_string()))?;
        debug!(
            event_name = "egress.host.post_written",
            post_id = %post_id,
            channel_id = %post.channel_id,
            "post written to host"
        );
        Ok(())
    }
}
