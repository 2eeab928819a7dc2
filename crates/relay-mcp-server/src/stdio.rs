//! stdio Transport
//!
//! Newline-delimited JSON-RPC over any reader/writer pair, one session per
//! stream. Every inbound request runs on its own tokio task so a handler
//! blocked in `tasks/result` or waiting on the client never stalls the
//! reader; responses and the session's outbound queue share one writer.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use relay_mcp_json_rpc_server::{IncomingMessage, JsonRpcError, JsonRpcErrorObject, JsonRpcMessage};
use relay_mcp_protocol::McpResult;

use crate::dispatch::McpDispatcher;
use crate::session::{ClientSession, OutboundReceiver, SessionRegistry};

/// Largest accepted frame, in bytes, excluding the newline. Longer lines are
/// discarded while they are read and answered with an invalid-request error.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// How long replies of in-flight requests are still written after EOF.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct StdioTransport {
    dispatcher: Arc<McpDispatcher>,
    sessions: Arc<SessionRegistry>,
}

impl StdioTransport {
    pub fn new(dispatcher: Arc<McpDispatcher>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            dispatcher,
            sessions,
        }
    }

    /// Serve the process's stdin/stdout until stdin closes.
    pub async fn run_stdio(&self) -> McpResult<()> {
        self.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one session over `reader`/`writer` until the reader hits EOF.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> McpResult<()>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let (session, mut outbound) = self.sessions.create_session();
        session.set_transport_attached(true);
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<JsonRpcMessage>();
        let mut frames = FrameReader::new(reader);
        info!(session_id = %session.id(), "stdio session started");

        let result: McpResult<()> = loop {
            tokio::select! {
                frame = frames.next_frame() => match frame {
                    Ok(Some(Frame::Line(line))) => {
                        let handled = self.handle_line(&session, &line, &reply_tx, &mut writer);
                        if let Err(err) = handled.await {
                            break Err(err.into());
                        }
                    }
                    Ok(Some(Frame::TooLarge)) => {
                        warn!(session_id = %session.id(), "Frame too large");
                        if let Err(err) = write_frame(&mut writer, &too_large()).await {
                            break Err(err.into());
                        }
                    }
                    Ok(None) => {
                        info!(session_id = %session.id(), "stdin closed");
                        break Ok(());
                    }
                    Err(err) => {
                        error!(session_id = %session.id(), error = %err, "Failed to read frame");
                        break Err(err.into());
                    }
                },
                Some(reply) = reply_rx.recv() => {
                    if let Err(err) = write_frame(&mut writer, &reply).await {
                        break Err(err.into());
                    }
                }
                Some(message) = outbound.recv() => {
                    if let Err(err) = write_frame(&mut writer, &message).await {
                        break Err(err.into());
                    }
                }
            }
        };

        // Closing the session cancels whatever is still running, so the
        // remaining replies arrive promptly.
        session.set_transport_attached(false);
        self.sessions.remove_session(session.id());
        drop(reply_tx);
        if result.is_ok() {
            drain(&mut writer, &mut reply_rx, &mut outbound).await;
        }
        result
    }

    async fn handle_line<W>(
        &self,
        session: &Arc<ClientSession>,
        line: &str,
        replies: &mpsc::UnboundedSender<JsonRpcMessage>,
        writer: &mut W,
    ) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        match IncomingMessage::parse(line) {
            Ok(IncomingMessage::Request(request)) => {
                let dispatcher = Arc::clone(&self.dispatcher);
                let session = Arc::clone(session);
                let replies = replies.clone();
                tokio::spawn(async move {
                    let reply = dispatcher.handle_request(&session, request).await;
                    if replies.send(reply).is_err() {
                        debug!(session_id = %session.id(), "Reply dropped after shutdown");
                    }
                });
                Ok(())
            }
            Ok(message) => {
                // Notifications and responses never reply and never block.
                self.dispatcher.dispatch(session, message).await;
                Ok(())
            }
            Err(err) => {
                debug!(session_id = %session.id(), code = err.error.code, "Rejected frame");
                write_frame(writer, &err).await
            }
        }
    }
}

fn too_large() -> JsonRpcError {
    JsonRpcError::new(
        None,
        JsonRpcErrorObject::invalid_request(Some(serde_json::json!({
            "reason": format!("frame exceeds {} bytes", MAX_MESSAGE_SIZE)
        }))),
    )
}

enum Frame {
    Line(String),
    TooLarge,
}

/// Newline-delimited frames read through a length cap, so an oversized line
/// never occupies more than `MAX_MESSAGE_SIZE + 1` bytes.
///
/// Partial reads stay in `buf`, which keeps `next_frame` safe to race in
/// `select!`.
struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
    oversized: bool,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            oversized: false,
        }
    }

    async fn next_frame(&mut self) -> std::io::Result<Option<Frame>> {
        loop {
            if self.buf.last() == Some(&b'\n') {
                let mut line = std::mem::take(&mut self.buf);
                if std::mem::take(&mut self.oversized) {
                    return Ok(Some(Frame::TooLarge));
                }
                line.pop();
                return Ok(Some(Frame::Line(lossy(line))));
            }
            if self.buf.len() > MAX_MESSAGE_SIZE {
                self.buf.clear();
                self.oversized = true;
            }

            let limit = (MAX_MESSAGE_SIZE + 1 - self.buf.len()) as u64;
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if read > 0 {
                continue;
            }

            // EOF, possibly after an unterminated last line.
            let rest = std::mem::take(&mut self.buf);
            if std::mem::take(&mut self.oversized) {
                return Ok(Some(Frame::TooLarge));
            }
            if rest.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Frame::Line(lossy(rest))));
        }
    }
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

async fn drain<W>(
    writer: &mut W,
    replies: &mut mpsc::UnboundedReceiver<JsonRpcMessage>,
    outbound: &mut OutboundReceiver,
) where
    W: AsyncWrite + Unpin + Send,
{
    let flush = async {
        while let Some(message) = outbound.recv().await {
            write_frame(writer, &message).await?;
        }
        while let Some(reply) = replies.recv().await {
            write_frame(writer, &reply).await?;
        }
        Ok::<(), std::io::Error>(())
    };
    match tokio::time::timeout(SHUTDOWN_GRACE, flush).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "Writer closed during shutdown"),
        Err(_) => warn!("Abandoning replies still pending after shutdown grace"),
    }
}

/// One frame: compact JSON, newline, flush.
async fn write_frame<W, T>(writer: &mut W, frame: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(frame)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}
