//! Per-connection I/O
//!
//! Performs the WebSocket upgrade (capturing the query string and `Cookie`
//! header), runs the writer task and feeds inbound frames to the session.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::channel::{ChannelId, ConnectionHandle, Outbound, OutboundQueue};
use super::config::ServerConfig;
use super::hub::Hub;
use crate::error::{Error, Result};
use crate::protocol::ConnectParams;
use crate::session::handler::is_rejection;
use crate::session::{Session, SessionContext};

/// One accepted TCP connection
pub struct Connection {
    channel_id: ChannelId,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Hub,
}

impl Connection {
    /// Wrap an accepted socket
    pub fn new(socket: TcpStream, peer_addr: SocketAddr, config: ServerConfig, hub: Hub) -> Self {
        Self {
            channel_id: ChannelId::generate(),
            socket,
            peer_addr,
            config,
            hub,
        }
    }

    /// Connection id
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Run the connection to completion
    pub async fn run(self) -> Result<()> {
        let Connection {
            channel_id,
            socket,
            peer_addr,
            config,
            hub,
        } = self;

        let mut captured: Option<(Option<String>, Option<String>)> = None;
        let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            let query = request.uri().query().map(str::to_string);
            let cookie = request
                .headers()
                .get(COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            captured = Some((query, cookie));
            Ok(response)
        };

        let ws = tokio::time::timeout(
            config.handshake_timeout,
            tokio_tungstenite::accept_hdr_async(socket, callback),
        )
        .await
        .map_err(|_| Error::HandshakeTimeout)??;

        let (query, cookie) = captured.unwrap_or_default();
        let params = ConnectParams::from_request(query.as_deref(), cookie.as_deref());

        tracing::debug!(channel = %channel_id, peer = %peer_addr, "WebSocket upgraded");

        let (sink, mut stream) = ws.split();
        let (handle, queue) = ConnectionHandle::new(channel_id.clone());
        let mut writer = tokio::spawn(write_loop(
            sink,
            queue,
            channel_id.clone(),
            config.write_timeout,
        ));
        let mut writer_done = false;

        let ctx = SessionContext::new(channel_id.clone(), Some(peer_addr), params);
        let mut session = Session::new(ctx, handle.clone(), hub);

        match session.open().await {
            Ok(role) => {
                tracing::debug!(channel = %channel_id, role = %role, "Session open");

                loop {
                    let frame = tokio::select! {
                        frame = stream.next() => frame,
                        _ = &mut writer => {
                            // Peer stopped accepting writes
                            writer_done = true;
                            break;
                        }
                    };

                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = session.on_text(&text).await {
                                tracing::debug!(channel = %channel_id, error = %e, "Command failed");
                            }
                        }
                        Some(Ok(Message::Binary(_))) => session.on_binary(),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(channel = %channel_id, error = %e, "Read error");
                            break;
                        }
                    }
                }
            }
            Err(e) if is_rejection(&e) => {
                tracing::debug!(channel = %channel_id, error = %e, "Connection refused");
            }
            Err(e) => {
                tracing::warn!(channel = %channel_id, error = %e, "Session failed to open");
            }
        }

        session.on_close().await;

        // Dropping the last handles lets the writer drain and exit
        drop(session);
        drop(handle);
        if !writer_done && tokio::time::timeout(config.write_timeout * 2, writer).await.is_err() {
            tracing::warn!(channel = %channel_id, "Writer did not finish in time");
        }

        Ok(())
    }
}

/// Drain the outbound queue into the socket
///
/// Each write is bounded by `write_timeout`. The first failed or timed-out
/// write marks the connection closed and ends the loop.
async fn write_loop<S>(
    mut sink: S,
    mut queue: OutboundQueue,
    channel_id: ChannelId,
    write_timeout: Duration,
) where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(outbound) = queue.recv().await {
        let (message, last) = match outbound {
            Outbound::Text(text) => (Message::Text(text.to_string()), false),
            Outbound::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code: CloseCode::from(code),
                    reason: reason.into(),
                })),
                true,
            ),
        };

        match tokio::time::timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => {
                tracing::debug!(channel = %channel_id, "Succeed to send message");
            }
            Ok(Err(e)) => {
                tracing::debug!(channel = %channel_id, error = %e, "Failed to send message");
                break;
            }
            Err(_) => {
                tracing::warn!(channel = %channel_id, "Send timed out, treating connection as closed");
                break;
            }
        }

        if last {
            break;
        }
    }

    queue.mark_closed();
    let _ = tokio::time::timeout(write_timeout, sink.close()).await;
}
