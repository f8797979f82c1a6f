// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use crate::core::connection::{ConnectionHandle, ConnectionKey, FrameReceiver};
use crate::core::errors::GatewayError;
use crate::core::network::{ClientEvents, FrameOutcome};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as Frame};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler<S> {
    ws: WebSocketStream<S>,
    key: ConnectionKey,
    events: ClientEvents,
    shutdown: CancellationToken,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Performs the WebSocket handshake on an accepted socket.
    pub async fn accept(
        socket: S,
        addr: SocketAddr,
        events: ClientEvents,
        shutdown: CancellationToken,
    ) -> Result<Self, GatewayError> {
        let ws = tokio_tungstenite::accept_async(socket).await?;
        debug!("WebSocket handshake completed for {}", addr);
        Ok(Self {
            ws,
            key: ConnectionKey::from(addr),
            events,
            shutdown,
        })
    }

    /// The main event loop for the connection, handling incoming frames and signals.
    pub async fn run(self) -> Result<(), GatewayError> {
        let Self {
            ws,
            key,
            events,
            shutdown,
        } = self;

        let (handle, rx) = ConnectionHandle::channel();
        let terminate = handle.termination_token();
        let session_id = events.on_connect(key.clone(), handle.clone())?;
        let _guard = ConnectionGuard::new(events.clone(), key.clone(), session_id);

        let (sink, mut stream) = ws.split();
        let writer = tokio::spawn(write_frames(sink, rx, terminate.clone()));

        loop {
            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = shutdown.cancelled() => {
                    info!("Connection handler for {} received GLOBAL shutdown signal.", key);
                    handle.send_frame(Frame::Close(None));
                    break;
                }
                _ = terminate.cancelled() => {
                    info!("Connection handler for {} received kill signal.", key);
                    break;
                }
                result = stream.next() => {
                    match result {
                        Some(Ok(Frame::Text(text))) => {
                            if events.on_text(&key, text.as_str()) == FrameOutcome::Closed {
                                break;
                            }
                        }
                        Some(Ok(Frame::Binary(data))) => events.on_binary(&handle, data),
                        Some(Ok(Frame::Close(_))) | None => {
                            debug!("Connection from {} closed by peer.", key);
                            break;
                        }
                        // Pings are answered by the WebSocket layer.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("Connection from {} closed by peer: {}", key, e);
                            } else {
                                warn!("Connection error for {}: {}", key, e);
                            }
                            break;
                        }
                    }
                }
            }
        }

        // Ends the writer once whatever is queued has been written.
        handle.terminate();
        if let Err(e) = writer.await {
            warn!("Writer task for {} failed: {}", key, e);
        }
        debug!("Session {} for {} finished.", session_id, key);
        Ok(())
    }
}

/// Writes queued frames to the socket until the connection is terminated.
///
/// Frames queued before termination are still written, so a final response (a ban
/// notice, a close frame) reaches the client before the socket is dropped.
async fn write_frames<S>(
    mut sink: SplitSink<WebSocketStream<S>, Frame>,
    mut rx: FrameReceiver,
    terminate: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        debug!("Write failed, stopping writer: {}", e);
                        return;
                    }
                }
                None => break,
            },
            _ = terminate.cancelled() => {
                while let Ok(frame) = rx.try_recv() {
                    if sink.feed(frame).await.is_err() {
                        return;
                    }
                }
                break;
            }
        }
    }
    let _ = sink.flush().await;
}

fn is_normal_disconnect(e: &WsError) -> bool {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(p) => matches!(
            p,
            tokio_tungstenite::tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
        ),
        WsError::Io(io_err) => matches!(
            io_err.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}
