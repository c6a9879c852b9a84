//! Per-connection loop: bridges one WebSocket to the broadcast engine.
//!
//! Lifecycle: register → receive loop → cleanup. Cleanup is owned by a drop
//! guard created before registration, so it runs exactly once on every exit
//! path, including panics and task cancellation.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use arena_core::{ConnectionId, DecodeError, PlayerId, PlayerState};
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcast::BroadcastEngine;
use super::handle::PlayerHandle;
use super::heartbeat::watch_liveness;
use crate::server::AppState;

/// Why a connection's receive loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Client sent a close frame.
    ClientClosed { code: Option<u16> },
    /// The inbound stream ended without a close frame.
    EndOfStream,
    /// Transport-level receive error.
    Transport(String),
    /// Closed from the server side: superseded by a reconnect, heartbeat
    /// timeout, writer failure, or shutdown.
    Cancelled,
}

/// One inbound frame, classified.
#[derive(Debug)]
pub enum Inbound {
    State(PlayerState),
    Malformed(DecodeError),
    /// Ping/pong traffic.
    Keepalive,
    Disconnect(DisconnectReason),
}

impl Inbound {
    pub fn classify(frame: Option<Result<Message, axum::Error>>) -> Self {
        let decoded = match frame {
            None => return Self::Disconnect(DisconnectReason::EndOfStream),
            Some(Err(e)) => return Self::Disconnect(DisconnectReason::Transport(e.to_string())),
            Some(Ok(Message::Close(frame))) => {
                return Self::Disconnect(DisconnectReason::ClientClosed {
                    code: frame.map(|f| f.code),
                })
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => return Self::Keepalive,
            Some(Ok(Message::Text(text))) => PlayerState::from_text(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => PlayerState::from_bytes(&bytes),
        };
        match decoded {
            Ok(state) => Self::State(state),
            Err(e) => Self::Malformed(e),
        }
    }
}

/// Runs the registered connection's cleanup when dropped.
struct CleanupGuard {
    engine: Arc<BroadcastEngine>,
    player_id: PlayerId,
    connection_id: ConnectionId,
    cancel: CancellationToken,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(fan_out) = self.engine.on_connection_closed(&self.player_id, &self.connection_id) {
            debug!(
                player_id = %self.player_id,
                notified = fan_out.delivered,
                failed = fan_out.failed,
                "departure announced"
            );
        }
    }
}

/// Entry point for an upgraded socket.
pub async fn handle_socket(socket: WebSocket, player_id: PlayerId, state: AppState) {
    let (sink, stream) = socket.split();
    let reason = serve_connection(player_id.clone(), sink, stream, state).await;
    info!(player_id = %player_id, reason = ?reason, "connection closed");
}

/// Drive one player connection over any frame sink/stream pair.
pub async fn serve_connection<Si, St>(
    player_id: PlayerId,
    sink: Si,
    stream: St,
    state: AppState,
) -> DisconnectReason
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let config = Arc::clone(&state.config);
    let cancel = state.shutdown.connection_token();
    let (tx, rx) = mpsc::channel(config.send_queue_capacity);
    let handle = Arc::new(PlayerHandle::new(player_id.clone(), tx, cancel.clone()));

    let _cleanup = CleanupGuard {
        engine: Arc::clone(&state.engine),
        player_id: player_id.clone(),
        connection_id: handle.connection_id().clone(),
        cancel: cancel.clone(),
    };

    state.engine.connect(&player_id, Arc::clone(&handle));
    let balance = state.ledger.get_or_init(&player_id);
    debug!(player_id = %player_id, balance, "balance ready");

    let writer = tokio::spawn(run_writer(
        sink,
        rx,
        config.heartbeat_interval(),
        config.send_timeout(),
        cancel.clone(),
    ));

    tokio::spawn(watch_liveness(
        Arc::clone(&handle),
        config.heartbeat_interval(),
        config.heartbeat_timeout(),
        cancel.clone(),
    ));

    let reason = receive_loop(&player_id, &handle, stream, &state.engine, &cancel).await;

    cancel.cancel();
    if let Err(e) = writer.await {
        warn!(player_id = %player_id, error = %e, "writer task failed");
    }
    debug!(
        player_id = %player_id,
        connection_id = %handle.connection_id(),
        connected_secs = handle.connected_at.elapsed().as_secs(),
        "receive loop ended"
    );
    reason
}

async fn receive_loop<St>(
    player_id: &PlayerId,
    handle: &PlayerHandle,
    mut stream: St,
    engine: &BroadcastEngine,
    cancel: &CancellationToken,
) -> DisconnectReason
where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        // Cancellation wins over a ready frame: a superseded connection
        // must stop reading.
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => return DisconnectReason::Cancelled,
            frame = stream.next() => frame,
        };

        match Inbound::classify(frame) {
            Inbound::State(state) => {
                handle.mark_alive();
                engine.on_connection_update(player_id, handle.connection_id(), state);
            }
            Inbound::Malformed(e) => {
                handle.mark_alive();
                warn!(player_id = %player_id, kind = e.error_kind(), error = %e, "invalid state payload");
            }
            Inbound::Keepalive => handle.mark_alive(),
            Inbound::Disconnect(reason) => return reason,
        }
    }
}

/// Drain the outbound queue onto the socket and send periodic pings.
///
/// Each socket write is bounded by `send_timeout`; a failed or stalled write
/// closes this connection only.
async fn run_writer<Si>(
    mut sink: Si,
    mut rx: mpsc::Receiver<Arc<String>>,
    ping_interval: Duration,
    send_timeout: Duration,
    cancel: CancellationToken,
) where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let mut ping = time::interval(ping_interval);
    ping.tick().await;

    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(text) => Message::Text(text.as_str().into()),
                None => break,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match time::timeout(send_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "socket write failed");
                break;
            }
            Err(_) => {
                warn!(timeout_ms = send_timeout.as_millis() as u64, "socket write timed out");
                break;
            }
        }
    }

    cancel.cancel();
    let _ = time::timeout(send_timeout, sink.send(Message::Close(None))).await;
}
