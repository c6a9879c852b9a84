//! Outbound handle for one player connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arena_core::{ConnectionId, PlayerId, SendError};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Send side of a player's connection.
///
/// Sending never touches the socket: messages are queued for the
/// connection's writer task, so callers may send while holding locks.
pub struct PlayerHandle {
    player_id: PlayerId,
    connection_id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    /// Cancelled when the connection must close (superseded, heartbeat
    /// timeout, writer failure, or server shutdown).
    cancel: CancellationToken,
    pub connected_at: Instant,
    /// Last inbound frame of any kind.
    last_seen: Mutex<Instant>,
    dropped_messages: AtomicU64,
}

impl PlayerHandle {
    pub fn new(player_id: PlayerId, tx: mpsc::Sender<Arc<String>>, cancel: CancellationToken) -> Self {
        let now = Instant::now();
        Self {
            player_id,
            connection_id: ConnectionId::new(),
            tx,
            cancel,
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Queue a serialized message for delivery.
    pub fn send(&self, message: Arc<String>) -> Result<(), SendError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Messages dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Ask the connection to shut down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Record inbound traffic (state, malformed payload, ping or pong).
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}
