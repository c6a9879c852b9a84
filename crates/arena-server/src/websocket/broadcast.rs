//! State fan-out to connected players.

use std::sync::Arc;

use arena_core::{ConnectionId, PlayerId, PlayerState, ServerMessage};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::handle::PlayerHandle;
use super::registry::PlayerRegistry;

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: usize,
}

impl FanOut {
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Applies player events to the registry and broadcasts the result.
///
/// Every mutation and the enqueue of its broadcast happen under `fanout`, so
/// each recipient's queue receives snapshots in mutation order. Enqueueing
/// never blocks, so the lock is never held across a socket write.
#[derive(Default)]
pub struct BroadcastEngine {
    registry: PlayerRegistry,
    fanout: Mutex<()>,
}

impl BroadcastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// Register a connection. A previous connection under the same id is
    /// closed and stops receiving broadcasts.
    pub fn connect(&self, player_id: &PlayerId, handle: Arc<PlayerHandle>) {
        let connection_id = handle.connection_id().clone();
        let _guard = self.fanout.lock();
        if let Some(previous) = self.registry.register(player_id.clone(), handle) {
            info!(
                player_id = %player_id,
                connection_id = %connection_id,
                superseded = %previous.connection_id(),
                "player reconnected, closing previous connection"
            );
            previous.close();
        } else {
            info!(player_id = %player_id, connection_id = %connection_id, "player connected");
        }
    }

    /// Store the player's new state and send the merged snapshot to everyone,
    /// the sender included.
    pub fn on_state_update(&self, player_id: &PlayerId, state: PlayerState) -> FanOut {
        let _guard = self.fanout.lock();
        if !self.registry.update_state(player_id, state) {
            debug!(player_id = %player_id, "state update from unregistered player ignored");
            return FanOut::default();
        }
        self.broadcast_snapshot()
    }

    /// `on_state_update` for one connection: applied only while that
    /// connection still owns the player's registration, so a connection
    /// superseded by a reconnect cannot overwrite or rebroadcast stale state.
    pub fn on_connection_update(
        &self,
        player_id: &PlayerId,
        connection_id: &ConnectionId,
        state: PlayerState,
    ) -> FanOut {
        let _guard = self.fanout.lock();
        if !self.registry.update_connection_state(player_id, connection_id, state) {
            debug!(
                player_id = %player_id,
                connection_id = %connection_id,
                "state update from superseded connection ignored"
            );
            return FanOut::default();
        }
        self.broadcast_snapshot()
    }

    /// Remove the player and announce the departure to everyone left.
    pub fn on_disconnect(&self, player_id: &PlayerId) -> FanOut {
        let _guard = self.fanout.lock();
        self.registry.deregister(player_id);
        self.announce_departure(player_id)
    }

    /// Cleanup for one connection: deregister and announce only if the
    /// player's registered handle is still this connection. Returns `None`
    /// when there was nothing to clean up (never registered, already cleaned
    /// up, or superseded by a reconnect).
    pub fn on_connection_closed(&self, player_id: &PlayerId, connection_id: &ConnectionId) -> Option<FanOut> {
        let _guard = self.fanout.lock();
        if !self.registry.deregister_connection(player_id, connection_id) {
            debug!(
                player_id = %player_id,
                connection_id = %connection_id,
                "connection closed without owning registration"
            );
            return None;
        }
        info!(player_id = %player_id, connection_id = %connection_id, "player disconnected");
        Some(self.announce_departure(player_id))
    }

    fn broadcast_snapshot(&self) -> FanOut {
        let message = ServerMessage::StateUpdate {
            players: self.registry.snapshot(),
        };
        self.fan_out(&message)
    }

    fn announce_departure(&self, player_id: &PlayerId) -> FanOut {
        let message = ServerMessage::PlayerDisconnected {
            player_id: player_id.clone(),
        };
        self.fan_out(&message)
    }

    /// Serialize once and enqueue for every registered handle. A failed send
    /// is logged and skipped.
    fn fan_out(&self, message: &ServerMessage) -> FanOut {
        let json = match serde_json::to_string(message) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(message_type = message.message_type(), error = %e, "failed to serialize broadcast");
                return FanOut::default();
            }
        };

        let mut result = FanOut::default();
        for (recipient, handle) in self.registry.all_handles() {
            match handle.send(Arc::clone(&json)) {
                Ok(()) => result.delivered += 1,
                Err(e) => {
                    result.failed += 1;
                    warn!(
                        player_id = %recipient,
                        message_type = message.message_type(),
                        error = %e,
                        dropped_total = handle.drop_count(),
                        "failed to send to player"
                    );
                }
            }
        }
        debug!(
            message_type = message.message_type(),
            recipients = result.recipients(),
            failed = result.failed,
            "broadcast"
        );
        result
    }
}
