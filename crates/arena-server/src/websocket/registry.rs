//! Player registry: who is connected, and what they last reported.

use std::collections::HashMap;
use std::sync::Arc;

use arena_core::{ConnectionId, PlayerId, PlayerState, Snapshot};
use dashmap::DashMap;
use parking_lot::RwLock;

use super::handle::PlayerHandle;

/// Maps each connected player to its outbound handle and last known state.
///
/// Each map's mutations are individually atomic. Operations touching both
/// maps are not; `BroadcastEngine` serializes those that must be.
#[derive(Default)]
pub struct PlayerRegistry {
    handles: DashMap<PlayerId, Arc<PlayerHandle>>,
    states: RwLock<HashMap<PlayerId, PlayerState>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the handle for `player_id`. Returns the replaced
    /// handle, if any. No state entry is created.
    pub fn register(&self, player_id: PlayerId, handle: Arc<PlayerHandle>) -> Option<Arc<PlayerHandle>> {
        self.handles.insert(player_id, handle)
    }

    /// Insert or replace the state for `player_id`.
    ///
    /// Returns `false` and stores nothing if the player is not registered,
    /// so snapshots only ever name connected players.
    pub fn update_state(&self, player_id: &PlayerId, state: PlayerState) -> bool {
        if !self.handles.contains_key(player_id) {
            return false;
        }
        self.states.write().insert(player_id.clone(), state);
        true
    }

    /// Like `update_state`, but only while the registered handle belongs to
    /// `connection_id`, so a superseded connection cannot overwrite its
    /// replacement's state.
    pub fn update_connection_state(
        &self,
        player_id: &PlayerId,
        connection_id: &ConnectionId,
        state: PlayerState,
    ) -> bool {
        let owns = self
            .handles
            .get(player_id)
            .is_some_and(|h| h.connection_id() == connection_id);
        if !owns {
            return false;
        }
        self.states.write().insert(player_id.clone(), state);
        true
    }

    /// Remove handle and state. Idempotent; returns whether a handle was removed.
    pub fn deregister(&self, player_id: &PlayerId) -> bool {
        let removed = self.handles.remove(player_id).is_some();
        self.states.write().remove(player_id);
        removed
    }

    /// Remove handle and state only if the registered handle belongs to
    /// `connection_id`. A superseded connection never evicts its replacement.
    pub fn deregister_connection(&self, player_id: &PlayerId, connection_id: &ConnectionId) -> bool {
        let removed = self
            .handles
            .remove_if(player_id, |_, handle| handle.connection_id() == connection_id)
            .is_some();
        if removed {
            self.states.write().remove(player_id);
        }
        removed
    }

    /// Point-in-time copy of every known player state.
    pub fn snapshot(&self) -> Snapshot {
        self.states
            .read()
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    /// Copy of the registered (id, handle) pairs, safe to iterate while the
    /// registry keeps changing.
    pub fn all_handles(&self) -> Vec<(PlayerId, Arc<PlayerHandle>)> {
        self.handles
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn handle(&self, player_id: &PlayerId) -> Option<Arc<PlayerHandle>> {
        self.handles.get(player_id).map(|h| Arc::clone(h.value()))
    }

    pub fn is_registered(&self, player_id: &PlayerId) -> bool {
        self.handles.contains_key(player_id)
    }

    pub fn state(&self, player_id: &PlayerId) -> Option<PlayerState> {
        self.states.read().get(player_id).cloned()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.handles.len()
    }

    /// Number of players that have reported state.
    pub fn state_count(&self) -> usize {
        self.states.read().len()
    }
}
