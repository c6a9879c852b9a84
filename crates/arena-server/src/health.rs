//! `/health` report.

use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"shutting_down"` once shutdown has begun.
    pub status: &'static str,
    pub uptime_secs: u64,
    /// Registered player connections.
    pub connections: usize,
    /// Players that have reported at least one state.
    pub players_with_state: usize,
    /// Players with a tracked PrimeAgems balance, connected or not.
    pub balances: usize,
}

pub fn health_check(state: &AppState) -> HealthResponse {
    let registry = state.engine.registry();
    HealthResponse {
        status: if state.shutdown.is_shutting_down() {
            "shutting_down"
        } else {
            "ok"
        },
        uptime_secs: state.start_time.elapsed().as_secs(),
        connections: registry.connection_count(),
        players_with_state: registry.state_count(),
        balances: state.ledger.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::ArenaServer;
    use arena_core::{PlayerId, PlayerState};
    use serde_json::json;

    #[test]
    fn fresh_server_is_empty() {
        let server = ArenaServer::new(ServerConfig::default());
        let resp = health_check(&server.app_state());
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.connections, 0);
        assert_eq!(resp.players_with_state, 0);
        assert_eq!(resp.balances, 0);
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn balances_outlive_players() {
        let server = ArenaServer::new(ServerConfig::default());
        let id = PlayerId::from_raw("gone");
        server.ledger().purchase(&id, 3).unwrap();
        // Not registered, so the update is ignored
        server
            .engine()
            .on_state_update(&id, PlayerState::try_from(json!({"x": 1})).unwrap());

        let resp = health_check(&server.app_state());
        assert_eq!(resp.balances, 1);
        assert_eq!(resp.players_with_state, 0);
    }

    #[test]
    fn reports_shutdown() {
        let server = ArenaServer::new(ServerConfig::default());
        server.shutdown().shutdown();
        let parsed = serde_json::to_value(health_check(&server.app_state())).unwrap();
        assert_eq!(parsed["status"], "shutting_down");
        assert!(parsed["uptime_secs"].is_number());
    }
}
