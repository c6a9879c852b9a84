//! `ArenaServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arena_core::PlayerId;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{Json, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::ledger::BalanceLedger;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastEngine;
use crate::websocket::connection;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Player registry and fan-out.
    pub engine: Arc<BroadcastEngine>,
    /// PrimeAgems balances.
    pub ledger: Arc<BalanceLedger>,
    pub config: Arc<ServerConfig>,
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay server. Owns all shared state; routers built from it share
/// the same registry and ledger.
pub struct ArenaServer {
    config: Arc<ServerConfig>,
    engine: Arc<BroadcastEngine>,
    ledger: Arc<BalanceLedger>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ArenaServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(BroadcastEngine::new()),
            ledger: Arc::new(BalanceLedger::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            engine: Arc::clone(&self.engine),
            ledger: Arc::clone(&self.ledger),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let api = api::routes().layer(TimeoutLayer::new(self.config.request_timeout()));

        Router::new()
            .route("/ws/{player_id}", get(ws_handler))
            .route("/health", get(health_handler))
            .merge(api)
            .with_state(self.app_state())
            .layer(CatchPanicLayer::custom(api::panic_response))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.server_token();

        info!(%addr, "arena server listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server terminated with error");
            }
            info!("arena server stopped");
        });

        Ok((addr, handle))
    }

    pub fn engine(&self) -> &Arc<BroadcastEngine> {
        &self.engine
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws/{player_id}
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(player_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let player_id = PlayerId::from_raw(player_id);
    info!(player_id = %player_id, "websocket upgrade requested");
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| connection::handle_socket(socket, player_id, state))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(&state))
}
