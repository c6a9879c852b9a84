//! # arena-server
//!
//! Axum HTTP + `WebSocket` relay for multiplayer game state.
//!
//! - `WebSocket` endpoint `/ws/{player_id}`: each state update is merged into
//!   the shared snapshot and fanned out to every connected player
//! - Per-connection bounded send queues, so one slow client never stalls the rest
//! - PrimeAgems balance endpoints (`/primeagems/{player_id}/...`)
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod health;
pub mod ledger;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::{ConfigError, ServerConfig};
pub use server::{AppState, ArenaServer};
