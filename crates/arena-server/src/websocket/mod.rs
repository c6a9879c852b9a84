//! Player connections: registry, fan-out, per-connection loop and heartbeat.

pub mod broadcast;
pub mod connection;
pub mod handle;
pub mod heartbeat;
pub mod registry;
