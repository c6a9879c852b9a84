use std::path::PathBuf;

use anyhow::Context;
use arena_server::shutdown::DRAIN_TIMEOUT;
use arena_server::{ArenaServer, ServerConfig};
use arena_telemetry::{LogFormat, TelemetryConfig};
use clap::Parser;
use tracing::Level;

/// Real-time multiplayer state relay.
#[derive(Debug, Parser)]
#[command(name = "arena", version, about)]
struct Cli {
    /// JSON config file. CLI flags and env vars override its values.
    #[arg(long, env = "ARENA_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "ARENA_HOST")]
    host: Option<String>,

    #[arg(long, env = "ARENA_PORT")]
    port: Option<u16>,

    /// Outbound messages buffered per connection.
    #[arg(long, env = "ARENA_SEND_QUEUE")]
    send_queue_capacity: Option<usize>,

    #[arg(long, env = "ARENA_SEND_TIMEOUT_MS")]
    send_timeout_ms: Option<u64>,

    #[arg(long, env = "ARENA_HEARTBEAT_INTERVAL_SECS")]
    heartbeat_interval_secs: Option<u64>,

    #[arg(long, env = "ARENA_HEARTBEAT_TIMEOUT_SECS")]
    heartbeat_timeout_secs: Option<u64>,

    #[arg(long, env = "ARENA_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Per-module level, e.g. `arena_server::websocket=debug`. Repeatable.
    #[arg(long = "log-module", value_parser = parse_module_level)]
    log_modules: Vec<(String, Level)>,

    /// Emit JSON logs on stdout.
    #[arg(long, env = "ARENA_JSON_LOGS")]
    json_logs: bool,

    /// Also append logs to this file.
    #[arg(long, env = "ARENA_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_json_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.send_queue_capacity {
            config.send_queue_capacity = capacity;
        }
        if let Some(ms) = self.send_timeout_ms {
            config.send_timeout_ms = ms;
        }
        if let Some(secs) = self.heartbeat_interval_secs {
            config.heartbeat_interval_secs = secs;
        }
        if let Some(secs) = self.heartbeat_timeout_secs {
            config.heartbeat_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            module_levels: self.log_modules.clone(),
            format: if self.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            log_file: self.log_file.clone(),
        }
    }
}

fn parse_module_level(raw: &str) -> Result<(String, Level), String> {
    let (module, level) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE=LEVEL, got `{raw}`"))?;
    let level = level
        .parse::<Level>()
        .map_err(|e| format!("invalid level for `{module}`: {e}"))?;
    Ok((module.to_string(), level))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.server_config()?;
    arena_telemetry::init_telemetry(&cli.telemetry_config())
        .context("failed to initialize logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting arena relay");

    let server = ArenaServer::new(config);
    let (addr, mut serve_task) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind {}", server.config().bind_addr()))?;

    tracing::info!(%addr, "arena relay ready");

    let stopped_early = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl+c")?;
            false
        }
        result = &mut serve_task => {
            result.context("server task failed")?;
            true
        }
    };

    if stopped_early {
        tracing::warn!("server stopped unexpectedly");
    } else if !server.shutdown().drain(serve_task, DRAIN_TIMEOUT).await {
        tracing::warn!("shutdown did not complete cleanly");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_config() {
        let cli = Cli::try_parse_from(["arena"]).unwrap();
        let config = cli.server_config().unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(cli.telemetry_config().format, LogFormat::Pretty);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "arena",
            "--host",
            "127.0.0.1",
            "--port",
            "9100",
            "--send-queue-capacity",
            "16",
            "--json-logs",
        ])
        .unwrap();
        let config = cli.server_config().unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9100");
        assert_eq!(config.send_queue_capacity, 16);
        assert_eq!(cli.telemetry_config().format, LogFormat::Json);
    }

    #[test]
    fn flags_override_config_file() {
        let path = std::env::temp_dir().join(format!("arena-cli-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"port": 7000, "send_queue_capacity": 32}"#).unwrap();
        let cli = Cli::try_parse_from([
            "arena",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "7001",
        ])
        .unwrap();
        let config = cli.server_config().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.port, 7001);
        assert_eq!(config.send_queue_capacity, 32);
    }

    #[test]
    fn invalid_override_rejected() {
        let cli = Cli::try_parse_from(["arena", "--send-queue-capacity", "0"]).unwrap();
        assert!(cli.server_config().is_err());
    }

    #[test]
    fn module_levels_parse() {
        let cli = Cli::try_parse_from([
            "arena",
            "--log-level",
            "warn",
            "--log-module",
            "arena_server::websocket=debug",
        ])
        .unwrap();
        let telemetry = cli.telemetry_config();
        assert_eq!(telemetry.log_level, Level::WARN);
        assert_eq!(
            telemetry.module_levels,
            vec![("arena_server::websocket".to_string(), Level::DEBUG)]
        );
        assert!(parse_module_level("no-level").is_err());
        assert!(parse_module_level("arena=loud").is_err());
    }
}
