//! Server-wide cancellation.
//!
//! The listener runs under the root token and every player connection under
//! a child of it, so one `shutdown()` stops accepting and closes all sockets.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long `drain` waits for open connections to finish closing.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct ShutdownCoordinator {
    root: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the listener's graceful shutdown.
    pub fn server_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Token for one player connection. Cancelling it closes only that
    /// connection; shutdown cancels all of them.
    pub fn connection_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn shutdown(&self) {
        if !self.root.is_cancelled() {
            info!("shutdown requested, closing player connections");
        }
        self.root.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Shut down and wait up to `timeout` for the serve task to finish.
    /// Aborts the task and returns `false` if it does not.
    pub async fn drain(&self, mut serve_task: JoinHandle<()>, timeout: Duration) -> bool {
        self.shutdown();
        match tokio::time::timeout(timeout, &mut serve_task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "serve task failed during shutdown");
                false
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "connections still open after drain timeout, aborting");
                serve_task.abort();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_tokens_are_independent() {
        let coord = ShutdownCoordinator::new();
        let a = coord.connection_token();
        let b = coord.connection_token();
        a.cancel();
        assert!(!b.is_cancelled());
        assert!(!coord.is_shutting_down());

        coord.shutdown();
        assert!(b.is_cancelled());
        assert!(coord.server_token().is_cancelled());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_waits_for_task_watching_token() {
        let coord = ShutdownCoordinator::new();
        let token = coord.server_token();
        let task = tokio::spawn(async move { token.cancelled().await });
        assert!(coord.drain(task, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn drain_aborts_stuck_task() {
        let coord = ShutdownCoordinator::new();
        let task = tokio::spawn(std::future::pending::<()>());
        assert!(!coord.drain(task, Duration::from_millis(20)).await);
        assert!(coord.is_shutting_down());
    }
}
