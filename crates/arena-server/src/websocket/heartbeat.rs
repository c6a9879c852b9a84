//! Liveness watchdog for one player connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::handle::PlayerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No inbound traffic for at least the timeout; the connection was cancelled.
    Expired { silent: Duration },
    /// The connection closed for another reason.
    Closed,
}

/// Every `interval`, check how long the connection has been silent. Any
/// inbound frame refreshes it, including pongs to the writer's pings. Once
/// silence reaches `timeout` the connection's token is cancelled.
pub async fn watch_liveness(
    handle: Arc<PlayerHandle>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> Liveness {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Liveness::Closed,
            _ = ticker.tick() => {
                let silent = handle.last_seen_elapsed();
                if silent >= timeout {
                    warn!(
                        player_id = %handle.player_id(),
                        connection_id = %handle.connection_id(),
                        silent_ms = silent.as_millis() as u64,
                        "heartbeat timed out, closing connection"
                    );
                    cancel.cancel();
                    return Liveness::Expired { silent };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::PlayerId;
    use tokio::sync::mpsc;

    fn make_handle(cancel: &CancellationToken) -> Arc<PlayerHandle> {
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(PlayerHandle::new(PlayerId::from_raw("hb"), tx, cancel.clone()))
    }

    #[tokio::test]
    async fn closed_connection_stops_watchdog() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watch_liveness(
            make_handle(&cancel),
            Duration::from_secs(100),
            Duration::from_secs(300),
            cancel.clone(),
        ));
        cancel.cancel();
        assert_eq!(task.await.unwrap(), Liveness::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connection_is_cancelled() {
        let cancel = CancellationToken::new();
        let result = watch_liveness(
            make_handle(&cancel),
            Duration::from_millis(10),
            Duration::from_millis(30),
            cancel.clone(),
        )
        .await;
        // Ticks at 0, 10, 20, 30ms: expires on the first tick at the timeout
        assert!(matches!(
            result,
            Liveness::Expired { silent } if silent >= Duration::from_millis(30) && silent < Duration::from_millis(40)
        ));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn traffic_keeps_connection_open() {
        let cancel = CancellationToken::new();
        let handle = make_handle(&cancel);
        let task = tokio::spawn(watch_liveness(
            Arc::clone(&handle),
            Duration::from_millis(10),
            Duration::from_millis(100),
            cancel.clone(),
        ));

        for _ in 0..10 {
            handle.mark_alive();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!task.is_finished());
        cancel.cancel();
        assert_eq!(task.await.unwrap(), Liveness::Closed);
    }
}
