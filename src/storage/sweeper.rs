//! Background Expiry Sweeper
//!
//! Lazy expiry (checking on access) leaves a gap: a key that expires and is
//! never touched again would sit in memory forever. The sweeper closes it by
//! waking about once a second, walking the TTL index in expiration order and
//! removing everything already due.
//!
//! Correctness never depends on the sweeper's timing — `get` and `ttl`
//! check deadlines themselves — so the sweeper only bounds how long dead
//! keys can linger. It competes with command handlers solely for the store
//! lock, and it logs and keeps going rather than ever taking the process
//! down.

use crate::storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweep passes.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// Dropping the handle stops the background task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the sweeper as a background task over the given store.
    pub fn start(store: Arc<Store>, config: SweeperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper. Called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop: sleep, sweep, log, repeat.
async fn sweeper_loop(
    store: Arc<Store>,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let expired = store.sweep_expired();
        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = store.len(),
                "Expired keys swept"
            );
        }
    }
}

/// Starts the expiry sweeper with the default one-second interval.
pub fn start_expiry_sweeper(store: Arc<Store>) -> ExpirySweeper {
    ExpirySweeper::start(store, SweeperConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn sweeper_cleans_expired_keys() {
        let store = Arc::new(Store::new());

        for i in 0..10 {
            store.set_with_ttl(
                Bytes::from(format!("key{}", i)),
                Bytes::from("value"),
                Duration::from_millis(40),
            );
        }
        store.set(Bytes::from("persistent"), Bytes::from("value"));
        assert_eq!(store.len(), 11);

        let config = SweeperConfig {
            interval: Duration::from_millis(10),
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&store), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&Bytes::from("persistent")),
            Some(Bytes::from("value"))
        );
    }

    #[tokio::test]
    async fn sweeper_stops_on_drop() {
        let store = Arc::new(Store::new());

        {
            let _sweeper = ExpirySweeper::start(
                Arc::clone(&store),
                SweeperConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
            // Sweeper handle is dropped here.
        }

        store.set_with_ttl(
            Bytes::from("key"),
            Bytes::from("value"),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        // No sweeper ran, but lazy expiry still hides the key.
        assert_eq!(store.get(&Bytes::from("key")), None);
    }
}
