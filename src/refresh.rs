//! Background auto-refresh timer
//!
//! A tokio task ticks on a fixed interval and tells the main loop to reload
//! the visible page. The reload itself runs on the main loop, which owns the
//! `App`.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Messages sent from the background timer to the main loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshMessage {
    /// The refresh interval elapsed
    Tick,
}

/// Configuration for the refresh interval
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between automatic reloads
    pub interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh timer
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Creates a new RefreshHandle and spawns the timer task
    ///
    /// # Arguments
    /// * `config` - Refresh interval configuration
    ///
    /// # Returns
    /// A RefreshHandle that receives ticks via the `receiver` channel
    pub fn spawn(config: RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(8);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            let period = config.interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            debug!("auto-refresh tick");
                            if msg_tx.send(RefreshMessage::Tick).await.is_err() {
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Shuts down the timer task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Checks for pending refresh messages without blocking
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_config_default() {
        let config = RefreshConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_refresh_handle_spawn_disabled() {
        let config = RefreshConfig {
            enabled: false,
            ..Default::default()
        };

        let mut handle = RefreshHandle::spawn(config);

        // With refresh disabled, there should be no messages
        assert!(try_recv(&mut handle).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_handle_ticks_after_interval() {
        let mut handle = RefreshHandle::spawn(RefreshConfig::default());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(try_recv(&mut handle).is_none());

        let message = tokio::time::timeout(Duration::from_secs(5), handle.receiver.recv())
            .await
            .unwrap();
        assert_eq!(message, Some(RefreshMessage::Tick));

        handle.shutdown().await;
    }
}
