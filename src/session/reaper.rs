//! Background task ending idle sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::session::SessionRegistry;

pub struct SessionReaper {
    registry: Arc<SessionRegistry>,
    interval: Duration,
}

impl SessionReaper {
    pub fn new(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.interval.is_zero() {
            tracing::info!("Session reaping disabled");
            return;
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "Session reaper starting");
        let mut ticker = time::interval(self.interval);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.registry.reap_idle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, ProxyConfig};
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn test_reaper_ends_idle_sessions_and_stops() {
        let mut config = ProxyConfig::default();
        config.session.idle_timeout_secs = 0;
        config.backends.push(BackendConfig {
            name: "services".into(),
            base_url: "http://127.0.0.1:9/eureka-services".into(),
        });
        let registry = Arc::new(SessionRegistry::new(Arc::new(config)));
        registry.open(None).unwrap();

        let shutdown = Shutdown::new();
        let reaper = SessionReaper::new(registry.clone(), Duration::from_millis(10));
        let handle = tokio::spawn(reaper.run(shutdown.subscribe()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.is_empty());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
