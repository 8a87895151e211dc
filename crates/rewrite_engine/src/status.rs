use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rewrite_logging::{rewrite_debug, rewrite_info, rewrite_warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ConnectionStatus, ModelClient};

struct Cached {
    status: ConnectionStatus,
    // Bumped whenever the client is pointed somewhere else.
    generation: u64,
}

/// Process-wide last known connectivity of the model server. Readers get
/// the cached value and never wait on the network.
#[derive(Clone)]
pub struct StatusMonitor {
    client: Arc<dyn ModelClient>,
    last: Arc<RwLock<Cached>>,
}

impl StatusMonitor {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            last: Arc::new(RwLock::new(Cached {
                status: ConnectionStatus::Unknown,
                generation: 0,
            })),
        }
    }

    pub fn current(&self) -> ConnectionStatus {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
            .clone()
    }

    /// Marks every check started before this call as stale. Call it right
    /// after reconfiguring the client.
    pub fn invalidate(&self) {
        let mut cached = self.last.write().unwrap_or_else(PoisonError::into_inner);
        cached.generation += 1;
    }

    /// Checks the server now and stores the result, unless the client was
    /// reconfigured while the check ran. Returns the stored status.
    pub async fn refresh(&self) -> ConnectionStatus {
        let generation = self
            .last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation;
        let status = match self.client.check_connection().await {
            Ok(()) => ConnectionStatus::Connected,
            Err(err) => ConnectionStatus::Unreachable(err.to_string()),
        };

        let mut cached = self.last.write().unwrap_or_else(PoisonError::into_inner);
        if cached.generation != generation {
            rewrite_debug!("dropping status of a replaced endpoint: {:?}", status);
            return cached.status.clone();
        }
        let previous = std::mem::replace(&mut cached.status, status.clone());
        drop(cached);
        if previous != status {
            match &status {
                ConnectionStatus::Connected => rewrite_info!("model server reachable"),
                ConnectionStatus::Unreachable(reason) => {
                    rewrite_warn!("model server unreachable: {}", reason)
                }
                ConnectionStatus::Unknown => {}
            }
        }
        status
    }

    /// Refreshes immediately and then every `interval` until `shutdown`.
    /// A check still in flight is abandoned on shutdown.
    pub fn spawn_periodic(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break,
                            _ = monitor.refresh() => {}
                        }
                    }
                }
            }
            rewrite_debug!("status refresh loop stopped");
        })
    }
}
