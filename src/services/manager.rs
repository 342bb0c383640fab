//! Service registration, spawning, and coordinated shutdown.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A long-running component with cooperative shutdown.
///
/// Implementations run until their work is done or the shutdown receiver
/// fires, whichever comes first.
#[async_trait]
pub trait Service: Send + 'static {
    fn name(&self) -> &'static str;
    async fn run(self: Box<Self>, shutdown_rx: broadcast::Receiver<()>);
}

pub struct ServiceManager {
    shutdown_tx: broadcast::Sender<()>,
    pending: Vec<Box<dyn Service>>,
    running: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            pending: Vec::new(),
            running: Vec::new(),
        }
    }

    pub fn register_service(&mut self, service: Box<dyn Service>) {
        self.pending.push(service);
    }

    pub fn has_services(&self) -> bool {
        !self.pending.is_empty() || !self.running.is_empty()
    }

    /// Spawn every registered service onto the runtime.
    pub fn spawn_all(&mut self) {
        for service in self.pending.drain(..) {
            let name = service.name();
            let shutdown_rx = self.shutdown_tx.subscribe();
            info!(service = name, "spawning service");
            let handle = tokio::spawn(service.run(shutdown_rx));
            self.running.push((name, handle));
        }
    }

    /// Broadcast shutdown and wait up to `timeout` for services to drain.
    ///
    /// Services still running after the bound are aborted.
    pub async fn shutdown(mut self, timeout: Duration) {
        info!(
            timeout = ?timeout,
            services = self.running.len(),
            "shutting down services"
        );
        // Err means no live receivers, which is fine during early shutdown.
        let _ = self.shutdown_tx.send(());

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, handle) in &mut self.running {
            match tokio::time::timeout_at(deadline, &mut *handle).await {
                Ok(Ok(())) => info!(service = name, "service stopped"),
                Ok(Err(e)) => warn!(service = name, error = ?e, "service task panicked"),
                Err(_) => {
                    warn!(service = name, "service did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}
