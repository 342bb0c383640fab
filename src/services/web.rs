//! The HTTP API service.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::services::manager::Service;
use crate::state::{AppState, ServiceStatus};
use crate::web::create_router;

pub struct WebService {
    port: u16,
    state: AppState,
}

impl WebService {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }
}

#[async_trait]
impl Service for WebService {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn run(self: Box<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let statuses = self.state.service_statuses.clone();
        statuses.set("web", ServiceStatus::Starting);

        let router = create_router(self.state);
        let addr = format!("0.0.0.0:{}", self.port);

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = %addr, error = %e, "failed to bind web listener");
                statuses.set("web", ServiceStatus::Error);
                return;
            }
        };

        info!(addr = %addr, "web server listening");
        statuses.set("web", ServiceStatus::Active);

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;

        match result {
            Ok(()) => {
                info!("web server stopped");
                statuses.set("web", ServiceStatus::Disabled);
            }
            Err(e) => {
                error!(error = %e, "web server exited with error");
                statuses.set("web", ServiceStatus::Error);
            }
        }
    }
}
