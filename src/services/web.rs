//! Wraps the axum HTTP surface as a `Service` (spec.md §5: "each HTTP
//! request runs on its own task").

use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing::info;

use crate::services::Service;
use crate::state::AppState;
use crate::web::routes::create_router;

pub struct WebService {
    port: u16,
    state: AppState,
    shutdown_notify: std::sync::Arc<tokio::sync::Notify>,
}

impl WebService {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state, shutdown_notify: std::sync::Arc::new(tokio::sync::Notify::new()) }
    }
}

#[async_trait]
impl Service for WebService {
    fn name(&self) -> &str {
        "web"
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let router = create_router(self.state.clone());
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!(port = self.port, "web service listening");

        let shutdown_notify = self.shutdown_notify.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown_notify.notified().await })
            .await?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.shutdown_notify.notify_one();
    }
}
