//! The `Service` abstraction: every long-lived background task (the HTTP
//! server, the scraper workers) implements this trait and is driven by the
//! `ServiceManager` under a shared broadcast shutdown signal.

use async_trait::async_trait;
use tokio::sync::broadcast;

pub mod manager;
pub mod scraper;
pub mod signals;
pub mod web;

pub use manager::ServiceManager;

#[derive(Debug)]
pub enum ServiceResult {
    GracefulShutdown,
    NormalCompletion,
    Error(anyhow::Error),
}

#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&mut self) -> anyhow::Result<()>;
    async fn shutdown(&mut self);
}

/// Runs a service to completion or until `shutdown_rx` fires, whichever
/// happens first.
pub async fn run_service(
    mut service: Box<dyn Service>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> ServiceResult {
    tokio::select! {
        result = service.run() => {
            match result {
                Ok(()) => ServiceResult::NormalCompletion,
                Err(error) => ServiceResult::Error(error),
            }
        }
        _ = shutdown_rx.recv() => {
            let start = std::time::Instant::now();
            service.shutdown().await;
            tracing::info!(service = service.name(), elapsed = ?start.elapsed(), "service shut down");
            ServiceResult::GracefulShutdown
        }
    }
}
