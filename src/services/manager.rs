use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{run_service, Service, ServiceResult};

pub struct ServiceManager {
    registered: HashMap<String, Box<dyn Service>>,
    running: HashMap<String, JoinHandle<ServiceResult>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { registered: HashMap::new(), running: HashMap::new(), shutdown_tx }
    }

    pub fn register_service(&mut self, service: Box<dyn Service>) {
        self.registered.insert(service.name().to_string(), service);
    }

    pub fn spawn_all(&mut self) {
        for (name, service) in self.registered.drain() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(run_service(service, shutdown_rx));
            self.running.insert(name, handle);
        }
    }

    /// Polls running services and returns the first one to complete, by
    /// name, along with its result. Panicking services surface as
    /// `ServiceResult::Error`.
    pub async fn run(&mut self) -> (String, ServiceResult) {
        loop {
            let finished_name = self.running.iter().find(|(_, h)| h.is_finished()).map(|(n, _)| n.clone());

            if let Some(name) = finished_name {
                let handle = self.running.remove(&name).expect("just found it");
                let result = match handle.await {
                    Ok(result) => result,
                    Err(join_error) => ServiceResult::Error(anyhow::anyhow!(join_error)),
                };
                return (name, result);
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(&mut self, timeout: Duration) -> Result<Duration, Vec<String>> {
        let start = std::time::Instant::now();
        let _ = self.shutdown_tx.send(());

        let mut pending = Vec::new();
        for (name, handle) in self.running.drain() {
            match tokio::time::timeout(timeout, handle).await {
                Ok(_) => {}
                Err(_) => pending.push(name),
            }
        }

        if pending.is_empty() {
            Ok(start.elapsed())
        } else {
            Err(pending)
        }
    }
}
