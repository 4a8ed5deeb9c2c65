//! OS signal handling and graceful shutdown orchestration.

use std::process::ExitCode;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

use crate::services::manager::ServiceManager;
use crate::services::ServiceResult;
use crate::utils::fmt_duration;

/// Waits for a service to exit unexpectedly or for a shutdown signal,
/// whichever comes first, then drains the remaining services.
pub async fn handle_shutdown_signals(mut service_manager: ServiceManager, shutdown_timeout: Duration) -> ExitCode {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c signal handler");
        info!("received ctrl+c, gracefully shutting down...");
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm_stream = signal(SignalKind::terminate()).expect("failed to install SIGTERM signal handler");
        sigterm_stream.recv().await;
        info!("received SIGTERM, gracefully shutting down...");
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let mut exit_code = ExitCode::SUCCESS;

    tokio::select! {
        (service_name, result) = service_manager.run() => {
            match result {
                ServiceResult::GracefulShutdown => {
                    info!(service = service_name, "service completed gracefully");
                }
                ServiceResult::NormalCompletion => {
                    warn!(service = service_name, "service completed unexpectedly");
                    exit_code = ExitCode::FAILURE;
                }
                ServiceResult::Error(error) => {
                    error!(service = service_name, %error, "service failed");
                    exit_code = ExitCode::FAILURE;
                }
            }
            exit_code = graceful_shutdown(service_manager, shutdown_timeout, exit_code).await;
        }
        _ = ctrl_c => {
            exit_code = graceful_shutdown(service_manager, shutdown_timeout, ExitCode::SUCCESS).await;
        }
        _ = sigterm => {
            exit_code = graceful_shutdown(service_manager, shutdown_timeout, ExitCode::SUCCESS).await;
        }
    }

    info!(?exit_code, "application shutdown complete");
    exit_code
}

async fn graceful_shutdown(mut service_manager: ServiceManager, shutdown_timeout: Duration, current_exit_code: ExitCode) -> ExitCode {
    match service_manager.shutdown(shutdown_timeout).await {
        Ok(elapsed) => {
            info!(remaining = fmt_duration(shutdown_timeout.saturating_sub(elapsed)), "graceful shutdown complete");
            current_exit_code
        }
        Err(pending) => {
            warn!(pending_count = pending.len(), pending_services = ?pending, "graceful shutdown timed out");
            if current_exit_code == ExitCode::SUCCESS {
                ExitCode::FAILURE
            } else {
                current_exit_code
            }
        }
    }
}
