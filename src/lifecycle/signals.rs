//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGINT/SIGTERM trigger graceful shutdown
//! - SIGHUP triggers a reload, not shutdown

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::ReloadTrigger;

/// Translate OS signals into shutdown and reload events until shutdown.
pub fn spawn_signal_handler(shutdown: Arc<Shutdown>, reloads: mpsc::Sender<ReloadTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sighup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
                (Ok(term), Ok(hup)) => (term, hup),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "Failed to register signal handlers, Ctrl+C only");
                    wait_for_ctrl_c().await;
                    shutdown.trigger();
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received SIGINT, initiating graceful shutdown");
                        break;
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        break;
                    }
                    _ = sighup.recv() => {
                        tracing::info!("Received SIGHUP, reloading");
                        if reloads.send(ReloadTrigger::Signal).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = &reloads;
            wait_for_ctrl_c().await;
        }

        shutdown.trigger();
    })
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to wait for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
}
