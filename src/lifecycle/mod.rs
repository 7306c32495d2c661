//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Reload triggers:
//!     SIGHUP (signals.rs) ─┐
//!     file change (watcher.rs, debounced) ─┴→ reload loop → Site::reload
//!
//! Shutdown (shutdown.rs):
//!     SIGINT/SIGTERM → broadcast → server drains, loops exit
//! ```
//!
//! # Design Decisions
//! - Reload requests are serialized through one loop; the site lock does the rest
//! - A failed reload is logged and the previous generation keeps serving

pub mod shutdown;
pub mod signals;
pub mod watcher;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::app::Site;

pub use shutdown::Shutdown;

/// Why a reload was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    Signal,
    FileChange(Vec<PathBuf>),
}

/// Run `Site::reload` for every trigger until shutdown.
pub fn spawn_reload_loop(
    site: Arc<Site>,
    mut triggers: mpsc::Receiver<ReloadTrigger>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                trigger = triggers.recv() => {
                    let Some(trigger) = trigger else { break };
                    match &trigger {
                        ReloadTrigger::Signal => tracing::info!("Reload requested by signal"),
                        ReloadTrigger::FileChange(paths) => {
                            for path in paths {
                                tracing::debug!(path = %path.display(), "Changed");
                            }
                        }
                    }
                    if let Err(e) = site.reload().await {
                        tracing::error!(error = %crate::errors::describe(&e), "Reload failed");
                    }
                }
            }
        }
    })
}
