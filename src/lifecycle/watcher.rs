//! Source tree watcher for live reload.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::lifecycle::ReloadTrigger;

/// Watches the page and static trees and emits one reload per burst of changes.
pub struct SourceWatcher {
    roots: Vec<PathBuf>,
    ignore: Vec<PathBuf>,
    debounce: Duration,
}

impl SourceWatcher {
    /// Changes under any of `ignore` (generated bundles, the static cache) are dropped.
    pub fn new(roots: Vec<PathBuf>, ignore: Vec<PathBuf>, debounce: Duration) -> Self {
        Self {
            roots,
            ignore,
            debounce,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self, triggers: mpsc::Sender<ReloadTrigger>) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
        let ignore = self.ignore.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
                        return;
                    }
                    let paths: Vec<PathBuf> = event
                        .paths
                        .into_iter()
                        .filter(|p| !ignore.iter().any(|i| p.starts_with(i)))
                        .collect();
                    if !paths.is_empty() {
                        let _ = event_tx.send(paths);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for root in &self.roots {
            if root.exists() {
                watcher.watch(root, RecursiveMode::Recursive)?;
                tracing::info!(path = %root.display(), "Watching for changes");
            }
        }

        tokio::spawn(debounce(event_rx, triggers, self.debounce));
        Ok(watcher)
    }
}

/// Collapse events arriving within `quiet` of each other into one trigger.
async fn debounce(
    mut events: mpsc::UnboundedReceiver<Vec<PathBuf>>,
    triggers: mpsc::Sender<ReloadTrigger>,
    quiet: Duration,
) {
    while let Some(first) = events.recv().await {
        let mut changed: BTreeSet<PathBuf> = first.into_iter().collect();
        loop {
            match tokio::time::timeout(quiet, events.recv()).await {
                Ok(Some(more)) => changed.extend(more),
                Ok(None) | Err(_) => break,
            }
        }
        tracing::info!(files = changed.len(), "Source change detected, reloading");
        if triggers
            .send(ReloadTrigger::FileChange(changed.into_iter().collect()))
            .await
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_collapses_into_one_trigger() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (trigger_tx, mut trigger_rx) = mpsc::channel(4);
        tokio::spawn(debounce(event_rx, trigger_tx, Duration::from_millis(50)));

        event_tx.send(vec![PathBuf::from("app/a.html")]).unwrap();
        event_tx.send(vec![PathBuf::from("app/b.html")]).unwrap();
        event_tx.send(vec![PathBuf::from("app/a.html")]).unwrap();

        match trigger_rx.recv().await {
            Some(ReloadTrigger::FileChange(paths)) => {
                assert_eq!(paths, vec![PathBuf::from("app/a.html"), PathBuf::from("app/b.html")]);
            }
            other => panic!("unexpected trigger: {other:?}"),
        }
    }
}
