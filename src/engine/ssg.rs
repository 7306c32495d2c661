//! Static generation: disk persistence and the regeneration queue.
//!
//! # Data Flow
//! ```text
//! render (SSG route, cache miss)
//!     → SsgCache::insert_if_absent (in memory, on the request path)
//!     → SsgQueue::offer (bounded; full → drop + count)
//!     → worker: generation still current? → persist to disk
//! ```
//!
//! # Design Decisions
//! - Backpressure by dropping: a full queue never blocks a request
//! - Workers hold weak references; superseded generations are skipped
//! - Cache files mirror the route tree: `/` → `index.html`, `/a/b` → `a/b.html`

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::engine::generation::Generation;
use crate::observability::metrics;

/// File a statically generated page is persisted to.
pub fn cache_file(dir: &Path, path: &str) -> PathBuf {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return dir.join("index.html");
    }
    let segments: Vec<&str> = trimmed
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    let mut file = dir.to_path_buf();
    match segments.split_last() {
        Some((last, parents)) => {
            file.extend(parents);
            file.push(format!("{last}.html"));
        }
        None => file.push("index.html"),
    }
    file
}

/// Write a page below `dir`, creating parent directories.
pub async fn persist(dir: &Path, path: &str, html: &str) -> io::Result<PathBuf> {
    let file = cache_file(dir, path);
    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&file, html).await?;
    Ok(file)
}

/// One page to write to the static cache directory.
pub struct SsgTask {
    pub generation: Weak<Generation>,
    pub path: String,
    pub html: Arc<str>,
}

/// Bounded handoff from request handlers to the regeneration workers.
#[derive(Clone)]
pub struct SsgQueue {
    tx: mpsc::Sender<SsgTask>,
    current: Arc<AtomicU64>,
}

impl SsgQueue {
    /// Create the queue and start `workers` tasks persisting into `dir`.
    pub fn start(capacity: usize, workers: usize, dir: PathBuf) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let current = Arc::new(AtomicU64::new(0));

        let handles = (0..workers.max(1))
            .map(|_| {
                tokio::spawn(worker(
                    Arc::clone(&rx),
                    Arc::clone(&current),
                    dir.clone(),
                ))
            })
            .collect();

        (Self { tx, current }, handles)
    }

    /// Mark `id` as the generation being served.
    pub fn set_current(&self, id: u64) {
        self.current.store(id, Ordering::Release);
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Enqueue without waiting. Returns `false` if the task was dropped.
    pub fn offer(&self, task: SsgTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                tracing::warn!(path = %task.path, "Static regeneration queue full, dropping task");
                metrics::record_ssg_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

async fn worker(rx: Arc<Mutex<mpsc::Receiver<SsgTask>>>, current: Arc<AtomicU64>, dir: PathBuf) {
    loop {
        let task = { rx.lock().await.recv().await };
        let Some(task) = task else {
            break;
        };
        let Some(generation) = task.generation.upgrade() else {
            continue;
        };
        if generation.id != current.load(Ordering::Acquire) {
            tracing::debug!(
                generation = generation.id,
                path = %task.path,
                "Skipping regeneration for superseded generation"
            );
            continue;
        }

        drop(generation);

        match persist(&dir, &task.path, &task.html).await {
            Ok(file) => tracing::debug!(path = %task.path, file = %file.display(), "Persisted static page"),
            Err(e) => tracing::warn!(path = %task.path, error = %e, "Failed to persist static page"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_layout() {
        let dir = Path::new("/cache");
        assert_eq!(cache_file(dir, "/"), PathBuf::from("/cache/index.html"));
        assert_eq!(cache_file(dir, "/about"), PathBuf::from("/cache/about.html"));
        assert_eq!(
            cache_file(dir, "/posts/hello"),
            PathBuf::from("/cache/posts/hello.html")
        );
        assert_eq!(cache_file(dir, "/../etc"), PathBuf::from("/cache/etc.html"));
        assert_eq!(cache_file(dir, "/v2.json"), PathBuf::from("/cache/v2.json.html"));
    }

    #[tokio::test]
    async fn test_persist_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let file = persist(dir.path(), "/posts/a", "<p>a</p>").await.unwrap();
        assert_eq!(std::fs::read_to_string(file).unwrap(), "<p>a</p>");
    }

    #[tokio::test]
    async fn test_offer_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = SsgQueue {
            tx,
            current: Arc::new(AtomicU64::new(0)),
        };
        let task = || SsgTask {
            generation: Weak::new(),
            path: "/".to_string(),
            html: Arc::from("x"),
        };
        assert!(queue.offer(task()));
        assert!(!queue.offer(task()));
    }

    #[tokio::test]
    async fn test_worker_persists_current_generation_only() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _workers) = SsgQueue::start(4, 1, dir.path().to_path_buf());
        let config = crate::config::SiteConfig::default();
        let current = Arc::new(Generation::empty(&config));
        let mut superseded = Generation::empty(&config);
        superseded.id = 3;
        let superseded = Arc::new(superseded);

        queue.set_current(current.id);
        assert!(queue.offer(SsgTask {
            generation: Arc::downgrade(&superseded),
            path: "/stale".to_string(),
            html: Arc::from("old"),
        }));
        assert!(queue.offer(SsgTask {
            generation: Arc::downgrade(&current),
            path: "/fresh".to_string(),
            html: Arc::from("new"),
        }));

        let fresh = cache_file(dir.path(), "/fresh");
        for _ in 0..100 {
            if std::fs::read_to_string(&fresh).is_ok_and(|body| body == "new") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::read_to_string(fresh).unwrap(), "new");
        assert!(!cache_file(dir.path(), "/stale").exists());
    }
}
