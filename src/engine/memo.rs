//! Memoized metadata extraction.
//!
//! # Data Flow
//! ```text
//! extract(path, content)
//!     → memo hit (same fingerprint, not expired) → cached metadata
//!     → content < threshold → extract inline
//!     → content ≥ threshold → job queue → worker thread → oneshot reply
//! ```
//!
//! # Design Decisions
//! - Workers are OS threads draining a shared channel with `blocking_recv`
//! - Entries are keyed by path and checked against a content fingerprint
//! - A periodic sweep drops expired entries; it holds only a weak reference

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::MetadataConfig;
use crate::engine::metadata::{extract, MetadataDefaults, PageMetadata};

struct MemoEntry {
    fingerprint: u64,
    metadata: Arc<PageMetadata>,
    expires_at: Instant,
}

struct ExtractJob {
    content: String,
    reply: oneshot::Sender<PageMetadata>,
}

/// Path-keyed memo in front of the directive extractor.
pub struct MetadataMemo {
    entries: DashMap<String, MemoEntry>,
    defaults: Arc<MetadataDefaults>,
    jobs: mpsc::Sender<ExtractJob>,
    ttl: Duration,
    threshold: usize,
}

impl MetadataMemo {
    /// Create the memo and start its extraction workers.
    pub fn new(defaults: Arc<MetadataDefaults>, config: &MetadataConfig) -> Arc<Self> {
        let workers = config.extract_workers.max(1);
        let (jobs, rx) = mpsc::channel::<ExtractJob>(workers * 4);
        let rx = Arc::new(Mutex::new(rx));

        for index in 0..workers {
            let rx = Arc::clone(&rx);
            let defaults = Arc::clone(&defaults);
            let spawned = thread::Builder::new()
                .name(format!("pagewing-extract-{index}"))
                .spawn(move || extract_worker(rx, defaults));
            if let Err(e) = spawned {
                tracing::warn!(worker = index, error = %e, "Failed to start extraction worker");
            }
        }

        Arc::new(Self {
            entries: DashMap::new(),
            defaults,
            jobs,
            ttl: Duration::from_secs(config.memo_ttl_secs),
            threshold: config.large_input_threshold,
        })
    }

    /// Metadata for `content`, read from `path`.
    pub async fn extract(&self, path: &str, content: &str) -> Arc<PageMetadata> {
        let fingerprint = fingerprint(content);
        if let Some(hit) = self.lookup(path, fingerprint) {
            return hit;
        }

        let metadata = if content.len() >= self.threshold {
            self.extract_on_pool(content).await
        } else {
            extract(content, &self.defaults)
        };

        let metadata = Arc::new(metadata);
        self.entries.insert(
            path.to_string(),
            MemoEntry {
                fingerprint,
                metadata: Arc::clone(&metadata),
                expires_at: Instant::now() + self.ttl,
            },
        );
        metadata
    }

    fn lookup(&self, path: &str, fingerprint: u64) -> Option<Arc<PageMetadata>> {
        let entry = self.entries.get(path)?;
        if entry.fingerprint == fingerprint && entry.expires_at > Instant::now() {
            Some(Arc::clone(&entry.metadata))
        } else {
            None
        }
    }

    async fn extract_on_pool(&self, content: &str) -> PageMetadata {
        let (reply, rx) = oneshot::channel();
        let job = ExtractJob {
            content: content.to_string(),
            reply,
        };
        if self.jobs.send(job).await.is_err() {
            return extract(content, &self.defaults);
        }
        match rx.await {
            Ok(metadata) => metadata,
            Err(_) => extract(content, &self.defaults),
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run `sweep` every `every` until the memo is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let memo: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(memo) = memo.upgrade() else {
                    break;
                };
                let removed = memo.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = memo.len(), "Swept metadata memo");
                }
            }
        })
    }
}

fn extract_worker(rx: Arc<Mutex<mpsc::Receiver<ExtractJob>>>, defaults: Arc<MetadataDefaults>) {
    loop {
        let job = rx.lock().blocking_recv();
        let Some(job) = job else {
            break;
        };
        let _ = job.reply.send(extract(&job.content, &defaults));
    }
}

fn fingerprint(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    fn memo_with_threshold(threshold: usize) -> Arc<MetadataMemo> {
        let config = SiteConfig::default();
        let mut metadata = config.metadata.clone();
        metadata.large_input_threshold = threshold;
        metadata.extract_workers = 2;
        let defaults = Arc::new(MetadataDefaults::from_config(&config));
        MetadataMemo::new(defaults, &metadata)
    }

    #[tokio::test]
    async fn test_memoizes_by_path() {
        let memo = memo_with_threshold(1024);
        let first = memo.extract("/a.html", "<!--title:A-->").await;
        let second = memo.extract("/a.html", "<!--title:A-->").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn test_changed_content_is_reextracted() {
        let memo = memo_with_threshold(1024);
        let first = memo.extract("/a.html", "<!--title:A-->").await;
        let second = memo.extract("/a.html", "<!--title:B-->").await;
        assert_eq!(first.title, "A");
        assert_eq!(second.title, "B");
    }

    #[tokio::test]
    async fn test_large_inputs_use_worker_pool() {
        let memo = memo_with_threshold(16);
        let page = format!("<!--title:Big-->{}", "x".repeat(64));
        let metadata = memo.extract("/big.html", &page).await;
        assert_eq!(metadata.title, "Big");
    }

    #[tokio::test]
    async fn test_sweep_drops_expired() {
        let config = SiteConfig::default();
        let mut metadata = config.metadata.clone();
        metadata.memo_ttl_secs = 0;
        let memo = MetadataMemo::new(Arc::new(MetadataDefaults::from_config(&config)), &metadata);
        memo.extract("/a.html", "<p>a</p>").await;
        assert_eq!(memo.sweep(), 1);
        assert!(memo.is_empty());
    }
}
