//! Per-generation output caches.
//!
//! Both caches live inside a generation and are dropped with it, so a reload
//! invalidates them wholesale. Neither evicts individual entries.

use std::sync::Arc;

use dashmap::DashMap;

/// Rendered server-side output keyed by normalized request path.
#[derive(Debug)]
pub struct RenderCache {
    entries: DashMap<String, Arc<str>>,
    max_entries: usize,
    max_bytes: usize,
}

impl RenderCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            max_bytes,
        }
    }

    pub fn get(&self, path: &str) -> Option<Arc<str>> {
        self.entries.get(path).map(|e| Arc::clone(e.value()))
    }

    /// Store `html` unless it exceeds the size cutoff or the cache is full.
    pub fn insert(&self, path: &str, html: &str) -> bool {
        if html.len() > self.max_bytes {
            return false;
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(path) {
            return false;
        }
        self.entries.insert(path.to_string(), Arc::from(html));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Statically generated pages keyed by normalized request path.
#[derive(Debug, Default)]
pub struct SsgCache {
    entries: DashMap<String, Arc<str>>,
}

impl SsgCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Arc<str>> {
        self.entries.get(path).map(|e| Arc::clone(e.value()))
    }

    /// Store `html` for `path` unless an entry already exists.
    ///
    /// Returns the entry now held, so racing writers agree on one body.
    pub fn insert_if_absent(&self, path: &str, html: Arc<str>) -> Arc<str> {
        Arc::clone(self.entries.entry(path.to_string()).or_insert(html).value())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_cache_size_cutoff() {
        let cache = RenderCache::new(8, 10);
        assert!(cache.insert("/small", "0123456789"));
        assert!(!cache.insert("/big", "0123456789a"));
        assert!(cache.get("/big").is_none());
        assert_eq!(&*cache.get("/small").unwrap(), "0123456789");
    }

    #[test]
    fn test_render_cache_entry_bound() {
        let cache = RenderCache::new(1, 100);
        assert!(cache.insert("/a", "a"));
        assert!(!cache.insert("/b", "b"));
        assert!(cache.insert("/a", "a2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ssg_first_writer_wins() {
        let cache = SsgCache::new();
        let first = cache.insert_if_absent("/", Arc::from("one"));
        let second = cache.insert_if_absent("/", Arc::from("two"));
        assert_eq!(&*first, "one");
        assert_eq!(&*second, "one");
        assert_eq!(cache.paths(), vec!["/".to_string()]);
    }
}
