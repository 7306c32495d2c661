//! Per-route error stores.
//!
//! Three independent concurrent maps: compile errors and runtime errors keyed by
//! route, API errors keyed by method + route pattern.
//!
//! Runtime and API records carry the generation they were raised in. A request
//! only ever sees records of its own generation, so a late failure from a
//! superseded snapshot cannot block a route that has since been recompiled.
//! The compile store mirrors `Generation::compile_errors` of the published
//! generation for reporting; the render path consults the snapshot itself.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

/// Which store a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The route failed to compile during a reload.
    Compile,
    /// The route's template failed while executing.
    Runtime,
    /// An API handler panicked.
    Api,
}

/// A recorded failure.
#[derive(Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Route path, or `METHOD pattern` for API records.
    pub key: String,
    pub message: String,
    pub detail: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
    /// Generation the failure was observed in.
    pub generation: u64,
    #[serde(skip)]
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl ErrorRecord {
    pub fn new(
        kind: ErrorKind,
        key: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            message: message.into(),
            detail: detail.into(),
            status: status.as_u16(),
            timestamp: Utc::now(),
            generation: 0,
            cause: None,
        }
    }

    #[must_use]
    pub fn at_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Record built from an error value; the detail is its full source chain.
    pub fn from_error<E>(kind: ErrorKind, key: impl Into<String>, status: StatusCode, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let key = key.into();
        let message = match kind {
            ErrorKind::Compile => format!("The page '{}' could not be compiled", key),
            ErrorKind::Runtime => format!("The page '{}' could not be rendered", key),
            ErrorKind::Api => format!("The endpoint '{}' failed", key),
        };
        let detail = describe(&err);
        let mut record = Self::new(kind, key, message, detail, status);
        record.cause = Some(Arc::new(err));
        record
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Title shown on the error page.
    pub fn title(&self) -> &'static str {
        match self.kind {
            ErrorKind::Compile => "Page Compilation Error",
            ErrorKind::Runtime => "Page Rendering Error",
            ErrorKind::Api => "API Error",
        }
    }
}

impl fmt::Debug for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecord")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("status", &self.status)
            .field("generation", &self.generation)
            .field("detail", &self.detail)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Render an error and its sources as one line.
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}

/// Key of an API record.
pub fn api_key(method: &Method, pattern: &str) -> String {
    format!("{} {}", method, pattern)
}

/// Snapshot of every store, sorted by key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorSummary {
    pub compile: Vec<ErrorRecord>,
    pub runtime: Vec<ErrorRecord>,
    pub api: Vec<ErrorRecord>,
}

impl ErrorSummary {
    pub fn is_empty(&self) -> bool {
        self.compile.is_empty() && self.runtime.is_empty() && self.api.is_empty()
    }

    pub fn total(&self) -> usize {
        self.compile.len() + self.runtime.len() + self.api.len()
    }
}

/// Concurrent error stores shared by the reload pipeline and request handlers.
#[derive(Debug, Default)]
pub struct ErrorRegistry {
    compile: DashMap<String, ErrorRecord>,
    runtime: DashMap<String, ErrorRecord>,
    api: DashMap<String, ErrorRecord>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_compile(&self, record: ErrorRecord) {
        self.compile.insert(record.key.clone(), record);
    }

    pub fn compile_error(&self, route: &str) -> Option<ErrorRecord> {
        self.compile.get(route).map(|r| r.value().clone())
    }

    pub fn has_compile_error(&self, route: &str) -> bool {
        self.compile.contains_key(route)
    }

    pub fn clear_compile(&self, route: &str) {
        self.compile.remove(route);
    }

    /// Replace the compile store with the failures of the latest reload.
    pub fn replace_compile<'a, I>(&self, records: I)
    where
        I: IntoIterator<Item = &'a ErrorRecord>,
    {
        self.compile.clear();
        for record in records {
            self.register_compile(record.clone());
        }
    }

    /// Record a runtime failure unless a newer generation already holds the key.
    pub fn register_runtime(&self, record: ErrorRecord) {
        insert_latest(&self.runtime, record);
    }

    pub fn runtime_error(&self, route: &str) -> Option<ErrorRecord> {
        self.runtime.get(route).map(|r| r.value().clone())
    }

    /// The runtime failure raised for `route` in `generation`, if any.
    pub fn runtime_error_at(&self, route: &str, generation: u64) -> Option<ErrorRecord> {
        lookup_at(&self.runtime, route, generation)
    }

    pub fn has_runtime_error(&self, route: &str) -> bool {
        self.runtime.contains_key(route)
    }

    pub fn clear_runtime(&self, route: &str) {
        self.runtime.remove(route);
    }

    /// Drop runtime records raised before `generation`.
    pub fn prune_runtime(&self, generation: u64) {
        self.runtime.retain(|_, record| record.generation >= generation);
    }

    pub fn register_api(&self, record: ErrorRecord) {
        insert_latest(&self.api, record);
    }

    pub fn api_error(&self, method: &Method, pattern: &str) -> Option<ErrorRecord> {
        self.api
            .get(&api_key(method, pattern))
            .map(|r| r.value().clone())
    }

    /// The failure recorded for an endpoint in `generation`, if any.
    pub fn api_error_at(&self, method: &Method, pattern: &str, generation: u64) -> Option<ErrorRecord> {
        lookup_at(&self.api, &api_key(method, pattern), generation)
    }

    pub fn has_api_error(&self, method: &Method, pattern: &str) -> bool {
        self.api.contains_key(&api_key(method, pattern))
    }

    pub fn clear_api(&self, method: &Method, pattern: &str) {
        self.api.remove(&api_key(method, pattern));
    }

    /// Drop API records raised before `generation`.
    pub fn prune_api(&self, generation: u64) {
        self.api.retain(|_, record| record.generation >= generation);
    }

    pub fn summary(&self) -> ErrorSummary {
        fn sorted(map: &DashMap<String, ErrorRecord>) -> Vec<ErrorRecord> {
            let mut records: Vec<_> = map.iter().map(|r| r.value().clone()).collect();
            records.sort_by(|a, b| a.key.cmp(&b.key));
            records
        }
        ErrorSummary {
            compile: sorted(&self.compile),
            runtime: sorted(&self.runtime),
            api: sorted(&self.api),
        }
    }
}

fn insert_latest(map: &DashMap<String, ErrorRecord>, record: ErrorRecord) {
    match map.entry(record.key.clone()) {
        Entry::Occupied(mut held) => {
            if held.get().generation <= record.generation {
                held.insert(record);
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(record);
        }
    }
}

fn lookup_at(map: &DashMap<String, ErrorRecord>, key: &str, generation: u64) -> Option<ErrorRecord> {
    let record = map.get(key)?;
    (record.generation == generation).then(|| record.value().clone())
}
