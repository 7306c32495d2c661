//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Site::dispatch ─┬─→ metrics.rs (request kind, status, latency)
//!                 └─→ logging.rs (route, path, generation, elapsed_ms)
//! Site::reload ───┬─→ metrics.rs (outcome, duration, page gauges)
//!                 └─→ errors::log_summary (per-route compile failures)
//! RenderEngine ───→ metrics.rs (ssg/render cache hits, dropped persist tasks)
//!
//! stdout (pretty or JSON) and the Prometheus scrape listener consume both.
//! ```
//!
//! # Design Decisions
//! - Every log event carries the route pattern, not just the concrete path
//! - Request IDs reach the access log through the tower-http trace layer
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
