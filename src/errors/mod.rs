//! Error isolation subsystem.
//!
//! # Data Flow
//! ```text
//! Reload:
//!     per-route compile failures → registry.rs (compile store, replaced wholesale)
//!
//! Request:
//!     template execution failure → registry.rs (runtime store)
//!     API handler panic          → registry.rs (api store, METHOD + pattern)
//!     any recorded error         → page.rs (themed page) or JSON envelope
//!
//! Operator:
//!     registry.summary() → admin endpoint, post-reload log lines
//! ```
//!
//! # Design Decisions
//! - Entries are sticky until the owning route recompiles cleanly
//! - Stores never block request paths (sharded concurrent maps)
//! - Error pages degrade to inline HTML; they never fail

pub mod page;
pub mod registry;

use std::any::Any;

pub use page::{render_error_page, ErrorView};
pub use registry::{describe, ErrorKind, ErrorRecord, ErrorRegistry, ErrorSummary};

/// Text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Log one warn line per recorded error, plus totals.
pub fn log_summary(summary: &ErrorSummary) {
    if summary.is_empty() {
        tracing::info!("No recorded errors");
        return;
    }
    tracing::warn!(
        compile = summary.compile.len(),
        runtime = summary.runtime.len(),
        api = summary.api.len(),
        "Error summary"
    );
    for record in summary
        .compile
        .iter()
        .chain(&summary.runtime)
        .chain(&summary.api)
    {
        tracing::warn!(
            kind = ?record.kind,
            key = %record.key,
            status = record.status,
            error = %record.detail,
            "Recorded error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");
    }
}
