//! Template engine subsystem.
//!
//! # Data Flow
//! ```text
//! Reload:
//!     pipeline.rs (join: components, bundles, layout → walk → bounded fan-out)
//!         → metadata.rs (directive grammar, via memo.rs)
//!         → compiler.rs (layout + components + page → composite unit)
//!     → generation.rs (immutable snapshot: routes, templates, metadata, caches)
//!     → render.rs prerender (parameter-free SSG routes)
//!
//! Request:
//!     render.rs
//!         → error registry check
//!         → cache.rs (SSG entry, then SSR output)
//!         → merge.rs (defaults < layout < page, memoized per generation)
//!         → context.rs (closed template context) → execute
//!         → scripts.rs (script tags before </head>)
//!         → ssg.rs (bounded persistence queue)
//! ```
//!
//! # Design Decisions
//! - A generation is never mutated after it is published, except its caches
//! - Caches live inside the generation, so a swap invalidates them together
//! - Only layout and component loading can fail a reload

pub mod cache;
pub mod compiler;
pub mod context;
pub mod generation;
pub mod memo;
pub mod merge;
pub mod metadata;
pub mod pipeline;
pub mod render;
pub mod scripts;
pub mod ssg;

pub use compiler::{CompileError, CompiledTemplate};
pub use context::{ConfigSnapshot, PageData, RenderContext, RequestInfo};
pub use generation::Generation;
pub use memo::MetadataMemo;
pub use metadata::{MetadataDefaults, PageMetadata, RenderMode, ScriptLibrary};
pub use pipeline::{BuildOutput, Pipeline, PipelineError};
pub use render::{RenderEngine, RenderError};
