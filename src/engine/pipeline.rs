//! Template compilation pipeline.
//!
//! # Data Flow
//! ```text
//! build()
//!     → join!(load components, bundle assets, read layout)   fail-fast
//!     → layout metadata (tier 2)
//!     → walk app dir (minus layout and components), sorted
//!     → fan-out: Semaphore(compile_concurrency) → per page:
//!           read → memoized metadata → strip directives → compile (blocking pool)
//!     → collector drains handles in walk order
//!           ok     → pages
//!           failed → per-route compile error
//! ```
//!
//! # Design Decisions
//! - Only components and the layout are foundational; a page never fails a build
//! - A panic while compiling one page becomes that page's compile error
//! - The first source file claiming a route keeps it; later ones are skipped

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::config::SiteConfig;
use crate::engine::compiler::{CompileError, CompiledTemplate};
use crate::engine::memo::MetadataMemo;
use crate::engine::metadata::{strip_directives, PageMetadata};
use crate::errors::{panic_message, ErrorKind, ErrorRecord};
use crate::routing::route_path_from_file;

/// Failures that abort a whole reload.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load components from {path}: {source}")]
    Components {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read layout {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to bundle assets in {path}: {source}")]
    Bundle {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to scan pages under {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pipeline task failed: {0}")]
    Task(String),
}

/// One successfully compiled page.
#[derive(Debug)]
pub struct CompiledPage {
    pub route: String,
    pub source: PathBuf,
    pub template: Arc<CompiledTemplate>,
    pub metadata: Arc<PageMetadata>,
}

/// Everything a reload produced.
#[derive(Debug)]
pub struct BuildOutput {
    pub pages: Vec<CompiledPage>,
    pub failures: Vec<ErrorRecord>,
    pub layout_metadata: Arc<PageMetadata>,
    pub component_count: usize,
    pub bundles: BTreeMap<String, String>,
    pub error_template: Option<String>,
}

struct SharedSources {
    layout: String,
    components: BTreeMap<String, String>,
}

/// Rebuilds compiled state from the source tree.
pub struct Pipeline {
    config: Arc<SiteConfig>,
    memo: Arc<MetadataMemo>,
}

impl Pipeline {
    pub fn new(config: Arc<SiteConfig>, memo: Arc<MetadataMemo>) -> Self {
        Self { config, memo }
    }

    pub fn memo(&self) -> &Arc<MetadataMemo> {
        &self.memo
    }

    pub async fn build(&self) -> Result<BuildOutput, PipelineError> {
        let paths = &self.config.paths;
        let ext = paths.page_extension.clone();

        let component_dir = paths.component_dir.clone();
        let static_dir = paths.static_dir.clone();
        let static_prefix = self.config.server.static_prefix.clone();
        let bundle = self.config.render.bundle_assets;

        let (components, bundles, layout) = tokio::join!(
            blocking({
                let ext = ext.clone();
                move || load_components(&component_dir, &ext)
            }),
            async move {
                if bundle {
                    blocking(move || bundle_assets(&static_dir, &static_prefix)).await
                } else {
                    Ok(Ok(BTreeMap::new()))
                }
            },
            tokio::fs::read_to_string(&paths.layout_path),
        );

        let components = components?.map_err(|source| PipelineError::Components {
            path: paths.component_dir.clone(),
            source,
        })?;
        let bundles = bundles?.map_err(|source| PipelineError::Bundle {
            path: paths.static_dir.clone(),
            source,
        })?;
        let layout = layout.map_err(|source| PipelineError::Layout {
            path: paths.layout_path.clone(),
            source,
        })?;

        let layout_key = paths.layout_path.display().to_string();
        let layout_metadata = self.memo.extract(&layout_key, &layout).await;

        let error_template = match &paths.error_template {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(source) => Some(source),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Error template unreadable, using built-in");
                    None
                }
            },
            None => None,
        };

        let sources = blocking({
            let app_dir = paths.app_dir.clone();
            let layout_path = paths.layout_path.clone();
            let component_dir = paths.component_dir.clone();
            let ext = ext.clone();
            move || collect_pages(&app_dir, &layout_path, &component_dir, &ext)
        })
        .await?
        .map_err(|source| PipelineError::Scan {
            path: paths.app_dir.clone(),
            source,
        })?;

        let component_count = components.len();
        let shared = Arc::new(SharedSources {
            layout: strip_directives(&layout),
            components,
        });

        let gate = Arc::new(Semaphore::new(self.config.render.compile_concurrency.max(1)));
        let mut handles = Vec::with_capacity(sources.len());
        for source in sources {
            let route = route_path_from_file(&source, &paths.app_dir, &ext);
            let permit = Arc::clone(&gate)
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?;
            let shared = Arc::clone(&shared);
            let memo = Arc::clone(&self.memo);
            let task_route = route.clone();
            let task_source = source.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                compile_page(task_route, task_source, shared, memo).await
            });
            handles.push((route, source, handle));
        }

        let mut claimed = HashSet::new();
        let mut pages = Vec::with_capacity(handles.len());
        let mut failures = Vec::new();
        for (route, source, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(join_failure(e)),
            };
            if !claimed.insert(route.clone()) {
                tracing::warn!(
                    route = %route,
                    source = %source.display(),
                    "Route already claimed by another source file, skipping"
                );
                continue;
            }
            match result {
                Ok(page) => pages.push(page),
                Err(e) => {
                    tracing::warn!(
                        route = %route,
                        source = %source.display(),
                        error = %crate::errors::describe(&e),
                        "Page failed to compile"
                    );
                    failures.push(ErrorRecord::from_error(
                        ErrorKind::Compile,
                        route,
                        StatusCode::INTERNAL_SERVER_ERROR,
                        e,
                    ));
                }
            }
        }

        Ok(BuildOutput {
            pages,
            failures,
            layout_metadata,
            component_count,
            bundles,
            error_template,
        })
    }
}

async fn compile_page(
    route: String,
    source: PathBuf,
    shared: Arc<SharedSources>,
    memo: Arc<MetadataMemo>,
) -> Result<CompiledPage, CompileError> {
    let content = tokio::fs::read_to_string(&source)
        .await
        .map_err(|e| CompileError::Read {
            path: source.clone(),
            source: e,
        })?;

    let metadata = memo.extract(&source.display().to_string(), &content).await;
    let stripped = strip_directives(&content);

    let compile_route = route.clone();
    let template = tokio::task::spawn_blocking(move || {
        CompiledTemplate::compile(&compile_route, &shared.layout, &shared.components, &stripped)
    })
    .await
    .map_err(join_failure)??;

    Ok(CompiledPage {
        route,
        source,
        template: Arc::new(template),
        metadata,
    })
}

fn join_failure(e: JoinError) -> CompileError {
    if e.is_panic() {
        CompileError::Panicked(panic_message(&*e.into_panic()))
    } else {
        CompileError::Aborted(e.to_string())
    }
}

async fn blocking<F, T>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Component fragments under `dir`, at any depth, keyed by file stem.
///
/// A missing directory has none. When two files share a stem the one that sorts
/// last wins.
pub fn load_components(dir: &Path, ext: &str) -> io::Result<BTreeMap<String, String>> {
    let mut components = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(components);
    }

    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if is_hidden(&path) {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if has_extension(&path, ext) {
                files.push(path);
            }
        }
    }
    files.sort();

    for path in files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let content = std::fs::read_to_string(&path)?;
        if components.insert(stem.to_string(), strip_directives(&content)).is_some() {
            tracing::warn!(component = %stem, file = %path.display(), "Component name shadows an earlier file");
        }
    }
    Ok(components)
}

/// Page sources under `app_dir`, sorted, excluding the layout and components.
pub fn collect_pages(
    app_dir: &Path,
    layout: &Path,
    component_dir: &Path,
    ext: &str,
) -> io::Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    let mut pending = vec![app_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if is_hidden(&path) {
                continue;
            }
            if path.is_dir() {
                if !path.starts_with(component_dir) {
                    pending.push(path);
                }
            } else if has_extension(&path, ext) && path != layout && !path.starts_with(component_dir) {
                pages.push(path);
            }
        }
    }
    pages.sort();
    Ok(pages)
}

const BUNDLE_CSS: &str = "bundle.css";
const BUNDLE_JS: &str = "bundle.js";

/// Concatenate css and js under `static_dir` into `bundle.css` / `bundle.js`.
///
/// Returns template-facing URLs keyed by `css` / `js` for the bundles written.
pub fn bundle_assets(static_dir: &Path, static_prefix: &str) -> io::Result<BTreeMap<String, String>> {
    let mut urls = BTreeMap::new();
    if !static_dir.is_dir() {
        return Ok(urls);
    }

    let mut files = Vec::new();
    let mut pending = vec![static_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.parent() == Some(static_dir)
                && matches!(
                    path.file_name().and_then(|n| n.to_str()),
                    Some(BUNDLE_CSS) | Some(BUNDLE_JS)
                )
            {
                continue;
            } else {
                files.push(path);
            }
        }
    }
    files.sort();

    let prefix = static_prefix.trim_end_matches('/');
    for (kind, bundle_name) in [("css", BUNDLE_CSS), ("js", BUNDLE_JS)] {
        let mut bundle = String::new();
        for file in files.iter().filter(|f| has_extension(f, kind)) {
            let relative = file.strip_prefix(static_dir).unwrap_or(file);
            bundle.push_str(&format!("/* {} */\n", relative.display()));
            bundle.push_str(&std::fs::read_to_string(file)?);
            bundle.push('\n');
        }
        if !bundle.is_empty() {
            std::fs::write(static_dir.join(bundle_name), bundle)?;
            urls.insert(kind.to_string(), format!("{prefix}/{bundle_name}"));
        }
    }
    Ok(urls)
}
