//! Page rendering.
//!
//! # Serving Order
//! ```text
//! serve_page(generation, route, params, request, data)
//!     → recorded compile/runtime error?  → themed error page, no execution
//!     → SSG route with a static entry?   → serve verbatim (ssg-hit)
//!     → cached SSR output?               → serve verbatim (render-hit)
//!     → execute composite template
//!           → inject script tags before </head>
//!           → render cache (size-bounded)
//!           → SSG route: static entry + queue for disk persistence
//!     → execution failure → runtime error recorded, error page
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::config::SiteConfig;
use crate::engine::context::{ConfigSnapshot, RenderContext, RequestInfo};
use crate::engine::generation::Generation;
use crate::engine::metadata::{MetadataDefaults, PageMetadata, RenderMode};
use crate::engine::scripts::ScriptInjector;
use crate::engine::ssg::{self, SsgQueue, SsgTask};
use crate::errors::{render_error_page, ErrorKind, ErrorRecord, ErrorRegistry, ErrorView};
use crate::http::response::{html, CacheLayer};
use crate::observability::metrics;
use crate::routing::Params;

const NOT_FOUND_ROUTE: &str = "/404";

static NO_DATA: Value = Value::Null;

/// Per-route execution failure.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template execution failed")]
    Template(#[from] tera::Error),

    #[error("no compiled template for route '{0}'")]
    MissingTemplate(String),
}

/// Outcome of eager static generation during a reload.
#[derive(Debug, Default)]
pub struct Prerendered {
    pub pages: usize,
    pub failures: Vec<ErrorRecord>,
}

pub struct RenderEngine {
    config: Arc<SiteConfig>,
    snapshot: ConfigSnapshot,
    defaults: Arc<MetadataDefaults>,
    errors: Arc<ErrorRegistry>,
    scripts: ScriptInjector,
    persist_queue: Option<SsgQueue>,
    current: AtomicU64,
}

impl RenderEngine {
    /// Must be called inside a Tokio runtime when static pages are persisted.
    pub fn new(config: Arc<SiteConfig>, defaults: Arc<MetadataDefaults>, errors: Arc<ErrorRegistry>) -> Self {
        let persist_queue = (config.render.ssg_enabled && config.render.ssg_cache_enabled).then(|| {
            let (queue, _workers) = SsgQueue::start(
                config.render.ssg_queue_capacity,
                config.render.ssg_workers,
                config.paths.ssg_cache_dir.clone(),
            );
            queue
        });

        Self {
            snapshot: ConfigSnapshot::from_config(&config),
            scripts: ScriptInjector::new(&config),
            config,
            defaults,
            errors,
            persist_queue,
            current: AtomicU64::new(0),
        }
    }

    pub fn defaults(&self) -> &Arc<MetadataDefaults> {
        &self.defaults
    }

    /// Mark `id` as the generation being served.
    pub fn set_current(&self, id: u64) {
        self.current.store(id, Ordering::Release);
        if let Some(queue) = &self.persist_queue {
            queue.set_current(id);
        }
    }

    /// The record that keeps `route` from executing, if any.
    ///
    /// Compile errors come from the snapshot; runtime errors only count when
    /// they were raised against this same generation.
    pub fn rejection(&self, generation: &Generation, route: &str) -> Option<ErrorRecord> {
        generation
            .compile_errors
            .get(route)
            .cloned()
            .or_else(|| self.errors.runtime_error_at(route, generation.id))
    }

    /// Register a runtime failure observed while serving `generation`.
    ///
    /// Failures from a superseded generation are dropped.
    pub fn record_failure(&self, generation: &Generation, record: ErrorRecord) -> ErrorRecord {
        let record = record.at_generation(generation.id);
        if generation.id == self.current.load(Ordering::Acquire) {
            self.errors.register_runtime(record.clone());
        } else {
            tracing::debug!(
                route = %record.key,
                generation = generation.id,
                "Ignoring failure from a superseded generation"
            );
        }
        record
    }

    /// Render a matched page route.
    pub fn serve_page(
        &self,
        generation: &Arc<Generation>,
        route: &str,
        params: &Params,
        request: &RequestInfo,
        data: Option<&Value>,
    ) -> Response {
        if let Some(record) = self.rejection(generation, route) {
            tracing::debug!(route = %route, status = record.status, "Serving recorded error");
            return self.error_page(generation, &record, &request.path);
        }

        let Some(metadata) = generation.merged_metadata(route, &self.defaults) else {
            return self.fail(generation, route, &request.path, RenderError::MissingTemplate(route.to_string()));
        };

        let path = request.path.as_str();
        let is_static = self.config.render.ssg_enabled && metadata.render_mode == RenderMode::Ssg;
        if is_static {
            if let Some(body) = generation.ssg.get(path) {
                metrics::record_cache_hit("ssg");
                return html(StatusCode::OK, body.to_string(), Some(CacheLayer::Static));
            }
        }

        // Static pages live in the static cache only.
        let cacheable = self.config.render.template_cache && data.is_none() && !is_static;
        if cacheable {
            if let Some(body) = generation.render_cache.get(path) {
                metrics::record_cache_hit("render");
                return html(StatusCode::OK, body.to_string(), Some(CacheLayer::Rendered));
            }
        }

        let body = match self.execute(generation, route, &metadata, params, request, data) {
            Ok(body) => body,
            Err(e) => return self.fail(generation, route, path, e),
        };

        if cacheable {
            generation.render_cache.insert(path, &body);
        }
        if is_static {
            let held = generation.ssg.insert_if_absent(path, Arc::from(body.as_str()));
            if let Some(queue) = &self.persist_queue {
                queue.offer(SsgTask {
                    generation: Arc::downgrade(generation),
                    path: path.to_string(),
                    html: Arc::clone(&held),
                });
            }
            return html(StatusCode::OK, held.to_string(), None);
        }

        html(StatusCode::OK, body, None)
    }

    /// Execute the composite template for `route` and inject script tags.
    pub fn execute(
        &self,
        generation: &Generation,
        route: &str,
        metadata: &PageMetadata,
        params: &Params,
        request: &RequestInfo,
        data: Option<&Value>,
    ) -> Result<String, RenderError> {
        let template = generation
            .templates
            .get(route)
            .ok_or_else(|| RenderError::MissingTemplate(route.to_string()))?;

        let context = RenderContext {
            metadata,
            config: &self.snapshot,
            route,
            params,
            request,
            server_time: Utc::now().to_rfc3339(),
            build_time: generation.built_at.to_rfc3339(),
            bundles: &generation.bundles,
            data: data.unwrap_or(&NO_DATA),
        };

        let body = template.render(&context.to_tera()?)?;
        Ok(self.scripts.inject(&body, metadata.script_library))
    }

    fn fail(&self, generation: &Generation, route: &str, path: &str, err: RenderError) -> Response {
        tracing::warn!(
            route = %route,
            path = %path,
            generation = generation.id,
            error = %crate::errors::describe(&err),
            "Page failed to render"
        );
        let record = self.record_failure(
            generation,
            ErrorRecord::from_error(ErrorKind::Runtime, route, StatusCode::INTERNAL_SERVER_ERROR, err),
        );
        self.error_page(generation, &record, path)
    }

    /// Eagerly render every parameter-free static route of a new generation.
    ///
    /// Failures are returned rather than registered; the caller records them
    /// once the generation is published.
    pub async fn prerender_static(&self, generation: &Generation) -> Prerendered {
        let mut outcome = Prerendered::default();
        if !self.config.render.ssg_enabled {
            return outcome;
        }

        for route in generation.routes.pages() {
            if route.pattern().is_dynamic() || !generation.is_healthy(route.path()) {
                continue;
            }
            let Some(metadata) = generation.merged_metadata(route.path(), &self.defaults) else {
                continue;
            };
            if metadata.render_mode != RenderMode::Ssg {
                continue;
            }

            let request = RequestInfo::synthetic(route.path());
            match self.execute(generation, route.path(), &metadata, &Params::new(), &request, None) {
                Ok(body) => {
                    let held = generation.ssg.insert_if_absent(route.path(), Arc::from(body));
                    if self.config.render.ssg_cache_enabled {
                        if let Err(e) = ssg::persist(&self.config.paths.ssg_cache_dir, route.path(), &held).await {
                            tracing::warn!(route = %route.path(), error = %e, "Failed to persist static page");
                        }
                    }
                    outcome.pages += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        route = %route.path(),
                        error = %crate::errors::describe(&e),
                        "Static generation failed"
                    );
                    outcome.failures.push(
                        ErrorRecord::from_error(
                            ErrorKind::Runtime,
                            route.path(),
                            StatusCode::INTERNAL_SERVER_ERROR,
                            e,
                        )
                        .at_generation(generation.id),
                    );
                }
            }
        }
        outcome
    }

    /// Response for a path no route matched.
    ///
    /// A healthy `/404` page is rendered with status 404; otherwise the themed
    /// error page is used.
    pub fn not_found(&self, generation: &Generation, path: &str) -> Response {
        if generation.is_healthy(NOT_FOUND_ROUTE) && self.rejection(generation, NOT_FOUND_ROUTE).is_none() {
            if let Some(metadata) = generation.merged_metadata(NOT_FOUND_ROUTE, &self.defaults) {
                let request = RequestInfo::synthetic(path);
                match self.execute(generation, NOT_FOUND_ROUTE, &metadata, &Params::new(), &request, None) {
                    Ok(body) => return html(StatusCode::NOT_FOUND, body, None),
                    Err(e) => {
                        tracing::warn!(error = %crate::errors::describe(&e), "Not-found page failed to render");
                        self.record_failure(
                            generation,
                            ErrorRecord::from_error(
                                ErrorKind::Runtime,
                                NOT_FOUND_ROUTE,
                                StatusCode::INTERNAL_SERVER_ERROR,
                                e,
                            ),
                        );
                    }
                }
            }
        }
        render_error_page(
            generation.error_template.as_deref(),
            &ErrorView::not_found(path, &self.snapshot.app_name),
        )
    }

    /// Themed error page for a recorded failure.
    pub fn error_page(&self, generation: &Generation, record: &ErrorRecord, path: &str) -> Response {
        render_error_page(
            generation.error_template.as_deref(),
            &ErrorView::from_record(record, path, &self.snapshot.app_name),
        )
    }

    /// Themed 500 page for a failure that has no record.
    pub fn internal_error(&self, generation: &Generation, path: &str, detail: &str) -> Response {
        render_error_page(
            generation.error_template.as_deref(),
            &ErrorView::internal(path, &self.snapshot.app_name, detail),
        )
    }
}
