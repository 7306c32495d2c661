//! Application context.
//!
//! # Data Flow
//! ```text
//! reload() [exclusive reload lock]
//!     → Pipeline::build
//!     → route table (pages + failed routes, route middleware attached)
//!     → Generation::assemble → prerender static routes
//!     → ArcSwap store (one atomic publish)
//!     → error registry: compile store replaced, runtime/API entries re-armed
//!     → broadcast generation id (live reload)
//!
//! dispatch(request)
//!     → load current generation (one pointer load, held for the whole request)
//!     → normalize path → resolve (static → API → exact page → dynamic page)
//!     → global middleware → route middleware → handler
//!     → panic caught once here → recorded error + 500
//! ```
//!
//! # Design Decisions
//! - One `Site` owns every registry; nothing is global
//! - Requests never wait on a reload; they keep the generation they loaded
//! - A failed reload leaves the published generation untouched

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::SiteConfig;
use crate::engine::context::{PageData, RequestInfo};
use crate::engine::generation::Generation;
use crate::engine::memo::MetadataMemo;
use crate::engine::metadata::MetadataDefaults;
use crate::engine::pipeline::{BuildOutput, Pipeline, PipelineError};
use crate::engine::render::RenderEngine;
use crate::errors::registry::api_key;
use crate::errors::{log_summary, panic_message, ErrorKind, ErrorRecord, ErrorRegistry};
use crate::http::request::request_id;
use crate::http::response::{json_error, stamp_generation};
use crate::observability::metrics;
use crate::routing::path::under_prefix;
use crate::routing::{
    handler_fn, normalize_path, ApiContext, ApiHandler, ApiMatch, ApiRegistry, Handler, Middleware,
    MethodFilter, MiddlewareChain, Next, Params, Resolution, Route, RouteKind, RoutePattern, RouteTable,
};

/// Route identity attached to a page request before its handler runs.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: String,
    pub params: Params,
}

/// What one reload produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub generation: u64,
    pub pages: usize,
    pub failed: usize,
    pub static_pages: usize,
    pub components: usize,
    pub elapsed_ms: u64,
}

/// Registers handlers and middleware, then builds the [`Site`].
pub struct SiteBuilder {
    config: SiteConfig,
    api: ApiRegistry,
    global: MiddlewareChain,
    page_middleware: HashMap<String, MiddlewareChain>,
}

impl SiteBuilder {
    pub fn new(config: SiteConfig) -> Self {
        Self {
            config,
            api: ApiRegistry::new(),
            global: MiddlewareChain::new(),
            page_middleware: HashMap::new(),
        }
    }

    /// Append a global middleware; the first registered runs outermost.
    pub fn use_middleware<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.global.use_middleware(f);
        self
    }

    /// Attach a middleware to the page route `path` (e.g. `/posts/[slug]`).
    pub fn route_middleware(mut self, path: &str, middleware: Middleware) -> Self {
        self.page_middleware
            .entry(normalize_path(path))
            .or_default()
            .push(middleware);
        self
    }

    /// Register an API handler. Patterns outside the API prefix are placed under it.
    pub fn api(mut self, pattern: &str, method: impl Into<MethodFilter>, handler: ApiHandler) -> Self {
        let prefix = self.config.server.api_prefix.trim_end_matches('/');
        let pattern = normalize_path(pattern);
        let pattern = if under_prefix(&pattern, prefix) {
            pattern
        } else {
            format!("{prefix}{pattern}")
        };
        self.api.register(&pattern, method, handler);
        self
    }

    /// Build the site. Must be called inside a Tokio runtime; nothing is
    /// compiled until the first [`Site::reload`].
    pub fn build(self) -> Arc<Site> {
        let config = Arc::new(self.config);
        let defaults = Arc::new(MetadataDefaults::from_config(&config));
        let errors = Arc::new(ErrorRegistry::new());

        let memo = MetadataMemo::new(Arc::clone(&defaults), &config.metadata);
        memo.spawn_sweeper(Duration::from_secs(config.metadata.memo_sweep_secs.max(1)));

        let engine = Arc::new(RenderEngine::new(
            Arc::clone(&config),
            defaults,
            Arc::clone(&errors),
        ));
        let page_handler = page_handler(Arc::clone(&engine));
        let static_handler = static_handler(
            config.paths.static_dir.clone(),
            config.server.static_prefix.clone(),
        );
        let (reloads, _) = broadcast::channel(16);

        Arc::new(Site {
            current: ArcSwap::from_pointee(Generation::empty(&config)),
            reload_lock: Mutex::new(()),
            next_generation: AtomicU64::new(1),
            pipeline: Pipeline::new(Arc::clone(&config), memo),
            engine,
            errors,
            api: self.api,
            global: self.global,
            page_middleware: self.page_middleware,
            page_handler,
            static_handler,
            reloads,
            config,
        })
    }
}

/// The running application: configuration, registries and the published generation.
pub struct Site {
    config: Arc<SiteConfig>,
    current: ArcSwap<Generation>,
    reload_lock: Mutex<()>,
    next_generation: AtomicU64,
    pipeline: Pipeline,
    engine: Arc<RenderEngine>,
    errors: Arc<ErrorRegistry>,
    api: ApiRegistry,
    global: MiddlewareChain,
    page_middleware: HashMap<String, MiddlewareChain>,
    page_handler: Handler,
    static_handler: Handler,
    reloads: broadcast::Sender<u64>,
}

enum Target {
    Static,
    Api(ApiMatch),
    Page(RouteMatch),
    NotFound,
}

impl Target {
    fn kind(&self) -> &'static str {
        match self {
            Target::Static => "static",
            Target::Api(_) => "api",
            Target::Page(_) => "page",
            Target::NotFound => "not_found",
        }
    }
}

impl Site {
    pub fn builder(config: SiteConfig) -> SiteBuilder {
        SiteBuilder::new(config)
    }

    pub fn config(&self) -> &Arc<SiteConfig> {
        &self.config
    }

    /// The generation new requests are served from.
    pub fn current(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    pub fn errors(&self) -> &Arc<ErrorRegistry> {
        &self.errors
    }

    pub fn api(&self) -> &ApiRegistry {
        &self.api
    }

    pub fn engine(&self) -> &Arc<RenderEngine> {
        &self.engine
    }

    /// Ids of successfully published generations.
    pub fn subscribe_reloads(&self) -> broadcast::Receiver<u64> {
        self.reloads.subscribe()
    }

    /// Rebuild every route, template and metadata table and publish them as one generation.
    pub async fn reload(&self) -> Result<ReloadReport, PipelineError> {
        let _guard = self.reload_lock.lock().await;
        let start = Instant::now();

        let output = match self.pipeline.build().await {
            Ok(output) => output,
            Err(e) => {
                metrics::record_reload_failure();
                tracing::error!(error = %e, "Reload failed, keeping current generation");
                return Err(e);
            }
        };

        let id = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let components = output.component_count;
        let routes = self.build_routes(&output);
        let generation = Arc::new(Generation::assemble(id, output, routes, &self.config));
        let prerendered = self.engine.prerender_static(&generation).await;

        // Tagged with the new id, so they stay invisible to the old generation.
        for record in prerendered.failures {
            self.errors.register_runtime(record);
        }
        self.engine.set_current(id);
        self.current.store(Arc::clone(&generation));

        self.errors.replace_compile(generation.compile_errors.values());
        self.errors.prune_runtime(id);
        self.errors.prune_api(id);

        let report = ReloadReport {
            generation: id,
            pages: generation.templates.len(),
            failed: generation.compile_errors.len(),
            static_pages: prerendered.pages,
            components,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        metrics::record_reload(start, report.pages, report.failed);
        tracing::info!(
            generation = report.generation,
            pages = report.pages,
            failed = report.failed,
            static_pages = report.static_pages,
            components = report.components,
            elapsed_ms = report.elapsed_ms,
            "Reload complete"
        );
        log_summary(&self.errors.summary());

        let _ = self.reloads.send(id);
        Ok(report)
    }

    fn build_routes(&self, output: &BuildOutput) -> RouteTable {
        let mut table = RouteTable::new(
            self.config.server.static_prefix.clone(),
            self.config.server.api_prefix.clone(),
        );
        table.set_static(Route::new(
            RoutePattern::parse(&self.config.server.static_prefix),
            RouteKind::StaticAsset,
            Arc::clone(&self.static_handler),
            MiddlewareChain::new(),
        ));

        let paths: BTreeSet<&str> = output
            .pages
            .iter()
            .map(|p| p.route.as_str())
            .chain(output.failures.iter().map(|f| f.key.as_str()))
            .collect();

        for path in paths {
            let middleware = self.page_middleware.get(path).cloned().unwrap_or_default();
            let route = Route::new(
                RoutePattern::parse(path),
                RouteKind::Page,
                Arc::clone(&self.page_handler),
                middleware,
            );
            if !table.insert(route) {
                tracing::warn!(route = %path, "Duplicate route skipped");
            }
        }
        table
    }

    /// Serve one request against the current generation.
    pub async fn dispatch(self: &Arc<Self>, request: Request<Body>) -> Response {
        let start = Instant::now();
        let generation = self.current.load_full();

        let path = normalize_path(request.uri().path());
        let request = with_path(request, &path);
        let method = request.method().clone();
        let request_id = request_id(&request).unwrap_or("-").to_string();

        let target = match generation.routes.resolve(&path) {
            Resolution::Static(_) => Target::Static,
            Resolution::Api => Target::Api(self.api.resolve(&method, &path)),
            Resolution::Page { route, params } => Target::Page(RouteMatch {
                route: route.path().to_string(),
                params,
            }),
            Resolution::NotFound => Target::NotFound,
        };
        let kind = target.kind();

        let target = Arc::new(target);
        let terminal = {
            let site = Arc::clone(self);
            let generation = Arc::clone(&generation);
            let target = Arc::clone(&target);
            handler_fn(move |request: Request<Body>| {
                let site = Arc::clone(&site);
                let generation = Arc::clone(&generation);
                let target = Arc::clone(&target);
                async move { site.terminal(&generation, &target, request).await }
            })
        };
        let endpoint = self.global.then(terminal);

        let mut response = match AssertUnwindSafe(endpoint(request)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::error!(request_id = %request_id, path = %path, panic = %message, "Request panicked");
                self.recover(&generation, &target, &method, &path, &message)
            }
        };

        stamp_generation(&mut response, generation.id);
        metrics::record_request(kind, response.status().as_u16(), start);
        response
    }

    async fn terminal(&self, generation: &Arc<Generation>, target: &Target, mut request: Request<Body>) -> Response {
        match target {
            Target::Static => match generation.routes.static_route() {
                Some(route) => route.endpoint()(request).await,
                None => self.engine.not_found(generation, request.uri().path()),
            },
            Target::Api(matched) => self.serve_api(generation, matched, request).await,
            Target::Page(matched) => {
                let Some(route) = generation.routes.page(&matched.route) else {
                    return self.engine.not_found(generation, request.uri().path());
                };
                request.extensions_mut().insert(Arc::clone(generation));
                request.extensions_mut().insert(matched.clone());
                route.endpoint()(request).await
            }
            Target::NotFound => self.engine.not_found(generation, request.uri().path()),
        }
    }

    async fn serve_api(&self, generation: &Generation, matched: &ApiMatch, request: Request<Body>) -> Response {
        let (pattern, handler, params) = match matched {
            ApiMatch::Found {
                pattern,
                handler,
                params,
            } => (pattern, handler, params),
            ApiMatch::MethodNotAllowed { pattern } => {
                return json_error(
                    StatusCode::METHOD_NOT_ALLOWED,
                    format!("method {} not allowed on {}", request.method(), pattern),
                );
            }
            ApiMatch::NotFound => {
                return json_error(
                    StatusCode::NOT_FOUND,
                    format!("no endpoint at {}", request.uri().path()),
                );
            }
        };

        if let Some(record) = self.errors.api_error_at(request.method(), pattern, generation.id) {
            return json_error(record.status_code(), record.message);
        }

        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, self.config.server.max_body_bytes).await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected API request body");
                return json_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
            }
        };

        let ctx = ApiContext::new(
            parts.method,
            parts.uri,
            parts.headers,
            params.clone(),
            body,
            Arc::clone(&self.config),
        );
        match handler(ctx).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    /// Turn a panic caught at the dispatch boundary into a recorded error.
    fn recover(&self, generation: &Generation, target: &Target, method: &Method, path: &str, message: &str) -> Response {
        match target {
            Target::Page(matched) => {
                let record = ErrorRecord::new(
                    ErrorKind::Runtime,
                    matched.route.clone(),
                    format!("The page '{}' could not be rendered", matched.route),
                    message,
                    StatusCode::INTERNAL_SERVER_ERROR,
                );
                let record = self.engine.record_failure(generation, record);
                self.engine.error_page(generation, &record, path)
            }
            Target::Api(ApiMatch::Found { pattern, .. }) => {
                let key = api_key(method, pattern);
                tracing::warn!(endpoint = %key, "Endpoint disabled until next reload");
                let record = ErrorRecord::new(
                    ErrorKind::Api,
                    key.clone(),
                    format!("The endpoint '{}' failed", key),
                    message,
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
                .at_generation(generation.id);
                if generation.id == self.current.load().id {
                    self.errors.register_api(record);
                }
                json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("The endpoint '{}' failed", key))
            }
            Target::Api(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "request failed"),
            Target::Static | Target::NotFound => self.engine.internal_error(generation, path, message),
        }
    }
}

/// Replace the request path, keeping the query string.
fn with_path(mut request: Request<Body>, path: &str) -> Request<Body> {
    if request.uri().path() == path {
        return request;
    }
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    if let Ok(uri) = Uri::builder().path_and_query(path_and_query).build() {
        *request.uri_mut() = uri;
    }
    request
}

fn page_handler(engine: Arc<RenderEngine>) -> Handler {
    handler_fn(move |request: Request<Body>| {
        let engine = Arc::clone(&engine);
        async move {
            let extensions = request.extensions();
            let (Some(generation), Some(matched)) = (
                extensions.get::<Arc<Generation>>(),
                extensions.get::<RouteMatch>(),
            ) else {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            };
            let info = RequestInfo::from_request(&request);
            let data = extensions.get::<PageData>().map(|d| &d.0);
            engine.serve_page(generation, &matched.route, &matched.params, &info, data)
        }
    })
}

fn static_handler(dir: PathBuf, prefix: String) -> Handler {
    let service = ServeDir::new(dir);
    handler_fn(move |request: Request<Body>| {
        let service = service.clone();
        let prefix = prefix.trim_end_matches('/').to_string();
        async move {
            let rest = request
                .uri()
                .path()
                .strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty())
                .unwrap_or("/")
                .to_string();
            let request = with_path(request, &rest);
            match service.oneshot(request).await {
                Ok(response) => response.map(Body::new),
                Err(never) => match never {},
            }
        }
    })
}
