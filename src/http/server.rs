//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router: operator endpoints, live reload, everything else to the site
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::app::Site;
use crate::engine::scripts::LIVE_RELOAD_PATH;
use crate::http::livereload;
use crate::http::request::UuidRequestId;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub site: Arc<Site>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the site.
pub struct HttpServer {
    router: Router,
    site: Arc<Site>,
}

impl HttpServer {
    pub fn new(site: Arc<Site>) -> Self {
        let router = Self::build_router(Arc::clone(&site));
        Self { router, site }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(site: Arc<Site>) -> Router {
        let config = Arc::clone(site.config());
        let state = AppState { site };

        let mut router = Router::new();
        if config.dev.dev_mode && config.dev.live_reload {
            router = router.route(LIVE_RELOAD_PATH, get(livereload::handler));
        }
        if config.admin.enabled {
            router = router.nest(&config.admin.path_prefix, setup_admin_router(state.clone()));
        }

        router
            .fallback(site_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The fully layered router, for driving without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            app = %self.site.config().site.app_name,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn site_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.site.dispatch(request).await
}
