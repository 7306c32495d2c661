//! API handler registry.
//!
//! # Design Decisions
//! - Patterns are kept in declaration order; the first pattern that matches the
//!   path and has a handler for the method (or the `*` wildcard) wins
//! - A path matched by some pattern with no handler for the method is a 405
//! - Handlers return `Result<Response, ApiError>`; panics are caught by the site

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::SiteConfig;
use crate::http::response::json_error;
use crate::routing::middleware::BoxFuture;
use crate::routing::params::Params;
use crate::routing::pattern::RoutePattern;

/// Error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("invalid JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("missing path parameter '{0}'")]
    MissingParam(String),
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Status { status, .. } => *status,
            ApiError::InvalidBody(_) | ApiError::MissingParam(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status(), self.to_string())
    }
}

/// Everything an API handler sees of its request.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: Params,
    pub query: BTreeMap<String, String>,
    pub body: Bytes,
    pub config: Arc<SiteConfig>,
}

impl ApiContext {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: Params,
        body: Bytes,
        config: Arc<SiteConfig>,
    ) -> Self {
        let query = Query::<BTreeMap<String, String>>::try_from_uri(&uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        Self {
            method,
            uri,
            headers,
            params,
            query,
            body,
            config,
        }
    }

    pub fn param(&self, name: &str) -> Result<&str, ApiError> {
        self.params
            .get(name)
            .ok_or_else(|| ApiError::MissingParam(name.to_string()))
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A registered API handler.
pub type ApiHandler = Arc<dyn Fn(ApiContext) -> BoxFuture<Result<Response, ApiError>> + Send + Sync>;

/// Box an async closure into an [`ApiHandler`].
pub fn api_fn<F, Fut>(f: F) -> ApiHandler
where
    F: Fn(ApiContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, ApiError>> + Send + 'static,
{
    Arc::new(
        move |ctx: ApiContext| -> BoxFuture<Result<Response, ApiError>> { Box::pin(f(ctx)) },
    )
}

/// Methods a handler answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// The `*` wildcard.
    Any,
    Exact(Method),
}

impl MethodFilter {
    fn accepts(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Exact(m) => m == method,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MethodFilter::Any => "*",
            MethodFilter::Exact(m) => m.as_str(),
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        MethodFilter::Exact(method)
    }
}

struct ApiRoute {
    pattern: RoutePattern,
    handlers: Vec<(MethodFilter, ApiHandler)>,
}

/// Outcome of resolving a request against the registry.
#[derive(Clone)]
pub enum ApiMatch {
    Found {
        pattern: String,
        handler: ApiHandler,
        params: Params,
    },
    MethodNotAllowed {
        pattern: String,
    },
    NotFound,
}

/// Ordered list of API patterns.
#[derive(Default)]
pub struct ApiRegistry {
    routes: Vec<ApiRoute>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `pattern`.
    ///
    /// Re-registering the same pattern adds to its existing entry; an exact
    /// method replaces an earlier handler for that method.
    pub fn register(&mut self, pattern: &str, method: impl Into<MethodFilter>, handler: ApiHandler) {
        let pattern = RoutePattern::parse(pattern);
        let method = method.into();

        let index = match self.routes.iter().position(|r| r.pattern == pattern) {
            Some(index) => index,
            None => {
                self.routes.push(ApiRoute {
                    pattern,
                    handlers: Vec::new(),
                });
                self.routes.len() - 1
            }
        };
        let handlers = &mut self.routes[index].handlers;
        handlers.retain(|(m, _)| *m != method);
        handlers.push((method, handler));
    }

    pub fn resolve(&self, method: &Method, path: &str) -> ApiMatch {
        let mut path_matched: Option<&RoutePattern> = None;

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            let exact = route
                .handlers
                .iter()
                .find(|(m, _)| *m == MethodFilter::Exact(method.clone()));
            let chosen = exact.or_else(|| route.handlers.iter().find(|(m, _)| m.accepts(method)));
            match chosen {
                Some((_, handler)) => {
                    return ApiMatch::Found {
                        pattern: route.pattern.as_str().to_string(),
                        handler: Arc::clone(handler),
                        params,
                    };
                }
                None => {
                    path_matched.get_or_insert(&route.pattern);
                }
            }
        }

        match path_matched {
            Some(pattern) => ApiMatch::MethodNotAllowed {
                pattern: pattern.as_str().to_string(),
            },
            None => ApiMatch::NotFound,
        }
    }

    /// `(pattern, methods)` in declaration order.
    pub fn describe(&self) -> Vec<(String, Vec<String>)> {
        self.routes
            .iter()
            .map(|r| {
                (
                    r.pattern.as_str().to_string(),
                    r.handlers.iter().map(|(m, _)| m.as_str().to_string()).collect(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::json_success;

    fn ok(tag: &'static str) -> ApiHandler {
        api_fn(move |_ctx| async move { Ok::<_, ApiError>(json_success(tag)) })
    }

    fn found_pattern(m: ApiMatch) -> Option<String> {
        match m {
            ApiMatch::Found { pattern, .. } => Some(pattern),
            _ => None,
        }
    }

    #[test]
    fn test_exact_method_and_params() {
        let mut registry = ApiRegistry::new();
        registry.register("/api/users/[id]", Method::GET, ok("user"));

        match registry.resolve(&Method::GET, "/api/users/42") {
            ApiMatch::Found { params, pattern, .. } => {
                assert_eq!(params.get("id"), Some("42"));
                assert_eq!(pattern, "/api/users/[id]");
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn test_method_not_allowed() {
        let mut registry = ApiRegistry::new();
        registry.register("/api/users", Method::GET, ok("list"));
        assert!(matches!(
            registry.resolve(&Method::DELETE, "/api/users"),
            ApiMatch::MethodNotAllowed { .. }
        ));
        assert!(matches!(
            registry.resolve(&Method::GET, "/api/other"),
            ApiMatch::NotFound
        ));
    }

    #[test]
    fn test_wildcard_method() {
        let mut registry = ApiRegistry::new();
        registry.register("/api/echo", MethodFilter::Any, ok("echo"));
        assert!(found_pattern(registry.resolve(&Method::PATCH, "/api/echo")).is_some());
    }

    #[test]
    fn test_overlap_resolves_in_declaration_order() {
        let mut registry = ApiRegistry::new();
        registry.register("/api/items/[id]", Method::GET, ok("dynamic"));
        registry.register("/api/items/featured", Method::GET, ok("static"));
        assert_eq!(
            found_pattern(registry.resolve(&Method::GET, "/api/items/featured")).as_deref(),
            Some("/api/items/[id]")
        );
    }

    #[test]
    fn test_later_pattern_serves_other_method() {
        let mut registry = ApiRegistry::new();
        registry.register("/api/items/[id]", Method::GET, ok("get"));
        registry.register("/api/items/featured", Method::POST, ok("post"));
        assert_eq!(
            found_pattern(registry.resolve(&Method::POST, "/api/items/featured")).as_deref(),
            Some("/api/items/featured")
        );
    }

    #[test]
    fn test_context_helpers() {
        let ctx = ApiContext::new(
            Method::POST,
            "/api/users?page=2".parse().unwrap(),
            HeaderMap::new(),
            Params::new(),
            Bytes::from_static(br#"{"name":"ana"}"#),
            Arc::new(SiteConfig::default()),
        );
        assert_eq!(ctx.query("page"), Some("2"));
        let body: serde_json::Value = ctx.json().unwrap();
        assert_eq!(body["name"], "ana");
        assert!(matches!(ctx.param("id"), Err(ApiError::MissingParam(_))));
    }
}
