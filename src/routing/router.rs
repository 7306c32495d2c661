//! Route table and request resolution.
//!
//! # Responsibilities
//! - Store the routes of one generation
//! - Resolve a normalized path to static assets, the API space, or a page
//! - Return an explicit no-match rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction; rebuilt from scratch on every reload
//! - O(1) exact lookup via HashMap, then dynamic patterns in table order
//! - First dynamic match wins

use std::collections::HashMap;

use serde::Serialize;

use crate::routing::middleware::{Handler, MiddlewareChain};
use crate::routing::params::Params;
use crate::routing::path::under_prefix;
use crate::routing::pattern::RoutePattern;

/// What a route serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    StaticAsset,
    Page,
    Api,
}

/// A pattern bound to a middleware-wrapped handler.
#[derive(Clone)]
pub struct Route {
    pattern: RoutePattern,
    kind: RouteKind,
    middleware: MiddlewareChain,
    endpoint: Handler,
}

impl Route {
    pub fn new(pattern: RoutePattern, kind: RouteKind, handler: Handler, middleware: MiddlewareChain) -> Self {
        let endpoint = middleware.then(handler);
        Self {
            pattern,
            kind,
            middleware,
            endpoint,
        }
    }

    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.pattern.param_names()
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// The handler wrapped by its middleware.
    pub fn endpoint(&self) -> Handler {
        self.endpoint.clone()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.pattern.as_str())
            .field("kind", &self.kind)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Result of resolving a path.
#[derive(Debug)]
pub enum Resolution<'a> {
    Static(&'a Route),
    /// Under the API prefix; answered by the API registry.
    Api,
    Page { route: &'a Route, params: Params },
    NotFound,
}

/// Routes of one generation.
#[derive(Debug)]
pub struct RouteTable {
    static_prefix: String,
    api_prefix: String,
    static_route: Option<Route>,
    exact: HashMap<String, Route>,
    dynamic: Vec<Route>,
}

impl RouteTable {
    pub fn new(static_prefix: impl Into<String>, api_prefix: impl Into<String>) -> Self {
        Self {
            static_prefix: static_prefix.into(),
            api_prefix: api_prefix.into(),
            static_route: None,
            exact: HashMap::new(),
            dynamic: Vec::new(),
        }
    }

    pub fn set_static(&mut self, route: Route) {
        self.static_route = Some(route);
    }

    /// Add a page route. Returns `false` if its path is already taken.
    pub fn insert(&mut self, route: Route) -> bool {
        let path = route.path().to_string();
        if route.pattern().is_dynamic() {
            if self.dynamic.iter().any(|r| r.path() == path) {
                return false;
            }
            self.dynamic.push(route);
        } else {
            if self.exact.contains_key(&path) {
                return false;
            }
            self.exact.insert(path, route);
        }
        true
    }

    /// Resolve a normalized path.
    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        if let Some(route) = &self.static_route {
            if under_prefix(path, &self.static_prefix) {
                return Resolution::Static(route);
            }
        }
        if under_prefix(path, &self.api_prefix) {
            return Resolution::Api;
        }
        match self.match_page(path) {
            Some((route, params)) => Resolution::Page { route, params },
            None => Resolution::NotFound,
        }
    }

    /// Exact page routes first, then dynamic routes in table order.
    pub fn match_page(&self, path: &str) -> Option<(&Route, Params)> {
        if let Some(route) = self.exact.get(path) {
            return Some((route, Params::new()));
        }
        self.dynamic
            .iter()
            .find_map(|route| route.pattern().matches(path).map(|params| (route, params)))
    }

    pub fn page(&self, path: &str) -> Option<&Route> {
        self.exact
            .get(path)
            .or_else(|| self.dynamic.iter().find(|r| r.path() == path))
    }

    /// Page routes sorted by path.
    pub fn pages(&self) -> Vec<&Route> {
        let mut pages: Vec<&Route> = self.exact.values().chain(self.dynamic.iter()).collect();
        pages.sort_by(|a, b| a.path().cmp(b.path()));
        pages
    }

    pub fn static_route(&self) -> Option<&Route> {
        self.static_route.as_ref()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::middleware::handler_fn;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn page(path: &str) -> Route {
        Route::new(
            RoutePattern::parse(path),
            RouteKind::Page,
            handler_fn(|_| async { StatusCode::OK.into_response() }),
            MiddlewareChain::new(),
        )
    }

    fn table() -> RouteTable {
        let mut table = RouteTable::new("/static", "/api");
        table.set_static(Route::new(
            RoutePattern::parse("/static"),
            RouteKind::StaticAsset,
            handler_fn(|_| async { StatusCode::OK.into_response() }),
            MiddlewareChain::new(),
        ));
        assert!(table.insert(page("/")));
        assert!(table.insert(page("/posts/new")));
        assert!(table.insert(page("/posts/[slug]")));
        assert!(table.insert(page("/posts/[slug]/[id]")));
        table
    }

    #[test]
    fn test_dispatch_priority() {
        let table = table();
        assert!(matches!(table.resolve("/static/app.css"), Resolution::Static(_)));
        assert!(matches!(table.resolve("/api/users"), Resolution::Api));
        assert!(matches!(table.resolve("/nope"), Resolution::NotFound));
    }

    #[test]
    fn test_exact_beats_dynamic() {
        let table = table();
        match table.resolve("/posts/new") {
            Resolution::Page { route, params } => {
                assert_eq!(route.path(), "/posts/new");
                assert!(params.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dynamic_captures() {
        let table = table();
        match table.resolve("/posts/a/1") {
            Resolution::Page { route, params } => {
                assert_eq!(route.path(), "/posts/[slug]/[id]");
                assert_eq!(params.get("slug"), Some("a"));
                assert_eq!(params.get("id"), Some("1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut table = table();
        assert!(!table.insert(page("/posts/[slug]")));
        assert!(!table.insert(page("/")));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_pages_sorted() {
        let table = table();
        let paths: Vec<_> = table.pages().iter().map(|r| r.path()).collect();
        assert_eq!(paths, vec!["/", "/posts/[slug]", "/posts/[slug]/[id]", "/posts/new"]);
    }
}
