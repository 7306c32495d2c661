//! Request interceptors composed around a terminal handler.
//!
//! # Design Decisions
//! - Pure FIFO nesting: the first registered middleware is outermost
//! - No priorities and no reordering after registration
//! - A middleware short-circuits by returning without calling `next.run`
//!
//! ```rust
//! use pagewing::routing::{handler_fn, MiddlewareChain};
//! use axum::response::IntoResponse;
//!
//! let mut chain = MiddlewareChain::new();
//! chain.use_middleware(|req, next| async move {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("x-powered-by", "pagewing".parse().unwrap());
//!     res
//! });
//! let endpoint = chain.then(handler_fn(|_req| async { "hello".into_response() }));
//! # let _ = endpoint;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

/// A boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Terminal request handler.
pub type Handler = Arc<dyn Fn(Request<Body>) -> BoxFuture<Response> + Send + Sync>;

/// A request interceptor.
pub type Middleware = Arc<dyn Fn(Request<Body>, Next) -> BoxFuture<Response> + Send + Sync>;

/// Box an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req: Request<Body>| -> BoxFuture<Response> { Box::pin(f(req)) })
}

/// Box an async closure into a [`Middleware`].
pub fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req: Request<Body>, next: Next| -> BoxFuture<Response> {
        Box::pin(f(req, next))
    })
}

/// The rest of the chain after the current middleware.
pub struct Next {
    stack: Arc<[Middleware]>,
    index: usize,
    handler: Handler,
}

impl Next {
    /// Invoke the next middleware, or the handler at the end of the chain.
    pub fn run(self, request: Request<Body>) -> BoxFuture<Response> {
        match self.stack.get(self.index).cloned() {
            Some(middleware) => {
                let next = Next {
                    stack: self.stack,
                    index: self.index + 1,
                    handler: self.handler,
                };
                middleware(request, next)
            }
            None => (self.handler)(request),
        }
    }
}

/// Ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stack: Vec<Middleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it runs inside every previously added one.
    pub fn use_middleware<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.stack.push(middleware_fn(f));
        self
    }

    /// Append an already boxed middleware.
    pub fn push(&mut self, middleware: Middleware) -> &mut Self {
        self.stack.push(middleware);
        self
    }

    /// A chain running `self` outside `inner`.
    pub fn wrap(&self, inner: &MiddlewareChain) -> MiddlewareChain {
        let mut stack = self.stack.clone();
        stack.extend(inner.stack.iter().cloned());
        MiddlewareChain { stack }
    }

    /// Compose every middleware around `handler`.
    pub fn then(&self, handler: Handler) -> Handler {
        if self.stack.is_empty() {
            return handler;
        }
        let stack: Arc<[Middleware]> = self.stack.clone().into();
        Arc::new(move |request: Request<Body>| {
            Next {
                stack: Arc::clone(&stack),
                index: 0,
                handler: Arc::clone(&handler),
            }
            .run(request)
        })
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.stack.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use parking_lot::Mutex;

    fn request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Middleware {
        let log = Arc::clone(log);
        middleware_fn(move |req, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{name}:in"));
                let res = next.run(req).await;
                log.lock().push(format!("{name}:out"));
                res
            }
        })
    }

    #[tokio::test]
    async fn test_first_registered_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(recorder(&log, "a")).push(recorder(&log, "b"));

        let handler_log = Arc::clone(&log);
        let endpoint = chain.then(handler_fn(move |_| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().push("handler".to_string());
                StatusCode::OK.into_response()
            }
        }));

        endpoint(request()).await;
        assert_eq!(
            *log.lock(),
            vec!["a:in", "b:in", "handler", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn test_wrap_puts_outer_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut global = MiddlewareChain::new();
        global.push(recorder(&log, "global"));
        let mut route = MiddlewareChain::new();
        route.push(recorder(&log, "route"));

        let endpoint = global
            .wrap(&route)
            .then(handler_fn(|_| async { StatusCode::OK.into_response() }));
        endpoint(request()).await;

        assert_eq!(
            *log.lock(),
            vec!["global:in", "route:in", "route:out", "global:out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(|_req, _next| async { StatusCode::FORBIDDEN.into_response() });
        let endpoint = chain.then(handler_fn(|_| async { StatusCode::OK.into_response() }));

        let res = endpoint(request()).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_empty_chain_returns_handler() {
        let chain = MiddlewareChain::new();
        let endpoint = chain.then(handler_fn(|_| async { StatusCode::ACCEPTED.into_response() }));
        assert_eq!(endpoint(request()).await.status(), StatusCode::ACCEPTED);
    }
}
