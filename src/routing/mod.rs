//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → path.rs (normalize)
//!     → router.rs (static prefix → API prefix → exact page → dynamic page)
//!     → api.rs (ordered API patterns, method or `*`)
//!     → middleware.rs (global chain wraps route chain wraps handler)
//!     → Return: matched route or NotFound
//!
//! Route Compilation (every reload):
//!     compiled pages
//!     → pattern.rs (bracket placeholders)
//!     → Freeze as immutable RouteTable inside the new generation
//! ```
//!
//! # Design Decisions
//! - Tables rebuilt wholesale, never mutated in place
//! - No regex in the request path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins

pub mod api;
pub mod middleware;
pub mod params;
pub mod path;
pub mod pattern;
pub mod router;

pub use api::{api_fn, ApiContext, ApiError, ApiHandler, ApiMatch, ApiRegistry, MethodFilter};
pub use middleware::{handler_fn, middleware_fn, BoxFuture, Handler, Middleware, MiddlewareChain, Next};
pub use params::Params;
pub use path::{normalize_path, route_path_from_file};
pub use pattern::RoutePattern;
pub use router::{Resolution, Route, RouteKind, RouteTable};
