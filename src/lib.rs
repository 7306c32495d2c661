//! Pagewing: a file-tree driven page and template server.

// Core subsystems
pub mod app;
pub mod config;
pub mod engine;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod admin;
pub mod errors;
pub mod lifecycle;
pub mod observability;

pub use app::{Site, SiteBuilder};
pub use config::SiteConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
