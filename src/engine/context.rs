//! Request-scoped template context.
//!
//! Templates see a closed structure rather than an open key-value bag:
//! `metadata`, `config`, `route`, `params`, `request`, `server_time`,
//! `build_time`, `bundles` and an opaque `data` payload.

use std::collections::BTreeMap;

use axum::http::Request;
use serde::Serialize;
use serde_json::Value;

use crate::config::SiteConfig;
use crate::engine::metadata::PageMetadata;
use crate::routing::Params;

/// Read-only view of the configuration exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    pub app_name: String,
    pub version: String,
    pub dev_mode: bool,
    pub default_render_mode: String,
    pub static_prefix: String,
    pub ssg_enabled: bool,
}

impl ConfigSnapshot {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            app_name: config.site.app_name.clone(),
            version: config.site.version.clone(),
            dev_mode: config.dev.dev_mode,
            default_render_mode: config.render.default_render_mode.clone(),
            static_prefix: config.server.static_prefix.clone(),
            ssg_enabled: config.render.ssg_enabled,
        }
    }
}

/// The parts of the request a template may read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestInfo {
    pub path: String,
    pub method: String,
    pub host: String,
}

impl RequestInfo {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let host = request
            .headers()
            .get(axum::http::header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Self {
            path: request.uri().path().to_string(),
            method: request.method().to_string(),
            host,
        }
    }

    /// Request info for pages rendered outside a request (static generation).
    pub fn synthetic(path: &str) -> Self {
        Self {
            path: path.to_string(),
            method: "GET".to_string(),
            host: String::new(),
        }
    }
}

/// Caller-supplied payload, inserted into request extensions by middleware.
#[derive(Debug, Clone, Default)]
pub struct PageData(pub Value);

/// Everything a page template executes against.
#[derive(Debug, Serialize)]
pub struct RenderContext<'a> {
    pub metadata: &'a PageMetadata,
    pub config: &'a ConfigSnapshot,
    pub route: &'a str,
    pub params: &'a Params,
    pub request: &'a RequestInfo,
    pub server_time: String,
    pub build_time: String,
    pub bundles: &'a BTreeMap<String, String>,
    pub data: &'a Value,
}

impl RenderContext<'_> {
    pub fn to_tera(&self) -> tera::Result<tera::Context> {
        tera::Context::from_serialize(self)
    }
}
