//! Response construction.
//!
//! # Responsibilities
//! - HTML responses for page routes, marked with the cache layer that served them
//! - JSON envelopes for API routes: `{ success, data?, error?, meta? }`
//! - Generation stamping so every response can be attributed to one reload

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// Which cache answered a page request.
pub const X_CACHE: &str = "x-pagewing-cache";

/// Generation whose snapshot produced the response.
pub const X_GENERATION: &str = "x-pagewing-generation";

/// Cache layer that produced a page body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayer {
    Static,
    Rendered,
}

impl CacheLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLayer::Static => "ssg-hit",
            CacheLayer::Rendered => "render-hit",
        }
    }
}

/// An HTML response, optionally marked as a cache hit.
pub fn html(status: StatusCode, body: impl Into<String>, cache: Option<CacheLayer>) -> Response {
    let mut response = (status, body.into()).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    let mark = match cache {
        Some(layer) => layer.as_str(),
        None => "miss",
    };
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(mark));
    response
}

/// Stamp the generation header.
pub fn stamp_generation(response: &mut Response, generation: u64) {
    response
        .headers_mut()
        .insert(X_GENERATION, HeaderValue::from(generation));
}

/// JSON envelope returned by API routes.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// `200` success envelope around `data`.
pub fn json_success<T: Serialize>(data: T) -> Response {
    match serde_json::to_value(data) {
        Ok(value) => Envelope::success(value).into_response_with(StatusCode::OK),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("response serialization failed: {e}"),
        ),
    }
}

/// Error envelope with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    Envelope::error(message).into_response_with(status)
}
