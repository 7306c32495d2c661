//! Shared utilities for integration tests: a throwaway site tree and a router driver.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use pagewing::app::{Site, SiteBuilder};
use pagewing::config::SiteConfig;
use pagewing::http::HttpServer;

pub const LAYOUT: &str = r#"<!---title:Test Site--->
<html><head><title>{{ metadata.title }}</title></head><body>{% include "nav.html" %}<main>{% include "page.html" %}</main></body></html>"#;

pub const NAV: &str = "<nav>{{ config.app_name }}</nav>";

/// A site tree on disk. Dropping it removes the directory.
pub struct TestSite {
    pub dir: TempDir,
}

impl TestSite {
    /// Layout, one `nav` component and an index page.
    pub fn new() -> Self {
        let site = Self::empty();
        site.write("app/layout.html", LAYOUT);
        site.write("app/components/nav.html", NAV);
        site.write("app/index.html", "<!---title:Home--->\n<h1>Home</h1>");
        site
    }

    /// Just the directory.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::create_dir_all(dir.path().join("static")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path(relative)).unwrap();
    }

    /// Default configuration rooted at this tree, with a quiet app name.
    pub fn config(&self) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.site.app_name = "Test Site".to_string();
        config.rooted_at(self.root())
    }

    pub fn builder(&self) -> SiteBuilder {
        Site::builder(self.config())
    }
}

/// Build, reload once and wrap in the full HTTP router.
pub async fn start(builder: SiteBuilder) -> (Arc<Site>, Router) {
    let site = builder.build();
    site.reload().await.unwrap();
    let router = HttpServer::new(Arc::clone(&site)).router();
    (site, router)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn get(router: &Router, path: &str) -> TestResponse {
    request(router, Method::GET, path, Body::empty()).await
}

pub async fn request(router: &Router, method: Method, path: &str, body: Body) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(body)
        .unwrap();
    send(router, request).await
}
