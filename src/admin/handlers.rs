use axum::{extract::State, http::StatusCode, response::Response};
use serde::Serialize;

use crate::errors::ErrorSummary;
use crate::http::response::{json_error, json_success};
use crate::http::server::AppState;
use crate::routing::RouteKind;

#[derive(Serialize)]
pub struct SystemStatus {
    pub app_name: String,
    pub version: String,
    pub status: &'static str,
    pub generation: u64,
    pub built_at: String,
    pub pages: usize,
    pub failed_pages: usize,
    pub static_pages: usize,
    pub cached_pages: usize,
    pub api_endpoints: usize,
}

#[derive(Serialize)]
pub struct RouteEntry {
    pub path: String,
    pub kind: RouteKind,
    pub params: Vec<String>,
    pub methods: Vec<String>,
    pub healthy: bool,
    pub middleware: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Response {
    let site = &state.site;
    let generation = site.current();
    let config = site.config();

    json_success(SystemStatus {
        app_name: config.site.app_name.clone(),
        version: config.site.version.clone(),
        status: if generation.id == 0 { "starting" } else { "operational" },
        generation: generation.id,
        built_at: generation.built_at.to_rfc3339(),
        pages: generation.templates.len(),
        failed_pages: generation.compile_errors.len(),
        static_pages: generation.ssg.len(),
        cached_pages: generation.render_cache.len(),
        api_endpoints: site.api().len(),
    })
}

pub async fn get_routes(State(state): State<AppState>) -> Response {
    let site = &state.site;
    let generation = site.current();

    let mut routes: Vec<RouteEntry> = generation
        .routes
        .pages()
        .into_iter()
        .map(|route| RouteEntry {
            path: route.path().to_string(),
            kind: route.kind(),
            params: route.param_names().into_iter().map(String::from).collect(),
            methods: Vec::new(),
            healthy: generation.is_healthy(route.path())
                && site.errors().runtime_error_at(route.path(), generation.id).is_none(),
            middleware: route.middleware().len(),
        })
        .collect();

    routes.extend(site.api().describe().into_iter().map(|(pattern, methods)| {
        let healthy = methods.iter().all(|m| {
            m.parse::<axum::http::Method>()
                .map(|method| site.errors().api_error_at(&method, &pattern, generation.id).is_none())
                .unwrap_or(true)
        });
        RouteEntry {
            params: crate::routing::RoutePattern::parse(&pattern)
                .param_names()
                .into_iter()
                .map(String::from)
                .collect(),
            path: pattern,
            kind: RouteKind::Api,
            methods,
            healthy,
            middleware: 0,
        }
    }));

    json_success(routes)
}

pub async fn get_errors(State(state): State<AppState>) -> Response {
    let summary: ErrorSummary = state.site.errors().summary();
    json_success(summary)
}

pub async fn post_reload(State(state): State<AppState>) -> Response {
    match state.site.reload().await {
        Ok(report) => json_success(report),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, crate::errors::describe(&e)),
    }
}
