//! API dispatch: method matching, envelopes, panic isolation.

use axum::body::Body;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use pagewing::http::json_success;
use pagewing::routing::{api_fn, ApiContext, ApiError, MethodFilter};

mod common;
use common::{get, request, start, TestSite};

async fn show_item(ctx: ApiContext) -> Result<Response, ApiError> {
    let id = ctx.param("id")?;
    if id == "0" {
        return Err(ApiError::not_found("no item 0"));
    }
    if ctx.query("explode").is_some() {
        panic!("item handler exploded");
    }
    Ok(json_success(json!({ "id": id, "method": ctx.method.as_str() })))
}

#[derive(Deserialize)]
struct NewItem {
    name: String,
}

async fn create_item(ctx: ApiContext) -> Result<Response, ApiError> {
    let item: NewItem = ctx.json()?;
    Ok(json_success(json!({ "created": item.name })))
}

async fn anything(ctx: ApiContext) -> Result<Response, ApiError> {
    Ok(json_success(json!({ "method": ctx.method.as_str() })))
}

fn site() -> TestSite {
    TestSite::new()
}

async fn app(site: &TestSite) -> (std::sync::Arc<pagewing::Site>, axum::Router) {
    start(
        site.builder()
            .api("/items/[id]", Method::GET, api_fn(show_item))
            .api("/api/items", Method::POST, api_fn(create_item))
            .api("/any", MethodFilter::Any, api_fn(anything)),
    )
    .await
}

#[tokio::test]
async fn test_api_success_envelope_with_params() {
    let site = site();
    let (_app, router) = app(&site).await;

    let res = get(&router, "/api/items/42").await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], "42");
    assert_eq!(body["data"]["method"], "GET");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_handler_error_becomes_error_envelope() {
    let site = site();
    let (_app, router) = app(&site).await;

    let res = get(&router, "/api/items/0").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let body = res.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "no item 0");
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let site = site();
    let (_app, router) = app(&site).await;

    let res = request(&router, Method::DELETE, "/api/items/42", Body::empty()).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.json()["success"], false);
}

#[tokio::test]
async fn test_unknown_endpoint_is_404_envelope() {
    let site = site();
    let (_app, router) = app(&site).await;

    let res = get(&router, "/api/nothing/here").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["success"], false);
}

#[tokio::test]
async fn test_wildcard_method() {
    let site = site();
    let (_app, router) = app(&site).await;

    for method in [Method::GET, Method::PUT, Method::PATCH] {
        let res = request(&router, method.clone(), "/api/any", Body::empty()).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json()["data"]["method"], method.as_str());
    }
}

#[tokio::test]
async fn test_json_body() {
    let site = site();
    let (_app, router) = app(&site).await;

    let res = request(&router, Method::POST, "/api/items", Body::from(r#"{"name":"lamp"}"#)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["data"]["created"], "lamp");

    let bad = request(&router, Method::POST, "/api/items", Body::from("not json")).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.json()["success"], false);
}

#[tokio::test]
async fn test_panic_is_recorded_and_short_circuits_until_reload() {
    let site = site();
    let (app, router) = app(&site).await;

    let boom = get(&router, "/api/items/7?explode=1").await;
    assert_eq!(boom.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(boom.json()["success"], false);
    assert!(app.errors().has_api_error(&Method::GET, "/api/items/[id]"));

    // The recorded error answers without running the handler.
    let after = get(&router, "/api/items/7").await;
    assert_eq!(after.status, StatusCode::INTERNAL_SERVER_ERROR);

    // Other endpoints and methods are unaffected.
    let other = request(&router, Method::POST, "/api/items", Body::from(r#"{"name":"x"}"#)).await;
    assert_eq!(other.status, StatusCode::OK);
    assert_eq!(get(&router, "/").await.status, StatusCode::OK);

    app.reload().await.unwrap();
    assert!(!app.errors().has_api_error(&Method::GET, "/api/items/[id]"));
    assert_eq!(get(&router, "/api/items/7").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let site = site();
    let mut config = site.config();
    config.server.max_body_bytes = 16;
    let (_app, router) = start(
        pagewing::Site::builder(config).api("/items", Method::POST, api_fn(create_item)),
    )
    .await;

    let big = format!(r#"{{"name":"{}"}}"#, "x".repeat(64));
    let res = request(&router, Method::POST, "/api/items", Body::from(big)).await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
}
