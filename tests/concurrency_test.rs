//! Requests racing reloads: every response comes from exactly one generation.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;

mod common;
use common::{get, start, TestSite};

fn write_version(site: &TestSite, version: u64) {
    site.write("app/index.html", &format!("<p>home v{version}</p>"));
    site.write("app/about.html", &format!("<p>about v{version}</p>"));
    site.write("app/items/[id].html", &format!("<p>item {{{{ params.id }}}} v{version}</p>"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_responses_match_their_generation_during_reloads() {
    let site = TestSite::new();
    write_version(&site, 1);
    let (app, router) = start(site.builder()).await;

    let mut readers = Vec::new();
    for reader in 0..8 {
        let router = router.clone();
        readers.push(tokio::spawn(async move {
            let paths = ["/", "/about", "/items/3"];
            for i in 0..60 {
                let path = paths[(reader + i) % paths.len()];
                let res = get(&router, path).await;
                assert_eq!(res.status, StatusCode::OK, "{path}");
                let generation = res.header("x-pagewing-generation").unwrap().to_string();
                assert!(
                    res.body.contains(&format!(" v{generation}<")),
                    "{path} at generation {generation}: {}",
                    res.body
                );
            }
        }));
    }

    for version in 2..=6 {
        write_version(&site, version);
        let report = app.reload().await.unwrap();
        assert_eq!(report.generation, version);
        tokio::task::yield_now().await;
    }

    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(app.current().id, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reloads_are_serialized() {
    let site = TestSite::new();
    let app = site.builder().build();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let app = Arc::clone(&app);
        handles.push(tokio::spawn(async move { app.reload().await.unwrap().generation }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids, (1..=5).collect::<HashSet<u64>>());
    assert_eq!(app.current().id, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_renders_of_static_page_agree() {
    let site = TestSite::new();
    site.write(
        "app/guides/[name].html",
        "<!---render:ssg--->\n<p>{{ params.name }} rendered {{ server_time }}</p>",
    );
    let (_app, router) = start(site.builder()).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let router = router.clone();
        handles.push(tokio::spawn(async move { get(&router, "/guides/intro").await.body }));
    }

    let mut bodies = HashSet::new();
    for handle in handles {
        bodies.insert(handle.await.unwrap());
    }
    let settled = get(&router, "/guides/intro").await;
    assert_eq!(settled.header("x-pagewing-cache"), Some("ssg-hit"));

    assert_eq!(bodies.len(), 1);
    assert!(bodies.contains(&settled.body));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_errors_on_one_route_do_not_affect_concurrent_requests() {
    let site = TestSite::new();
    site.write("app/bad.html", "{{ missing.value }}");
    site.write("app/good.html", "<p>good</p>");
    let (_app, router) = start(site.builder()).await;

    let mut handles = Vec::new();
    for i in 0..32 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            let path = if i % 2 == 0 { "/bad" } else { "/good" };
            (path, get(&router, path).await.status)
        }));
    }
    for handle in handles {
        let (path, status) = handle.await.unwrap();
        match path {
            "/bad" => assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR),
            _ => assert_eq!(status, StatusCode::OK),
        }
    }
}
