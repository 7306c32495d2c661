//! Rendering: cache layers, runtime error isolation, metadata and script injection.

use axum::http::StatusCode;

use pagewing::engine::RequestInfo;
use pagewing::routing::Params;
use pagewing::Site;

mod common;
use common::{get, start, TestSite};

#[tokio::test]
async fn test_static_page_is_prerendered() {
    let site = TestSite::new();
    site.write("app/docs.html", "<!---render:ssg--->\n<p>docs</p>");
    let (app, router) = start(site.builder()).await;

    assert!(app.current().ssg.contains("/docs"));
    let res = get(&router, "/docs").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-pagewing-cache"), Some("ssg-hit"));
    assert!(res.body.contains("<p>docs</p>"));
}

#[tokio::test]
async fn test_dynamic_static_page_is_cached_per_path() {
    let site = TestSite::new();
    site.write("app/guides/[name].html", "<!---render:ssg--->\n<p>guide {{ params.name }}</p>");
    let (_app, router) = start(site.builder()).await;

    let first = get(&router, "/guides/intro").await;
    assert_eq!(first.header("x-pagewing-cache"), Some("miss"));
    assert!(first.body.contains("guide intro"));

    let second = get(&router, "/guides/intro").await;
    assert_eq!(second.header("x-pagewing-cache"), Some("ssg-hit"));
    assert_eq!(first.body, second.body);

    let other = get(&router, "/guides/advanced").await;
    assert_eq!(other.header("x-pagewing-cache"), Some("miss"));
    assert!(other.body.contains("guide advanced"));
}

#[tokio::test]
async fn test_server_rendered_page_uses_render_cache() {
    let site = TestSite::new();
    let (_app, router) = start(site.builder()).await;

    let first = get(&router, "/").await;
    assert_eq!(first.header("x-pagewing-cache"), Some("miss"));
    let second = get(&router, "/").await;
    assert_eq!(second.header("x-pagewing-cache"), Some("render-hit"));
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_render_cache_can_be_disabled() {
    let site = TestSite::new();
    let mut config = site.config();
    config.render.template_cache = false;
    let (_app, router) = start(Site::builder(config)).await;

    get(&router, "/").await;
    let again = get(&router, "/").await;
    assert_eq!(again.header("x-pagewing-cache"), Some("miss"));
}

#[tokio::test]
async fn test_reload_invalidates_caches() {
    let site = TestSite::new();
    site.write("app/docs.html", "<!---render:ssg--->\n<p>v1</p>");
    site.write("app/live.html", "<p>live v1</p>");
    let (app, router) = start(site.builder()).await;
    get(&router, "/live").await;
    assert_eq!(get(&router, "/live").await.header("x-pagewing-cache"), Some("render-hit"));

    site.write("app/docs.html", "<!---render:ssg--->\n<p>v2</p>");
    site.write("app/live.html", "<p>live v2</p>");
    app.reload().await.unwrap();

    assert!(get(&router, "/docs").await.body.contains("<p>v2</p>"));
    let live = get(&router, "/live").await;
    assert_eq!(live.header("x-pagewing-cache"), Some("miss"));
    assert!(live.body.contains("live v2"));
}

#[tokio::test]
async fn test_runtime_error_is_recorded_and_short_circuits() {
    let site = TestSite::new();
    site.write("app/bad.html", "<p>{{ missing.field }}</p>");
    let (app, router) = start(site.builder()).await;
    assert!(!app.errors().has_runtime_error("/bad"));

    let first = get(&router, "/bad").await;
    assert_eq!(first.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.errors().has_runtime_error("/bad"));

    let second = get(&router, "/bad").await;
    assert_eq!(second.status, StatusCode::INTERNAL_SERVER_ERROR);

    let home = get(&router, "/").await;
    assert_eq!(home.status, StatusCode::OK);

    site.write("app/bad.html", "<p>good now</p>");
    app.reload().await.unwrap();
    assert!(!app.errors().has_runtime_error("/bad"));
    let fixed = get(&router, "/bad").await;
    assert_eq!(fixed.status, StatusCode::OK);
    assert!(fixed.body.contains("good now"));
}

#[tokio::test]
async fn test_late_failure_on_old_generation_does_not_block_recompiled_route() {
    let site = TestSite::new();
    site.write("app/flaky.html", "<p>{{ missing.value }}</p>");
    let (app, router) = start(site.builder()).await;
    let old = app.current();

    site.write("app/flaky.html", "<p>steady</p>");
    app.reload().await.unwrap();

    // A request that loaded the old snapshot finishes after the reload.
    let stale = app.engine().serve_page(
        &old,
        "/flaky",
        &Params::new(),
        &RequestInfo::synthetic("/flaky"),
        None,
    );
    assert_eq!(stale.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!app.errors().has_runtime_error("/flaky"));

    let res = get(&router, "/flaky").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-pagewing-generation"), Some("2"));
    assert!(res.body.contains("steady"));
}

#[tokio::test]
async fn test_runtime_errors_of_previous_generation_are_not_served() {
    let site = TestSite::new();
    site.write("app/flaky.html", "<p>{{ missing.value }}</p>");
    let (app, router) = start(site.builder()).await;
    assert_eq!(get(&router, "/flaky").await.status, StatusCode::INTERNAL_SERVER_ERROR);
    let recorded = app.errors().runtime_error("/flaky").unwrap();
    assert_eq!(recorded.generation, 1);

    // Re-registering the old record, as a straggler would, leaves generation 2 healthy.
    site.write("app/flaky.html", "<p>steady</p>");
    app.reload().await.unwrap();
    app.errors().register_runtime(recorded);

    let res = get(&router, "/flaky").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("steady"));
}

#[tokio::test]
async fn test_directives_do_not_leak_into_output() {
    let site = TestSite::new();
    site.write(
        "app/post.html",
        "<!---title:Current Title--->\n<!--description:Legacy description-->\n<!---meta:author:Ada--->\n<p>body</p>",
    );
    let (_app, router) = start(site.builder()).await;

    let res = get(&router, "/post").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.contains("<title>Current Title</title>"));
    assert!(!res.body.contains("<!---"));
    assert!(!res.body.contains("title:"));
    assert!(!res.body.contains("Legacy description"));
    assert!(!res.body.contains("author:"));
}

#[tokio::test]
async fn test_metadata_tiers_merge() {
    let site = TestSite::empty();
    site.write(
        "app/layout.html",
        "<!---title:Layout Title--->\n<!---meta:og:type:article--->\n<html><head><title>{{ metadata.title }}</title>{% for name, content in metadata.meta_tags %}<meta name=\"{{ name }}\" content=\"{{ content }}\">{% endfor %}</head><body>{% include \"page.html\" %}</body></html>",
    );
    site.write("app/index.html", "<p>home</p>");
    site.write("app/about.html", "<!---title:About--->\n<!---description:Who we are--->\n<p>about</p>");
    let (_app, router) = start(site.builder()).await;

    let home = get(&router, "/").await;
    assert!(home.body.contains("<title>Layout Title</title>"));
    assert!(home.body.contains(r#"<meta name="og:type" content="article">"#));
    assert!(home.body.contains(r#"<meta name="og:title" content="Layout Title">"#));
    assert!(home.body.contains(r#"<meta name="twitter:card" content="summary">"#));

    let about = get(&router, "/about").await;
    assert!(about.body.contains("<title>About</title>"));
    assert!(about.body.contains(r#"<meta name="og:title" content="About">"#));
    assert!(about.body.contains(r#"<meta name="description" content="Who we are">"#));
    assert!(about.body.contains(r#"<meta name="og:description" content="Who we are">"#));
    assert!(about.body.contains(r#"<meta name="og:type" content="article">"#));
}

#[tokio::test]
async fn test_script_library_injection() {
    let site = TestSite::new();
    site.write("app/plain.html", "<!---js:vanilla--->\n<p>plain</p>");
    site.write("app/jq.html", "<!---js:JQuery--->\n<p>jq</p>");
    site.write("app/typo.html", "<!---js:react--->\n<p>typo</p>");
    let (_app, router) = start(site.builder()).await;

    let home = get(&router, "/").await;
    assert_eq!(home.body.matches("<script defer src=").count(), 1);
    assert!(home.body.contains("</script></head>"));

    let plain = get(&router, "/plain").await;
    assert!(!plain.body.contains("<script"));

    let jq = get(&router, "/jq").await;
    assert!(jq.body.contains("<script src="));
    assert!(jq.body.contains("jquery"));

    let typo = get(&router, "/typo").await;
    assert!(typo.body.contains("<script defer src="));
}

#[tokio::test]
async fn test_dev_mode_injects_live_reload_client() {
    let site = TestSite::new();
    let mut config = site.config();
    config.dev.dev_mode = true;
    let (_app, router) = start(Site::builder(config)).await;

    let res = get(&router, "/").await;
    assert!(res.body.contains("new WebSocket"));
    assert!(res.body.contains("__pagewing"));
}

#[tokio::test]
async fn test_static_pages_are_persisted() {
    let site = TestSite::new();
    site.write("app/docs/intro.html", "<!---render:ssg--->\n<p>intro</p>");
    let mut config = site.config();
    config.render.ssg_cache_enabled = true;
    let cache_dir = config.paths.ssg_cache_dir.clone();
    let (_app, _router) = start(Site::builder(config)).await;

    let persisted = std::fs::read_to_string(cache_dir.join("docs/intro.html")).unwrap();
    assert!(persisted.contains("<p>intro</p>"));
}

#[tokio::test]
async fn test_ssg_disabled_renders_on_demand() {
    let site = TestSite::new();
    site.write("app/docs.html", "<!---render:ssg--->\n<p>docs</p>");
    let mut config = site.config();
    config.render.ssg_enabled = false;
    let (app, router) = start(Site::builder(config)).await;

    assert!(app.current().ssg.is_empty());
    let res = get(&router, "/docs").await;
    assert_eq!(res.header("x-pagewing-cache"), Some("miss"));
}
