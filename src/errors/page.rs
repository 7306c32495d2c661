//! Themed error pages.
//!
//! Rendered from the configured error template when there is one, otherwise
//! from the built-in template. If either cannot be parsed or executed, a
//! minimal inline page with the same status is returned instead.

use axum::http::StatusCode;
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;
use tera::{Context, Tera};

use crate::errors::registry::ErrorRecord;
use crate::http::response::html;

/// Built-in error page.
pub const BUILTIN_ERROR_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{ status }} · {{ title }}</title>
  <style>
    body { font-family: system-ui, sans-serif; background: #f6f7f9; color: #1f2328; margin: 0; }
    main { max-width: 720px; margin: 10vh auto; background: #fff; border-radius: 8px; padding: 2rem 2.5rem; box-shadow: 0 1px 3px rgba(0,0,0,.12); }
    h1 { margin-top: 0; font-size: 1.5rem; }
    .status { color: #cf222e; font-weight: 600; }
    dl { display: grid; grid-template-columns: max-content 1fr; gap: .25rem 1rem; }
    pre { background: #f6f8fa; padding: 1rem; overflow-x: auto; white-space: pre-wrap; }
  </style>
</head>
<body>
  <main>
    <p class="status">{{ status }}</p>
    <h1>{{ title }}</h1>
    <p>{{ message }}</p>
    <dl>
      <dt>Path</dt><dd><code>{{ path }}</code></dd>
      <dt>Time</dt><dd>{{ timestamp }}</dd>
    </dl>
    {% if detail %}<pre>{{ detail }}</pre>{% endif %}
    <footer><small>{{ app_name }}</small></footer>
  </main>
</body>
</html>
"#;

/// What an error page shows.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
    pub status: u16,
    pub title: String,
    pub message: String,
    pub path: String,
    pub timestamp: String,
    pub detail: String,
    pub app_name: String,
}

impl ErrorView {
    pub fn from_record(record: &ErrorRecord, path: &str, app_name: &str) -> Self {
        Self {
            status: record.status,
            title: record.title().to_string(),
            message: record.message.clone(),
            path: path.to_string(),
            timestamp: record.timestamp.to_rfc3339(),
            detail: record.detail.clone(),
            app_name: app_name.to_string(),
        }
    }

    pub fn not_found(path: &str, app_name: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND.as_u16(),
            title: "Page Not Found".to_string(),
            message: format!("No page is served at '{}'", path),
            path: path.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            detail: String::new(),
            app_name: app_name.to_string(),
        }
    }

    pub fn internal(path: &str, app_name: &str, detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            title: "Internal Server Error".to_string(),
            message: "The request could not be completed".to_string(),
            path: path.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            detail: detail.into(),
            app_name: app_name.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

fn render_themed(source: &str, view: &ErrorView) -> tera::Result<String> {
    let context = Context::from_serialize(view)?;
    Tera::one_off(source, &context, true)
}

/// Inline page used when the error template itself fails.
pub fn fallback_html(view: &ErrorView) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{status} {title}</title></head>\
         <body><h1>{status} {title}</h1><p>{message}</p><p>Path: {path}</p><p>Time: {timestamp}</p>\
         <pre>{detail}</pre></body></html>",
        status = view.status,
        title = tera::escape_html(&view.title),
        message = tera::escape_html(&view.message),
        path = tera::escape_html(&view.path),
        timestamp = tera::escape_html(&view.timestamp),
        detail = tera::escape_html(&view.detail),
    )
}

/// Render the error page body for `view`.
pub fn render_error_body(template: Option<&str>, view: &ErrorView) -> String {
    let source = template.unwrap_or(BUILTIN_ERROR_TEMPLATE);
    match render_themed(source, view) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(
                path = %view.path,
                error = %crate::errors::describe(&e),
                "Error template failed, using inline page"
            );
            fallback_html(view)
        }
    }
}

/// Error page response carrying the view's status.
pub fn render_error_page(template: Option<&str>, view: &ErrorView) -> Response {
    html(view.status_code(), render_error_body(template, view), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::registry::ErrorKind;

    fn view() -> ErrorView {
        let record = ErrorRecord::new(
            ErrorKind::Compile,
            "/broken",
            "The page '/broken' could not be compiled",
            "unexpected token <script>",
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        ErrorView::from_record(&record, "/broken", "Pagewing")
    }

    #[test]
    fn test_builtin_template_renders_and_escapes() {
        let body = render_error_body(None, &view());
        assert!(body.contains("Page Compilation Error"));
        assert!(body.contains("&#x2F;broken"));
        assert!(body.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_custom_template() {
        let body = render_error_body(Some("<h1>{{ status }} {{ title }}</h1>"), &view());
        assert_eq!(body, "<h1>500 Page Compilation Error</h1>");
    }

    #[test]
    fn test_broken_template_falls_back() {
        let body = render_error_body(Some("{% if %}"), &view());
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("500 Page Compilation Error"));
    }

    #[test]
    fn test_response_keeps_status() {
        let res = render_error_page(None, &ErrorView::not_found("/missing", "Pagewing"));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
