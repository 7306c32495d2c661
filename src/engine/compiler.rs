//! Composite template compilation.
//!
//! A composite unit is one `tera::Tera` instance holding the shared layout, every
//! component fragment and one page's stripped content. The layout places the page
//! with `{% include "page.html" %}`; pages and the layout reach components by
//! file name (`{% include "nav.html" %}`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use tera::Tera;
use thiserror::Error;

/// Template name of the shared layout.
pub const LAYOUT_TEMPLATE: &str = "layout.html";

/// Template name of the page inside a composite unit.
pub const PAGE_TEMPLATE: &str = "page.html";

/// Per-route compilation failure.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error")]
    Template(#[from] tera::Error),

    #[error("compilation panicked: {0}")]
    Panicked(String),

    #[error("compilation task aborted: {0}")]
    Aborted(String),
}

/// Layout, components and one page, compiled together.
pub struct CompiledTemplate {
    route: String,
    tera: Tera,
}

impl CompiledTemplate {
    pub fn compile(
        route: &str,
        layout: &str,
        components: &BTreeMap<String, String>,
        page: &str,
    ) -> Result<Self, CompileError> {
        let mut sources: Vec<(String, &str)> = Vec::with_capacity(components.len() + 2);
        for (stem, body) in components {
            sources.push((format!("{stem}.html"), body.as_str()));
        }
        sources.push((LAYOUT_TEMPLATE.to_string(), layout));
        sources.push((PAGE_TEMPLATE.to_string(), page));

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)?;

        Ok(Self {
            route: route.to_string(),
            tera,
        })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Execute the layout against `context`.
    pub fn render(&self, context: &tera::Context) -> tera::Result<String> {
        self.tera.render(LAYOUT_TEMPLATE, context)
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("route", &self.route)
            .field("templates", &self.tera.get_template_names().count())
            .finish()
    }
}
