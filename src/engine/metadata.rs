//! In-markup directive extraction.
//!
//! # Grammar
//! ```text
//! directive := "<!--" "-"? name ":" value "-->"
//! name      := "title" | "description" | "meta" | "render" | "js"
//! value     := any text not containing "<!"
//! ```
//! A leading third dash (`<!---title:Home--->`) marks the current syntax; the
//! two-dash form is the legacy syntax. Extraction runs two passes: current-syntax
//! directives first, then legacy directives fill only what is still unset. For
//! scalar fields the first valid occurrence in each pass wins. Meta entries from
//! the legacy pass never replace a key set by a current-syntax entry.
//!
//! Values for `render` and `js` belong to closed sets; unknown values are ignored
//! and the field falls back to the configured default.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::SiteConfig;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    // A value never crosses another comment opener, so an unclosed directive matches nothing.
    Regex::new(r"<!--(-?)(title|description|meta|render|js):((?:[^<]|<[^!])*?)-->")
        .unwrap_or_else(|e| panic!("directive pattern is invalid: {e}"))
});

/// How a page is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Rendered on every request.
    Ssr,
    /// Rendered once per generation and served from cache.
    Ssg,
}

impl RenderMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ssr" => Some(Self::Ssr),
            "ssg" => Some(Self::Ssg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssr => "ssr",
            Self::Ssg => "ssg",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-script library injected into a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLibrary {
    Alpine,
    Jquery,
    Vanilla,
    Pvue,
    None,
}

impl ScriptLibrary {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alpine" => Some(Self::Alpine),
            "jquery" => Some(Self::Jquery),
            "vanilla" => Some(Self::Vanilla),
            "pvue" => Some(Self::Pvue),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpine => "alpine",
            Self::Jquery => "jquery",
            Self::Vanilla => "vanilla",
            Self::Pvue => "pvue",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ScriptLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of one page, layout, or the merged result of both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub meta_tags: BTreeMap<String, String>,
    pub render_mode: RenderMode,
    pub script_library: ScriptLibrary,
}

/// Configured first tier of the precedence chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDefaults {
    pub title: String,
    pub description: String,
    pub meta_tags: BTreeMap<String, String>,
    pub render_mode: RenderMode,
    pub script_library: ScriptLibrary,
}

impl MetadataDefaults {
    pub fn from_config(config: &SiteConfig) -> Self {
        let meta_tags = config.metadata.default_meta_tags.clone();
        Self {
            title: config.metadata.default_title.clone(),
            description: meta_tags.get("description").cloned().unwrap_or_default(),
            meta_tags,
            render_mode: RenderMode::parse(&config.render.default_render_mode)
                .unwrap_or(RenderMode::Ssr),
            script_library: ScriptLibrary::parse(&config.metadata.default_script_library)
                .unwrap_or(ScriptLibrary::Alpine),
        }
    }

    /// Metadata of a document without any directive.
    pub fn seed(&self) -> PageMetadata {
        PageMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            meta_tags: self.meta_tags.clone(),
            render_mode: self.render_mode,
            script_library: self.script_library,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Current,
    Legacy,
}

#[derive(Debug)]
struct Directive<'a> {
    syntax: Syntax,
    name: &'a str,
    value: &'a str,
}

fn directives(content: &str) -> impl Iterator<Item = Directive<'_>> {
    DIRECTIVE.captures_iter(content).filter_map(|caps| {
        let syntax = if caps.get(1)?.as_str().is_empty() {
            Syntax::Legacy
        } else {
            Syntax::Current
        };
        // `--->` leaves a trailing dash in the lazy capture.
        let value = caps.get(3)?.as_str().trim().trim_end_matches('-').trim();
        Some(Directive {
            syntax,
            name: caps.get(2)?.as_str(),
            value,
        })
    })
}

/// Namespaces whose keys carry their own colon (`og:image`, `twitter:card`).
const META_NAMESPACES: &[&str] = &["og", "twitter", "article", "fb", "profile", "book"];

/// Split `key:value`, keeping a namespaced key in one piece.
fn split_meta(raw: &str) -> Option<(String, String)> {
    let (first, rest) = raw.split_once(':')?;
    let first = first.trim();
    if first.is_empty() {
        return None;
    }
    if META_NAMESPACES.contains(&first) {
        if let Some((local, value)) = rest.split_once(':') {
            let local = local.trim();
            if !local.is_empty() && !local.contains('/') {
                return Some((format!("{first}:{local}"), value.trim().to_string()));
            }
        }
    }
    Some((first.to_string(), rest.trim().to_string()))
}

#[derive(Default)]
struct Pass {
    title: Option<String>,
    description: Option<String>,
    render_mode: Option<RenderMode>,
    script_library: Option<ScriptLibrary>,
    meta: Vec<(String, String)>,
}

impl Pass {
    fn collect(content: &str, syntax: Syntax) -> Self {
        let mut pass = Self::default();
        for d in directives(content).filter(|d| d.syntax == syntax) {
            match d.name {
                "title" if pass.title.is_none() && !d.value.is_empty() => {
                    pass.title = Some(d.value.to_string());
                }
                "description" if pass.description.is_none() && !d.value.is_empty() => {
                    pass.description = Some(d.value.to_string());
                }
                "render" if pass.render_mode.is_none() => {
                    pass.render_mode = RenderMode::parse(d.value);
                }
                "js" if pass.script_library.is_none() => {
                    pass.script_library = ScriptLibrary::parse(d.value);
                }
                "meta" => {
                    if let Some(entry) = split_meta(d.value) {
                        pass.meta.push(entry);
                    }
                }
                _ => {}
            }
        }
        pass
    }
}

/// Extract metadata from raw page or layout text.
pub fn extract(content: &str, defaults: &MetadataDefaults) -> PageMetadata {
    let current = Pass::collect(content, Syntax::Current);
    let legacy = Pass::collect(content, Syntax::Legacy);

    let mut metadata = defaults.seed();

    if let Some(title) = current.title.or(legacy.title) {
        metadata.meta_tags.insert("og:title".to_string(), title.clone());
        metadata.title = title;
    }
    if let Some(description) = current.description.or(legacy.description) {
        metadata
            .meta_tags
            .insert("description".to_string(), description.clone());
        metadata
            .meta_tags
            .insert("og:description".to_string(), description.clone());
        metadata.description = description;
    }
    if let Some(mode) = current.render_mode.or(legacy.render_mode) {
        metadata.render_mode = mode;
    }
    if let Some(lib) = current.script_library.or(legacy.script_library) {
        metadata.script_library = lib;
    }

    let mut current_keys = Vec::with_capacity(current.meta.len());
    for (key, value) in current.meta {
        current_keys.push(key.clone());
        metadata.meta_tags.insert(key, value);
    }
    for (key, value) in legacy.meta {
        if !current_keys.contains(&key) {
            metadata.meta_tags.insert(key, value);
        }
    }

    metadata
}

/// Remove every directive comment, then any blank lines left at the top.
pub fn strip_directives(content: &str) -> String {
    let stripped = DIRECTIVE.replace_all(content, "");
    stripped
        .trim_start_matches(['\r', '\n'])
        .to_string()
}

/// True if the text still carries a recognized directive.
pub fn has_directives(content: &str) -> bool {
    DIRECTIVE.is_match(content)
}
