//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the site server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for a site.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SiteConfig {
    /// Site identity exposed to templates.
    pub site: SiteInfoConfig,

    /// Listener and URL prefix settings.
    pub server: ServerConfig,

    /// Source tree and cache locations.
    pub paths: PathsConfig,

    /// Rendering, caching and compilation settings.
    pub render: RenderConfig,

    /// Metadata defaults and extraction tuning.
    pub metadata: MetadataConfig,

    /// Client-script library locations.
    pub scripts: ScriptsConfig,

    /// Development mode settings.
    pub dev: DevConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
}

/// Site identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteInfoConfig {
    /// Human-readable application name.
    pub app_name: String,

    /// Application version string.
    pub version: String,
}

impl Default for SiteInfoConfig {
    fn default() -> Self {
        Self {
            app_name: "Pagewing".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// URL prefix served from the static directory.
    pub static_prefix: String,

    /// URL prefix dispatched to registered API handlers.
    pub api_prefix: String,

    /// Largest request body handed to an API handler.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 15,
            static_prefix: "/static".to_string(),
            api_prefix: "/api".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Source tree locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the page source tree.
    pub app_dir: PathBuf,

    /// Shared layout file. Excluded from the page walk.
    pub layout_path: PathBuf,

    /// Shared component fragments. Excluded from the page walk.
    pub component_dir: PathBuf,

    /// Static asset directory.
    pub static_dir: PathBuf,

    /// Directory where statically generated pages are persisted.
    pub ssg_cache_dir: PathBuf,

    /// Optional themed error page template.
    pub error_template: Option<PathBuf>,

    /// Markup file extension, without the dot.
    pub page_extension: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app_dir: PathBuf::from("app"),
            layout_path: PathBuf::from("app/layout.html"),
            component_dir: PathBuf::from("app/components"),
            static_dir: PathBuf::from("static"),
            ssg_cache_dir: PathBuf::from(".pagewing/cache"),
            error_template: None,
            page_extension: "html".to_string(),
        }
    }
}

/// Rendering and compilation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render mode for pages without a `render` directive ("ssr" or "ssg").
    pub default_render_mode: String,

    /// Enable static generation for pages declaring it.
    pub ssg_enabled: bool,

    /// Persist statically generated pages to `paths.ssg_cache_dir`.
    pub ssg_cache_enabled: bool,

    /// Enable the rendered-output cache for server-rendered pages.
    pub template_cache: bool,

    /// Pages larger than this are never stored in the render cache.
    pub render_cache_max_bytes: usize,

    /// Maximum number of entries held by the render cache per generation.
    pub render_cache_max_entries: usize,

    /// Admission limit for concurrent page compilation.
    pub compile_concurrency: usize,

    /// Concatenate static css/js into bundles on reload.
    pub bundle_assets: bool,

    /// Capacity of the background static regeneration queue.
    pub ssg_queue_capacity: usize,

    /// Workers draining the static regeneration queue.
    pub ssg_workers: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_render_mode: "ssr".to_string(),
            ssg_enabled: true,
            ssg_cache_enabled: false,
            template_cache: true,
            render_cache_max_bytes: 64 * 1024,
            render_cache_max_entries: 1024,
            compile_concurrency: 4,
            bundle_assets: false,
            ssg_queue_capacity: 64,
            ssg_workers: 1,
        }
    }
}

/// Metadata defaults and extraction tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Title used when neither layout nor page declares one.
    pub default_title: String,

    /// Meta tags every page starts from.
    pub default_meta_tags: BTreeMap<String, String>,

    /// Client-script library for pages without a `js` directive.
    pub default_script_library: String,

    /// Size of the worker pool used for large inputs.
    pub extract_workers: usize,

    /// Inputs at or above this many bytes are extracted on the worker pool.
    pub large_input_threshold: usize,

    /// Lifetime of memoized extraction results.
    pub memo_ttl_secs: u64,

    /// Interval of the expired-entry sweep.
    pub memo_sweep_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        let mut default_meta_tags = BTreeMap::new();
        default_meta_tags.insert(
            "viewport".to_string(),
            "width=device-width, initial-scale=1.0".to_string(),
        );
        default_meta_tags.insert(
            "description".to_string(),
            "A site served by Pagewing".to_string(),
        );
        default_meta_tags.insert("og:title".to_string(), "Pagewing".to_string());
        default_meta_tags.insert("og:type".to_string(), "website".to_string());
        default_meta_tags.insert("twitter:card".to_string(), "summary".to_string());

        Self {
            default_title: "Pagewing".to_string(),
            default_meta_tags,
            default_script_library: "alpine".to_string(),
            extract_workers: 8,
            large_input_threshold: 1024,
            memo_ttl_secs: 30 * 60,
            memo_sweep_secs: 30 * 60,
        }
    }
}

/// Client-script library sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub alpine_url: String,
    pub jquery_url: String,
    pub pvue_url: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            alpine_url: "https://cdn.jsdelivr.net/npm/alpinejs@3.x.x/dist/cdn.min.js".to_string(),
            jquery_url: "https://code.jquery.com/jquery-3.7.1.min.js".to_string(),
            pvue_url: "https://unpkg.com/petite-vue".to_string(),
        }
    }
}

/// Development mode settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DevConfig {
    /// Development mode: injects the live-reload client into pages.
    pub dev_mode: bool,

    /// Watch sources and reload on change.
    pub live_reload: bool,

    /// Quiet period before a burst of file events triggers one reload.
    pub watch_debounce_ms: u64,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            live_reload: true,
            watch_debounce_ms: 250,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Operator endpoints configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable operator endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Path prefix the operator endpoints are mounted under.
    pub path_prefix: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            path_prefix: "/__admin".to_string(),
        }
    }
}

impl SiteConfig {
    /// Rebase every relative source path onto `root`.
    ///
    /// Used when the config file lives next to the site rather than in the
    /// working directory.
    pub fn rooted_at(mut self, root: &std::path::Path) -> Self {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        rebase(&mut self.paths.app_dir);
        rebase(&mut self.paths.layout_path);
        rebase(&mut self.paths.component_dir);
        rebase(&mut self.paths.static_dir);
        rebase(&mut self.paths.ssg_cache_dir);
        if let Some(p) = self.paths.error_template.as_mut() {
            rebase(p);
        }
        self
    }
}
