//! One reload's worth of immutable serving state.
//!
//! A `Generation` owns the route table, compiled templates, extracted metadata,
//! compile errors and both output caches. The site swaps whole generations;
//! nothing inside one is replaced after it is published, so a request that
//! loaded a generation sees a single consistent build from start to finish.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::config::SiteConfig;
use crate::engine::cache::{RenderCache, SsgCache};
use crate::engine::compiler::CompiledTemplate;
use crate::engine::merge::merge_metadata;
use crate::engine::metadata::{MetadataDefaults, PageMetadata};
use crate::engine::pipeline::BuildOutput;
use crate::errors::ErrorRecord;
use crate::routing::RouteTable;

pub struct Generation {
    pub id: u64,
    pub built_at: DateTime<Utc>,
    pub routes: RouteTable,
    pub templates: HashMap<String, Arc<CompiledTemplate>>,
    pub page_metadata: HashMap<String, Arc<PageMetadata>>,
    pub layout_metadata: Option<Arc<PageMetadata>>,
    pub compile_errors: HashMap<String, ErrorRecord>,
    pub bundles: BTreeMap<String, String>,
    pub error_template: Option<String>,
    pub ssg: SsgCache,
    pub render_cache: RenderCache,
    merged: DashMap<String, Arc<PageMetadata>>,
}

impl Generation {
    /// Placeholder served before the first reload completes.
    pub fn empty(config: &SiteConfig) -> Self {
        Self {
            id: 0,
            built_at: Utc::now(),
            routes: RouteTable::new(
                config.server.static_prefix.clone(),
                config.server.api_prefix.clone(),
            ),
            templates: HashMap::new(),
            page_metadata: HashMap::new(),
            layout_metadata: None,
            compile_errors: HashMap::new(),
            bundles: BTreeMap::new(),
            error_template: None,
            ssg: SsgCache::new(),
            render_cache: render_cache(config),
            merged: DashMap::new(),
        }
    }

    /// Freeze a pipeline build and its route table.
    pub fn assemble(id: u64, output: BuildOutput, routes: RouteTable, config: &SiteConfig) -> Self {
        let mut templates = HashMap::with_capacity(output.pages.len());
        let mut page_metadata = HashMap::with_capacity(output.pages.len());
        for page in output.pages {
            templates.insert(page.route.clone(), page.template);
            page_metadata.insert(page.route, page.metadata);
        }

        let compile_errors = output
            .failures
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();

        Self {
            id,
            built_at: Utc::now(),
            routes,
            templates,
            page_metadata,
            layout_metadata: Some(output.layout_metadata),
            compile_errors,
            bundles: output.bundles,
            error_template: output.error_template,
            ssg: SsgCache::new(),
            render_cache: render_cache(config),
            merged: DashMap::new(),
        }
    }

    /// Final metadata for `route`, merged once per generation.
    pub fn merged_metadata(&self, route: &str, defaults: &MetadataDefaults) -> Option<Arc<PageMetadata>> {
        if let Some(hit) = self.merged.get(route) {
            return Some(Arc::clone(hit.value()));
        }
        let page = self.page_metadata.get(route)?;
        let merged = Arc::new(merge_metadata(
            defaults,
            self.layout_metadata.as_deref(),
            page,
        ));
        Some(Arc::clone(
            self.merged.entry(route.to_string()).or_insert(merged).value(),
        ))
    }

    /// Compiled and failed routes, sorted.
    pub fn route_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .templates
            .keys()
            .chain(self.compile_errors.keys())
            .map(String::as_str)
            .collect();
        paths.sort_unstable();
        paths
    }

    /// Serving state compiled cleanly for `route`.
    pub fn is_healthy(&self, route: &str) -> bool {
        self.templates.contains_key(route) && !self.compile_errors.contains_key(route)
    }
}

fn render_cache(config: &SiteConfig) -> RenderCache {
    RenderCache::new(
        config.render.render_cache_max_entries,
        config.render.render_cache_max_bytes,
    )
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("id", &self.id)
            .field("built_at", &self.built_at)
            .field("pages", &self.templates.len())
            .field("compile_errors", &self.compile_errors.len())
            .finish()
    }
}
