//! Three-tier metadata precedence: defaults < layout < page.
//!
//! Every field is resolved on its own. A tier overrides the running value only
//! where it differs from the configured default, so a tier that says nothing
//! (and therefore carries the default) never masks an earlier override.

use crate::engine::metadata::{MetadataDefaults, PageMetadata};

/// Tags derived from the final title and description instead of merged.
pub const PROTECTED_TAGS: [&str; 3] = ["description", "og:description", "og:title"];

fn is_protected(key: &str) -> bool {
    PROTECTED_TAGS.contains(&key)
}

/// Merge layout and page metadata over the defaults.
pub fn merge_metadata(
    defaults: &MetadataDefaults,
    layout: Option<&PageMetadata>,
    page: &PageMetadata,
) -> PageMetadata {
    let mut merged = defaults.seed();
    merged.meta_tags.retain(|k, _| !is_protected(k));

    for tier in layout.into_iter().chain(std::iter::once(page)) {
        if tier.title != defaults.title {
            merged.title = tier.title.clone();
        }
        if tier.description != defaults.description {
            merged.description = tier.description.clone();
        }
        if tier.render_mode != defaults.render_mode {
            merged.render_mode = tier.render_mode;
        }
        if tier.script_library != defaults.script_library {
            merged.script_library = tier.script_library;
        }
        for (key, value) in &tier.meta_tags {
            if is_protected(key) {
                continue;
            }
            if defaults.meta_tags.get(key) != Some(value) {
                merged.meta_tags.insert(key.clone(), value.clone());
            }
        }
    }

    merged
        .meta_tags
        .insert("og:title".to_string(), merged.title.clone());
    if !merged.description.is_empty() {
        merged
            .meta_tags
            .insert("description".to_string(), merged.description.clone());
        merged
            .meta_tags
            .insert("og:description".to_string(), merged.description.clone());
    }

    merged
}
