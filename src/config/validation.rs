//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker counts > 0, prefixes rooted)
//! - Check closed enumerations (render mode, script library)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SiteConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::SiteConfig;
use crate::engine::metadata::{RenderMode, ScriptLibrary};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must start with '/', got {value:?}")]
    UnrootedPrefix { field: &'static str, value: String },

    #[error("unknown render mode {0:?} (expected \"ssr\" or \"ssg\")")]
    RenderMode(String),

    #[error("unknown script library {0:?}")]
    ScriptLibrary(String),

    #[error("layout {0:?} must live inside the app directory")]
    LayoutOutsideApp(String),

    #[error("admin.api_key must be set when admin endpoints are enabled")]
    MissingAdminKey,

    #[error("paths.page_extension must not be empty or start with '.'")]
    PageExtension,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &SiteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let counts = [
        ("render.compile_concurrency", config.render.compile_concurrency),
        ("render.ssg_queue_capacity", config.render.ssg_queue_capacity),
        ("render.ssg_workers", config.render.ssg_workers),
        ("metadata.extract_workers", config.metadata.extract_workers),
    ];
    for (field, value) in counts {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.metadata.memo_sweep_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "metadata.memo_sweep_secs",
        });
    }

    let prefixes = [
        ("server.static_prefix", &config.server.static_prefix),
        ("server.api_prefix", &config.server.api_prefix),
        ("admin.path_prefix", &config.admin.path_prefix),
    ];
    for (field, value) in prefixes {
        if !value.starts_with('/') {
            errors.push(ValidationError::UnrootedPrefix {
                field,
                value: value.clone(),
            });
        }
    }

    if RenderMode::parse(&config.render.default_render_mode).is_none() {
        errors.push(ValidationError::RenderMode(
            config.render.default_render_mode.clone(),
        ));
    }

    if ScriptLibrary::parse(&config.metadata.default_script_library).is_none() {
        errors.push(ValidationError::ScriptLibrary(
            config.metadata.default_script_library.clone(),
        ));
    }

    if !config.paths.layout_path.starts_with(&config.paths.app_dir) {
        errors.push(ValidationError::LayoutOutsideApp(
            config.paths.layout_path.display().to_string(),
        ));
    }

    let ext = &config.paths.page_extension;
    if ext.is_empty() || ext.starts_with('.') {
        errors.push(ValidationError::PageExtension);
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
