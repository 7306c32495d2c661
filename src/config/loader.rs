//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SiteConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Relative source paths are resolved against the directory holding the file.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    let config = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => config.rooted_at(dir),
        _ => config,
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML document without touching the filesystem.
pub fn parse_config(content: &str) -> Result<SiteConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rebases_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagewing.toml");
        fs::write(&path, "[site]\napp_name = \"Blog\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.site.app_name, "Blog");
        assert_eq!(config.paths.app_dir, dir.path().join("app"));
    }

    #[test]
    fn test_load_reports_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagewing.toml");
        fs::write(&path, "[render]\ncompile_concurrency = 0\n").unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_is_surfaced() {
        assert!(matches!(
            parse_config("[render\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
