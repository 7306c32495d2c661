//! Path normalization and file-to-route derivation.

use std::path::{Component, Path};

/// Collapse separators, resolve `.` and `..`, drop the trailing slash.
///
/// The result always starts with exactly one `/`; the root is `/`.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Route path of a source file.
///
/// Strips `root`, the `.{extension}` suffix and a trailing `index` leaf:
/// `<root>/a/b/index.html` → `/a/b`, `<root>/index.html` → `/`,
/// `<root>/a.html` → `/a`.
pub fn route_path_from_file(file: &Path, root: &Path, extension: &str) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);

    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(last) = segments.last_mut() {
        let suffix = format!(".{extension}");
        if let Some(stem) = last.strip_suffix(&suffix) {
            *last = stem.to_string();
        }
    }
    if segments.last().map(String::as_str) == Some("index") {
        segments.pop();
    }

    normalize_path(&segments.join("/"))
}

/// True if `path` is `prefix` or lies below it.
pub fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
