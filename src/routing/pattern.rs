//! Bracket-parameterized path patterns.
//!
//! # Design Decisions
//! - One `[name]` placeholder per segment, with optional literal text around it
//!   (`/posts/[slug]`, `/files/v[version].json`)
//! - Segment-wise comparison; no regex in the request path
//! - Captures are returned in declaration order

use std::fmt;

use crate::routing::params::Params;
use crate::routing::path::normalize_path;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param {
        prefix: String,
        name: String,
        suffix: String,
    },
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let Some(open) = raw.find('[') {
            if let Some(close_rel) = raw[open..].find(']') {
                let close = open + close_rel;
                let name = &raw[open + 1..close];
                let rest = &raw[close + 1..];
                if !name.is_empty() && !rest.contains('[') {
                    return Segment::Param {
                        prefix: raw[..open].to_string(),
                        name: name.to_string(),
                        suffix: rest.to_string(),
                    };
                }
            }
        }
        Segment::Static(raw.to_string())
    }

    fn capture<'a>(&self, segment: &'a str) -> Option<Option<&'a str>> {
        match self {
            Segment::Static(s) => (s == segment).then_some(None),
            Segment::Param { prefix, suffix, .. } => {
                let value = segment.strip_prefix(prefix.as_str())?;
                let value = value.strip_suffix(suffix.as_str())?;
                (!value.is_empty()).then_some(Some(value))
            }
        }
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        let source = normalize_path(pattern);
        let segments = source
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Segment::parse)
            .collect();
        Self { source, segments }
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_dynamic(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Param { .. }))
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param { name, .. } => Some(name.as_str()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    /// Literal segments before the first placeholder.
    pub fn static_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s, Segment::Static(_)))
            .count()
    }

    /// Match a normalized path, capturing placeholder values.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let mut parts = path.split('/').filter(|s| !s.is_empty());
        let mut params = Params::with_capacity(self.segments.len());

        for segment in &self.segments {
            let part = parts.next()?;
            if let Some(value) = segment.capture(part)? {
                if let Segment::Param { name, .. } = segment {
                    params.push(name.as_str(), value);
                }
            }
        }
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
