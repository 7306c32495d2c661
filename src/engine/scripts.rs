//! Client-script injection.
//!
//! One tag for the page's script library (plus the live-reload client in
//! development) is inserted immediately before the first `</head>`. Documents
//! without a head are returned unchanged.

use crate::config::SiteConfig;
use crate::engine::metadata::ScriptLibrary;

/// WebSocket path the live-reload client connects to.
pub const LIVE_RELOAD_PATH: &str = "/__pagewing/livereload";

const HEAD_CLOSE: &str = "</head>";

#[derive(Debug, Clone)]
pub struct ScriptInjector {
    alpine: String,
    jquery: String,
    pvue: String,
    live_reload: bool,
}

impl ScriptInjector {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            alpine: config.scripts.alpine_url.clone(),
            jquery: config.scripts.jquery_url.clone(),
            pvue: config.scripts.pvue_url.clone(),
            live_reload: config.dev.dev_mode && config.dev.live_reload,
        }
    }

    pub fn tag(&self, library: ScriptLibrary) -> Option<String> {
        match library {
            ScriptLibrary::Alpine => Some(format!(r#"<script defer src="{}"></script>"#, self.alpine)),
            ScriptLibrary::Pvue => Some(format!(r#"<script defer init src="{}"></script>"#, self.pvue)),
            ScriptLibrary::Jquery => Some(format!(r#"<script src="{}"></script>"#, self.jquery)),
            ScriptLibrary::Vanilla | ScriptLibrary::None => None,
        }
    }

    fn live_reload_snippet() -> String {
        format!(
            "<script>(function(){{var p=location.protocol==='https:'?'wss://':'ws://';\
             var s=new WebSocket(p+location.host+'{LIVE_RELOAD_PATH}');\
             s.onmessage=function(){{location.reload();}};}})();</script>"
        )
    }

    /// Insert the tags for `library` before the first `</head>`.
    pub fn inject(&self, html: &str, library: ScriptLibrary) -> String {
        let mut tags = self.tag(library).unwrap_or_default();
        if self.live_reload {
            tags.push_str(&Self::live_reload_snippet());
        }
        if tags.is_empty() {
            return html.to_string();
        }
        match html.find(HEAD_CLOSE) {
            Some(at) => {
                let mut out = String::with_capacity(html.len() + tags.len());
                out.push_str(&html[..at]);
                out.push_str(&tags);
                out.push_str(&html[at..]);
                out
            }
            None => html.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<html><head><title>t</title></head><body></body></html>";

    #[test]
    fn test_injects_before_head_close() {
        let injector = ScriptInjector::new(&SiteConfig::default());
        let out = injector.inject(DOC, ScriptLibrary::Jquery);
        let tag = injector.tag(ScriptLibrary::Jquery).unwrap();
        assert!(out.contains(&format!("{tag}</head>")));
        assert_eq!(out.matches("<script").count(), 1);
    }

    #[test]
    fn test_alpine_is_deferred() {
        let injector = ScriptInjector::new(&SiteConfig::default());
        assert!(injector.tag(ScriptLibrary::Alpine).unwrap().contains("defer"));
    }

    #[test]
    fn test_none_and_vanilla_inject_nothing() {
        let injector = ScriptInjector::new(&SiteConfig::default());
        assert_eq!(injector.inject(DOC, ScriptLibrary::None), DOC);
        assert_eq!(injector.inject(DOC, ScriptLibrary::Vanilla), DOC);
    }

    #[test]
    fn test_no_head_left_untouched() {
        let injector = ScriptInjector::new(&SiteConfig::default());
        assert_eq!(injector.inject("<p>x</p>", ScriptLibrary::Alpine), "<p>x</p>");
    }

    #[test]
    fn test_dev_mode_adds_live_reload() {
        let mut config = SiteConfig::default();
        config.dev.dev_mode = true;
        let injector = ScriptInjector::new(&config);
        let out = injector.inject(DOC, ScriptLibrary::None);
        assert!(out.contains(LIVE_RELOAD_PATH));
    }
}
