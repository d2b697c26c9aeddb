//! Math rendering backends.

mod katex;
mod mathml;

pub use self::katex::KatexRenderer;
pub use self::mathml::MathmlRenderer;

use crate::config::{BackendKind, Options, RenderConfig};
use crate::error::Result;
use std::fmt;

/// Option key selecting display (block) rather than inline math.
pub const DISPLAY_MODE: &str = "displayMode";

/// Trait for math renderers.
pub trait LatexRenderer: Send + Sync {
    /// Render `latex` to markup.
    ///
    /// `options` are the per-call overrides, `preamble` the text to put in
    /// front of the input.
    fn render(&self, latex: &str, options: Option<&Options>, preamble: Option<&str>)
        -> Result<String>;
}

/// The selected backend together with its renderer.
pub enum Backend {
    Latex2Mathml(Box<dyn LatexRenderer>),
    Katex(Box<dyn LatexRenderer>),
}

impl Backend {
    /// Create the renderer configured by `config.backend`.
    pub fn from_config(config: &RenderConfig) -> Self {
        match config.backend {
            BackendKind::Latex2Mathml => Backend::Latex2Mathml(Box::new(MathmlRenderer::new(
                config.default_options.clone(),
            ))),
            BackendKind::Katex => Backend::Katex(Box::new(KatexRenderer::new(config))),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Latex2Mathml(_) => BackendKind::Latex2Mathml,
            Backend::Katex(_) => BackendKind::Katex,
        }
    }

    pub(crate) fn renderer(&self) -> &dyn LatexRenderer {
        match self {
            Backend::Latex2Mathml(renderer) | Backend::Katex(renderer) => renderer.as_ref(),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

/// Defaults overridden key by key with the per-call options.
pub(crate) fn merge_options(defaults: &Options, overrides: Option<&Options>) -> Options {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

pub(crate) fn display_mode(options: &Options) -> bool {
    options
        .get(DISPLAY_MODE)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn options(value: serde_json::Value) -> Options {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let defaults = options(json!({"throwOnError": false, "strict": "warn"}));
        let overrides = options(json!({"throwOnError": true, "displayMode": true}));

        let merged = merge_options(&defaults, Some(&overrides));
        assert_eq!(
            merged,
            options(json!({"throwOnError": true, "strict": "warn", "displayMode": true}))
        );
    }

    #[test]
    fn test_merge_without_overrides() {
        let defaults = options(json!({"throwOnError": false}));
        assert_eq!(merge_options(&defaults, None), defaults);
    }

    #[test]
    fn test_display_mode() {
        assert!(display_mode(&options(json!({"displayMode": true}))));
        assert!(!display_mode(&options(json!({"displayMode": false}))));
        assert!(!display_mode(&options(json!({"displayMode": "yes"}))));
        assert!(!display_mode(&Options::new()));
    }

    #[test]
    fn test_backend_from_config() {
        let mut config = RenderConfig::default();
        assert_eq!(Backend::from_config(&config).kind(), BackendKind::Latex2Mathml);

        config.backend = BackendKind::Katex;
        let backend = Backend::from_config(&config);
        assert_eq!(backend.kind(), BackendKind::Katex);
        assert_eq!(format!("{backend:?}"), "Backend(Katex)");
    }
}
