//! Rendering layer: one entry point in front of the configured backend.

pub mod math;

pub use math::{Backend, KatexRenderer, LatexRenderer, MathmlRenderer, DISPLAY_MODE};

use crate::config::{Options, RenderConfig};
use crate::error::Result;
use crate::preamble::{effective_preamble, LocalPreambles};
use tracing::debug;

/// Renders LaTeX with the backend chosen in a [`RenderConfig`].
#[derive(Debug)]
pub struct Renderer {
    config: RenderConfig,
    backend: Backend,
}

impl Renderer {
    /// Create a renderer for `config.backend`.
    pub fn new(config: RenderConfig) -> Self {
        let backend = Backend::from_config(&config);
        Self { config, backend }
    }

    /// Create a renderer that uses `backend` regardless of `config.backend`.
    pub fn with_backend(config: RenderConfig, backend: Backend) -> Self {
        Self { config, backend }
    }

    /// Parse TOML settings and create a renderer for them.
    ///
    /// An unknown backend name is rejected here, before any backend exists.
    pub fn from_settings(settings: &str) -> Result<Self> {
        Ok(Self::new(RenderConfig::from_toml_str(settings)?))
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Render `latex` with the global preamble.
    ///
    /// The backend's output and errors are returned as they are.
    pub fn render_latex(&self, latex: &str, options: Option<&Options>) -> Result<String> {
        self.dispatch(latex, options, self.config.preamble.as_deref())
    }

    /// Render `latex` with the global preamble followed by `local`.
    pub fn render_latex_with(
        &self,
        latex: &str,
        options: Option<&Options>,
        local: &LocalPreambles,
    ) -> Result<String> {
        let preamble = effective_preamble(self.config.preamble.as_deref(), local);
        self.dispatch(latex, options, preamble.as_deref())
    }

    /// Render inline math.
    pub fn render_inline(&self, latex: &str, local: &LocalPreambles) -> Result<String> {
        self.render_latex_with(latex, Some(&display_options(false)), local)
    }

    /// Render display math.
    pub fn render_display(&self, latex: &str, local: &LocalPreambles) -> Result<String> {
        self.render_latex_with(latex, Some(&display_options(true)), local)
    }

    fn dispatch(
        &self,
        latex: &str,
        options: Option<&Options>,
        preamble: Option<&str>,
    ) -> Result<String> {
        debug!(
            target = "pelican_katex::render",
            op = "render::render_latex",
            backend = %self.backend.kind(),
            latex_bytes = latex.len(),
            has_preamble = preamble.is_some(),
            "Dispatching LaTeX render"
        );
        self.backend.renderer().render(latex, options, preamble)
    }
}

fn display_options(display: bool) -> Options {
    let mut options = Options::new();
    options.insert(DISPLAY_MODE.to_string(), serde_json::Value::Bool(display));
    options
}
