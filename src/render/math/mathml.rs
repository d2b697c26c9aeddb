//! MathML renderer.

use super::{display_mode, merge_options, LatexRenderer};
use crate::config::Options;
use crate::error::{RenderError, Result};

/// Renderer that converts LaTeX to MathML in process.
///
/// Preambles are not applied: the input is converted as given.
#[derive(Debug, Clone, Default)]
pub struct MathmlRenderer {
    default_options: Options,
}

impl MathmlRenderer {
    /// Create a new MathML renderer.
    pub fn new(default_options: Options) -> Self {
        Self { default_options }
    }
}

impl LatexRenderer for MathmlRenderer {
    fn render(
        &self,
        latex: &str,
        options: Option<&Options>,
        _preamble: Option<&str>,
    ) -> Result<String> {
        let options = merge_options(&self.default_options, options);
        convert(latex, display_mode(&options))
    }
}

#[cfg(feature = "mathml")]
fn convert(latex: &str, display: bool) -> Result<String> {
    let style = if display {
        latex2mathml::DisplayStyle::Block
    } else {
        latex2mathml::DisplayStyle::Inline
    };

    latex2mathml::latex_to_mathml(latex, style)
        .map_err(|err| RenderError::Latex(err.to_string()).into())
}

#[cfg(not(feature = "mathml"))]
fn convert(_latex: &str, _display: bool) -> Result<String> {
    Err(RenderError::Unsupported(
        "latex2mathml support was not compiled in (enable the `mathml` feature)".to_string(),
    )
    .into())
}


#[cfg(all(test, not(feature = "mathml")))]
mod tests {
    use super::*;

    #[test]
    fn test_mathml_unavailable() {
        let err = MathmlRenderer::default().render("x", None, None).unwrap_err();
        assert!(matches!(err, crate::Error::Render(RenderError::Unsupported(_))));
    }
}
