//! Rendering configuration.
//!
//! Settings are usually read once from the site's TOML settings file, either
//! from a `[katex]` table or from a file that holds only these keys:
//!
//! ```text
//! [katex]
//! backend = "katex"
//! nodejs_binary = "node"
//! startup_timeout = 2.5
//! render_timeout = 1.0
//! preamble = '\newcommand{\R}{\mathbb{R}}'
//!
//! [katex.default_options]
//! throwOnError = false
//! ```

use crate::error::{ConfigError, Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// KaTeX-style rendering options such as `displayMode` or `throwOnError`.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Name of the settings table holding the rendering configuration.
const SETTINGS_TABLE: &str = "katex";

const DEFAULT_STARTUP_TIMEOUT_SECS: f64 = 1.0;
const DEFAULT_RENDER_TIMEOUT_SECS: f64 = 1.0;
const DEFAULT_NODE_BINARY: &str = "node";

/// Which backend converts LaTeX to markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// In-process conversion to MathML.
    #[default]
    Latex2Mathml,
    /// External KaTeX render server.
    Katex,
}

impl BackendKind {
    /// The settings name of this backend.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Latex2Mathml => "latex2mathml",
            BackendKind::Katex => "katex",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "latex2mathml" => Ok(BackendKind::Latex2Mathml),
            "katex" => Ok(BackendKind::Katex),
            other => Err(Error::UnknownBackend(other.to_string())),
        }
    }
}

/// Process-wide rendering configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Options applied to every render call; per-call options override them.
    pub default_options: Options,
    /// Runner script for the KaTeX server. `None` uses the bundled runner.
    pub katex_path: Option<PathBuf>,
    /// How long to wait for the render server to come up.
    pub startup_timeout: Duration,
    /// How long a single render request may take.
    pub render_timeout: Duration,
    /// JavaScript runtime used to launch the render server.
    pub node_binary: String,
    /// Macro definitions made available to every render (KaTeX backend).
    pub preamble: Option<String>,
    /// Selected backend.
    pub backend: BackendKind,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_options: default_options(),
            katex_path: None,
            startup_timeout: Duration::from_secs_f64(DEFAULT_STARTUP_TIMEOUT_SECS),
            render_timeout: Duration::from_secs_f64(DEFAULT_RENDER_TIMEOUT_SECS),
            node_binary: DEFAULT_NODE_BINARY.to_string(),
            preamble: None,
            backend: BackendKind::default(),
        }
    }
}

fn default_options() -> Options {
    let mut options = Options::new();
    // Let KaTeX color bad input instead of failing the page.
    options.insert("throwOnError".to_string(), serde_json::Value::Bool(false));
    options
}

/// Settings as they appear in TOML, before validation.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSettings {
    backend: String,
    default_options: Options,
    katex_path: Option<PathBuf>,
    startup_timeout: f64,
    render_timeout: f64,
    nodejs_binary: String,
    preamble: Option<String>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default().as_str().to_string(),
            default_options: default_options(),
            katex_path: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT_SECS,
            render_timeout: DEFAULT_RENDER_TIMEOUT_SECS,
            nodejs_binary: DEFAULT_NODE_BINARY.to_string(),
            preamble: None,
        }
    }
}

impl RenderConfig {
    /// Parse settings from TOML text.
    ///
    /// Reads the `[katex]` table when present, otherwise the top-level table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBackend`] for an unrecognised `backend` and
    /// [`Error::Config`] for malformed TOML or invalid timeouts.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(input).map_err(ConfigError::from)?;

        let section = match table.remove(SETTINGS_TABLE) {
            Some(toml::Value::Table(section)) => section,
            Some(_) => {
                return Err(ConfigError::Validation(format!(
                    "[{SETTINGS_TABLE}] must be a table"
                ))
                .into())
            }
            None => table,
        };

        let raw: RawSettings = toml::Value::Table(section)
            .try_into()
            .map_err(ConfigError::from)?;

        raw.into_config()
    }

    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, plus
    /// everything [`RenderConfig::from_toml_str`] can return.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_toml_str(&content)
    }
}

impl RawSettings {
    fn into_config(self) -> Result<RenderConfig> {
        let backend = self.backend.parse()?;

        Ok(RenderConfig {
            default_options: self.default_options,
            katex_path: self.katex_path,
            startup_timeout: seconds(self.startup_timeout, "startup_timeout")?,
            render_timeout: seconds(self.render_timeout, "render_timeout")?,
            node_binary: self.nodejs_binary,
            preamble: self.preamble,
            backend,
        })
    }
}

fn seconds(value: f64, field: &str) -> std::result::Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ConfigError::Validation(format!(
            "{field} must be a finite, non-negative number of seconds, got {value}"
        ))
    })
}
