//! Error types for the pelican-katex library.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown backend '{0}'!")]
    UnknownBackend(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("KaTeX error: {0}")]
    Katex(#[from] KatexError),
}

/// Errors that occur while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting: {0}")]
    Validation(String),
}

/// Errors raised by the in-process backends.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid LaTeX: {0}")]
    Latex(String),

    #[error("Unsupported backend: {0}")]
    Unsupported(String),
}

/// Errors raised while driving the external KaTeX render server.
#[derive(Debug, Error)]
pub enum KatexError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("render server did not start within {0:?}")]
    StartupTimeout(Duration),

    #[error("render server exited unexpectedly: {0}")]
    Exited(String),

    #[error("rendering did not finish within {0:?}")]
    RenderTimeout(Duration),

    #[error("{kind}: {message}")]
    Katex { kind: String, message: String },

    #[error("malformed response from render server: {0}")]
    Protocol(String),

    #[error("I/O error talking to render server: {0}")]
    Io(#[from] std::io::Error),
}
