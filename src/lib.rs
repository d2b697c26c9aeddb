//! # pelican-katex
//!
//! LaTeX math rendering for static site generators. One entry point renders a
//! LaTeX string to HTML/MathML with the backend picked in the settings.
//!
//! ## Backends
//!
//! - `latex2mathml` (default): in-process conversion to MathML (requires the
//!   `mathml` feature, on by default)
//! - `katex`: a KaTeX render server run by Node.js, kept alive between calls
//!
//! ## Quick Start
//!
//! ```rust
//! use pelican_katex::{LocalPreambles, Renderer};
//!
//! let renderer = Renderer::from_settings(r#"
//! [katex]
//! backend = "latex2mathml"
//! "#).unwrap();
//!
//! let local = LocalPreambles::new();
//! # #[cfg(feature = "mathml")]
//! # {
//! let html = renderer.render_inline("x^2", &local).unwrap();
//! assert!(html.contains("<math"));
//! # }
//! ```
//!
//! ## Settings
//!
//! ```text
//! [katex]
//! backend = "katex"            # or "latex2mathml"
//! nodejs_binary = "node"
//! katex_path = "render.js"     # optional custom render server
//! startup_timeout = 1.0        # seconds
//! render_timeout = 1.0         # seconds
//! preamble = '\newcommand{\R}{\mathbb{R}}'
//!
//! [katex.default_options]
//! throwOnError = false
//! ```
//!
//! ## Preambles
//!
//! The global `preamble` is put in front of every input. Documents can add
//! their own fragments with [`LocalPreambles`]; they follow the global
//! preamble in push order and stay until the buffer is reset.
//!
//! ## FFI
//!
//! A C-compatible API for hosts written in other languages lives in the
//! `ffi` module.
//!
//! ## Features
//!
//! - `mathml`: Enable the latex2mathml backend (requires `latex2mathml` crate)

pub mod config;
pub mod error;
pub mod preamble;
pub mod render;

// FFI module (only for non-WASM builds)
#[cfg(not(target_arch = "wasm32"))]
pub mod ffi;

// Convenience re-exports
pub use config::{BackendKind, Options, RenderConfig};
pub use error::{ConfigError, Error, KatexError, RenderError, Result};
pub use preamble::{effective_preamble, LocalPreambles, PreambleScope};
pub use render::{Backend, KatexRenderer, LatexRenderer, MathmlRenderer, Renderer};
