//! End-to-end tests through the public API.

use pelican_katex::{BackendKind, Error, KatexError, LocalPreambles, Renderer};
use pretty_assertions::assert_eq;

#[test]
fn unknown_backend_names_offending_value() {
    let err = Renderer::from_settings("[katex]\nbackend = \"unsupported\"\n").unwrap_err();

    assert!(matches!(err, Error::UnknownBackend(ref name) if name == "unsupported"));
    assert_eq!(err.to_string(), "Unknown backend 'unsupported'!");
}

#[test]
fn default_backend_is_latex2mathml() {
    let renderer = Renderer::from_settings("").unwrap();
    assert_eq!(renderer.backend().kind(), BackendKind::Latex2Mathml);
}

#[cfg(feature = "mathml")]
#[test]
fn latex2mathml_inline_and_display() {
    let renderer = Renderer::from_settings("backend = \"latex2mathml\"\n").unwrap();
    let local = LocalPreambles::new();

    let inline = renderer.render_inline("x^2", &local).unwrap();
    let display = renderer.render_display(r"\sqrt{2}", &local).unwrap();

    assert!(inline.starts_with("<math"));
    assert!(inline.contains("display=\"inline\""));
    assert!(display.contains("display=\"block\""));
}

#[cfg(feature = "mathml")]
#[test]
fn latex2mathml_output_does_not_depend_on_preambles() {
    let plain = Renderer::from_settings("").unwrap();
    let with_global =
        Renderer::from_settings("preamble = '\\newcommand{\\R}{\\mathbb{R}}'\n").unwrap();
    let mut local = LocalPreambles::new();
    local.push(r"\def\eps{\varepsilon}");

    let expected = plain.render_inline("x^2", &LocalPreambles::new()).unwrap();

    assert_eq!(with_global.render_inline("x^2", &local).unwrap(), expected);
    assert!(!expected.contains("PARSE ERROR"));
}

#[cfg(unix)]
mod katex {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A stand-in render server that logs every request it receives.
    fn echo_server(dir: &Path, requests: &Path) -> PathBuf {
        let path = dir.join("fake-node");
        let script = format!(
            r#"#!/bin/sh
echo '{{"ready": true}}'
while IFS= read -r line; do
  printf '%s\n' "$line" >> "{requests}"
  printf '%s\n' '{{"html": "<span class=\"katex\"></span>"}}'
done
"#,
            requests = requests.display(),
        );
        fs::write(&path, script).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    fn sent_preambles(requests: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(requests)
            .expect("requests log")
            .lines()
            .map(|line| {
                let request: serde_json::Value = serde_json::from_str(line).expect("json");
                request["preamble"].clone()
            })
            .collect()
    }

    #[test]
    fn document_preambles_follow_global_preamble() {
        let dir = TempDir::new().expect("temp dir");
        let requests = dir.path().join("requests.log");
        let node = echo_server(dir.path(), &requests);

        let settings = format!(
            "[katex]\nbackend = \"katex\"\nnodejs_binary = '{}'\npreamble = 'G'\nstartup_timeout = 5.0\nrender_timeout = 5.0\n",
            node.display()
        );
        let renderer = Renderer::from_settings(&settings).unwrap();
        assert_eq!(renderer.backend().kind(), BackendKind::Katex);

        let mut local = LocalPreambles::new();
        {
            let mut doc = local.scope("A");
            doc.push("B");
            renderer.render_display("x", &doc).unwrap();
        }
        renderer.render_inline("y", &local).unwrap();
        renderer.render_latex("z", None).unwrap();

        assert_eq!(
            sent_preambles(&requests),
            vec![
                serde_json::json!("G\nA\nB"),
                serde_json::json!("G"),
                serde_json::json!("G"),
            ]
        );
    }

    #[test]
    fn missing_runtime_surfaces_spawn_error() {
        let renderer = Renderer::from_settings(
            "[katex]\nbackend = \"katex\"\nnodejs_binary = '/nonexistent/node'\n",
        )
        .unwrap();

        let err = renderer.render_latex("x", None).unwrap_err();
        assert!(matches!(err, Error::Katex(KatexError::Spawn { .. })));
    }
}
