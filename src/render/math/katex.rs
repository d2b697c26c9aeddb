//! KaTeX renderer backed by an external render server.
//!
//! The server is a JavaScript program started with the configured runtime
//! (`node` by default). It speaks line-delimited JSON on stdin/stdout: it
//! announces itself with `{"ready": true}`, then answers every
//! `{"latex", "preamble", "options"}` request with either `{"html": ...}` or
//! `{"error": {"type", "message"}}`. Without a configured runner script the
//! bundled `assets/katex-server.js` is passed to the runtime with `-e`, so
//! `katex` is resolved from the working directory.
//!
//! The server is started on the first render and reused afterwards. A server
//! that times out or dies is killed and replaced on the next call. Requests
//! are written by a dedicated thread so that a server which stops reading
//! its input still hits the render timeout.

use super::{merge_options, LatexRenderer};
use crate::config::{Options, RenderConfig};
use crate::error::{KatexError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const BUNDLED_SERVER: &str = include_str!("../../../assets/katex-server.js");

/// How long to wait for stderr to drain after the server went away.
const STDERR_GRACE: Duration = Duration::from_millis(200);

/// Upper bound on the stderr kept for error messages.
const STDERR_LIMIT: usize = 4096;

/// Renderer that delegates to a KaTeX render server.
#[derive(Debug)]
pub struct KatexRenderer {
    node_binary: String,
    script: Option<PathBuf>,
    startup_timeout: Duration,
    render_timeout: Duration,
    default_options: Options,
    server: Mutex<Option<Server>>,
}

impl KatexRenderer {
    /// Create a renderer from the KaTeX settings in `config`.
    ///
    /// No process is started until the first render.
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            node_binary: config.node_binary.clone(),
            script: config.katex_path.clone(),
            startup_timeout: config.startup_timeout,
            render_timeout: config.render_timeout,
            default_options: config.default_options.clone(),
            server: Mutex::new(None),
        }
    }

    /// Stop the render server if one is running.
    pub fn shutdown(&self) {
        if self.server.lock().take().is_some() {
            debug!(
                target = "pelican_katex::katex",
                op = "katex::shutdown",
                "KaTeX render server stopped"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.server.lock().is_some()
    }

    fn start(&self) -> std::result::Result<Server, KatexError> {
        let started_at = Instant::now();

        let mut command = Command::new(&self.node_binary);
        match &self.script {
            Some(script) => command.arg(script),
            None => command.arg("-e").arg(BUNDLED_SERVER),
        };

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                warn!(
                    target = "pelican_katex::katex",
                    op = "katex::start",
                    result = "error",
                    program = %self.node_binary,
                    error = %source,
                    "Failed to spawn KaTeX render server"
                );
                KatexError::Spawn {
                    program: self.node_binary.clone(),
                    source,
                }
            })?;

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
            kill(&mut child);
            return Err(KatexError::Protocol(
                "render server pipes were not captured".to_string(),
            ));
        };

        let threads = spawn_stdin_writer(stdin).and_then(|(stdin, written)| {
            let stdout = spawn_stdout_reader(stdout)?;
            let stderr = spawn_stderr_reader(stderr)?;
            Ok((stdin, written, stdout, stderr))
        });
        let (stdin, written, stdout, stderr) = match threads {
            Ok(threads) => threads,
            Err(err) => {
                kill(&mut child);
                return Err(err.into());
            }
        };

        let mut server = Server {
            child,
            stdin,
            written,
            stdout,
            stderr,
        };

        match server.stdout.recv_timeout(self.startup_timeout) {
            Ok(Ok(line)) if is_ready(&line) => {
                info!(
                    target = "pelican_katex::katex",
                    op = "katex::start",
                    result = "ready",
                    program = %self.node_binary,
                    pid = server.child.id(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "KaTeX render server started"
                );
                Ok(server)
            }
            Ok(Ok(line)) => Err(KatexError::Protocol(format!(
                "expected ready message, got {line:?}"
            ))),
            Ok(Err(err)) => Err(err.into()),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target = "pelican_katex::katex",
                    op = "katex::start",
                    result = "timeout",
                    program = %self.node_binary,
                    timeout_ms = self.startup_timeout.as_millis() as u64,
                    "KaTeX render server did not become ready"
                );
                Err(KatexError::StartupTimeout(self.startup_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(server.exited()),
        }
    }
}

impl LatexRenderer for KatexRenderer {
    fn render(
        &self,
        latex: &str,
        options: Option<&Options>,
        preamble: Option<&str>,
    ) -> Result<String> {
        let options = merge_options(&self.default_options, options);
        let request = Request {
            latex,
            preamble,
            options: &options,
        };

        let mut slot = self.server.lock();
        let mut server = match slot.take() {
            Some(server) => server,
            None => self.start()?,
        };

        let started_at = Instant::now();
        match server.request(&request, self.render_timeout) {
            Ok(html) => {
                debug!(
                    target = "pelican_katex::katex",
                    op = "katex::render",
                    result = "ok",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    html_bytes = html.len(),
                    "Rendered LaTeX with KaTeX"
                );
                *slot = Some(server);
                Ok(html)
            }
            Err(err @ KatexError::Katex { .. }) => {
                *slot = Some(server);
                Err(err.into())
            }
            Err(err) => {
                warn!(
                    target = "pelican_katex::katex",
                    op = "katex::render",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "KaTeX render server failed; it will be restarted on the next call"
                );
                drop(server);
                Err(err.into())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    latex: &'a str,
    preamble: Option<&'a str>,
    options: &'a Options,
}

#[derive(Debug, Deserialize)]
struct Ready {
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct Response {
    html: Option<String>,
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(rename = "type", default = "default_error_kind")]
    kind: String,
    message: String,
}

fn default_error_kind() -> String {
    "Error".to_string()
}

fn is_ready(line: &str) -> bool {
    serde_json::from_str::<Ready>(line)
        .map(|ready| ready.ready)
        .unwrap_or(false)
}

fn parse_response(line: &str) -> std::result::Result<String, KatexError> {
    let response: Response = serde_json::from_str(line)
        .map_err(|err| KatexError::Protocol(format!("{err}: {line:?}")))?;

    match response {
        Response {
            error: Some(error), ..
        } => Err(KatexError::Katex {
            kind: error.kind,
            message: error.message,
        }),
        Response {
            html: Some(html), ..
        } => Ok(html),
        Response { .. } => Err(KatexError::Protocol(format!(
            "response has neither html nor error: {line:?}"
        ))),
    }
}

/// A running render server.
#[derive(Debug)]
struct Server {
    child: Child,
    /// Request lines for the writer thread.
    stdin: Sender<String>,
    /// Outcome of each write, in request order.
    written: Receiver<io::Result<()>>,
    stdout: Receiver<io::Result<String>>,
    stderr: Receiver<String>,
}

impl Server {
    /// Send one request and wait for its response.
    ///
    /// `timeout` covers both writing the request and reading the response.
    fn request(
        &mut self,
        request: &Request<'_>,
        timeout: Duration,
    ) -> std::result::Result<String, KatexError> {
        let deadline = Instant::now() + timeout;

        let mut line = serde_json::to_string(request)
            .map_err(|err| KatexError::Protocol(err.to_string()))?;
        line.push('\n');

        if self.stdin.send(line).is_err() {
            return Err(self.exited());
        }

        match self.written.recv_timeout(timeout) {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                return Err(self.exited())
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(RecvTimeoutError::Timeout) => return Err(KatexError::RenderTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err(self.exited()),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.stdout.recv_timeout(remaining) {
            Ok(Ok(line)) => parse_response(&line),
            Ok(Err(err)) => Err(err.into()),
            Err(RecvTimeoutError::Timeout) => Err(KatexError::RenderTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(self.exited()),
        }
    }

    /// Describe a server that closed its stdout.
    fn exited(&mut self) -> KatexError {
        let stderr = self.stderr.recv_timeout(STDERR_GRACE).unwrap_or_default();
        let status = match self.child.try_wait() {
            Ok(Some(status)) => status.to_string(),
            _ => "closed its output".to_string(),
        };

        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            status
        } else {
            format!("{status}: {stderr}")
        };

        warn!(
            target = "pelican_katex::katex",
            op = "katex::exited",
            reason = %message,
            "KaTeX render server exited"
        );
        KatexError::Exited(message)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        kill(&mut self.child);
    }
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!(
            target = "pelican_katex::katex",
            op = "katex::kill",
            pid = child.id(),
            error = %err,
            "Failed to kill KaTeX render server"
        );
    }
    // Reap the process so it does not linger as a zombie.
    let _ = child.wait();
}

/// Write request lines to the server on a thread of their own.
///
/// Killing the server unblocks a pending write with a broken pipe.
fn spawn_stdin_writer(
    mut stdin: ChildStdin,
) -> io::Result<(Sender<String>, Receiver<io::Result<()>>)> {
    let (line_tx, line_rx) = mpsc::channel::<String>();
    let (written_tx, written_rx) = mpsc::channel();
    thread::Builder::new()
        .name("katex-stdin".to_string())
        .spawn(move || {
            for line in line_rx {
                let written = stdin
                    .write_all(line.as_bytes())
                    .and_then(|()| stdin.flush());
                let failed = written.is_err();
                if written_tx.send(written).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok((line_tx, written_rx))
}

fn spawn_stdout_reader(stdout: ChildStdout) -> io::Result<Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("katex-stdout".to_string())
        .spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn spawn_stderr_reader(stderr: ChildStderr) -> io::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("katex-stderr".to_string())
        .spawn(move || {
            let mut collected = String::new();
            for line in BufReader::new(stderr).lines().map_while(|line| line.ok()) {
                debug!(
                    target = "pelican_katex::katex",
                    op = "katex::stderr",
                    line = %line,
                    "KaTeX render server stderr"
                );
                if collected.len() < STDERR_LIMIT {
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            let _ = tx.send(collected);
        })?;
    Ok(rx)
}
