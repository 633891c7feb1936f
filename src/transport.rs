//! Shell transport to the device.
//!
//! Every remote interaction goes through [`Transport`]: one external
//! process per call, bounded by a timeout, with output decoded as UTF-8
//! and falling back to Latin-1 so decoding itself never fails.
//!
//! Failures are values, not panics or propagated errors. [`Transport::exec`]
//! returns a typed [`TransportError`]; [`Transport::run`] flattens that into
//! the diagnostic string callers print or record in a manifest.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::config::AdbConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Minimum wait for output still in flight once the command has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

fn spawn_reader<R: Read + Send + 'static>(
    mut src: R,
    tx: Sender<Chunk>,
    wrap: fn(Vec<u8>) -> Chunk,
) {
    std::thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match src.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(wrap(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
}

/// Why a remote command produced no output of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    NotFound,
    Spawn(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "adb command timed out."),
            TransportError::NotFound => write!(f, "adb not found."),
            TransportError::Spawn(e) => write!(f, "adb error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

/// A one-command-at-a-time channel to the device.
///
/// Implementors only need [`exec`](Transport::exec) and the two timeouts;
/// the remaining methods build the command shapes the device-side tooling
/// expects.
pub trait Transport: Send + Sync {
    /// Run one command (arguments after the adb binary and serial) and
    /// return stdout if non-empty, else stderr.
    fn exec(&self, args: &[&str], timeout: Duration) -> Result<String, TransportError>;

    /// Timeout for listings, probes, queries and property reads.
    fn timeout(&self) -> Duration;

    /// Longer timeout used for file pulls.
    fn pull_timeout(&self) -> Duration;

    /// Like [`exec`](Transport::exec), with errors rendered as their diagnostic.
    fn run(&self, args: &[&str], timeout: Duration) -> String {
        self.exec(args, timeout).unwrap_or_else(|e| e.to_string())
    }

    /// `adb shell <command...>` with the default timeout.
    fn shell(&self, command: &[&str]) -> Result<String, TransportError> {
        let mut args = Vec::with_capacity(command.len() + 1);
        args.push("shell");
        args.extend_from_slice(command);
        self.exec(&args, self.timeout())
    }

    /// `adb pull <remote> <local>` with the pull timeout.
    fn pull(&self, remote: &str, local: &Path) -> Result<String, TransportError> {
        let local = local.to_string_lossy();
        self.exec(&["pull", remote, local.as_ref()], self.pull_timeout())
    }

    /// `adb shell getprop <key>`, trimmed; empty on failure.
    fn getprop(&self, key: &str) -> String {
        self.shell(&["getprop", key])
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

/// Transport backed by the local `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbTransport {
    program: String,
    serial: Option<String>,
    timeout: Duration,
    pull_timeout: Duration,
}

impl AdbTransport {
    pub fn new(program: impl Into<String>) -> Self {
        let defaults = AdbConfig::default();
        Self {
            program: program.into(),
            serial: None,
            timeout: defaults.timeout(),
            pull_timeout: defaults.pull_timeout(),
        }
    }

    pub fn from_config(config: &AdbConfig) -> Self {
        Self {
            program: config.path.clone(),
            serial: config.serial.clone(),
            timeout: config.timeout(),
            pull_timeout: config.pull_timeout(),
        }
    }

    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_timeouts(mut self, timeout: Duration, pull_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.pull_timeout = pull_timeout;
        self
    }
}

impl Transport for AdbTransport {
    fn exec(&self, args: &[&str], timeout: Duration) -> Result<String, TransportError> {
        let mut cmd = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.args(args);
        tracing::debug!(program = %self.program, ?args, ?timeout, "exec");
        run_with_timeout(cmd, timeout)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn pull_timeout(&self) -> Duration {
        self.pull_timeout
    }
}

/// Spawn `cmd`, wait up to `timeout`, and return stdout if non-empty else stderr.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<String, TransportError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TransportError::NotFound,
        _ => TransportError::Spawn(e.to_string()),
    })?;

    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| TransportError::Spawn("stdout not captured".to_string()))?;
    let child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| TransportError::Spawn("stderr not captured".to_string()))?;

    let (tx, rx) = mpsc::channel();
    spawn_reader(child_stdout, tx.clone(), Chunk::Stdout);
    spawn_reader(child_stderr, tx, Chunk::Stderr);

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_status)) => break,
            Ok(None) if Instant::now() >= deadline => {
                child.kill().ok();
                child.wait().ok();
                return Err(TransportError::Timeout);
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(TransportError::Spawn(e.to_string())),
        }
    }

    // A process forked by the command can keep the pipes open after it
    // exits; stop collecting at the deadline and keep what arrived.
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let drain_until = deadline.max(Instant::now() + DRAIN_GRACE);
    loop {
        let now = Instant::now();
        if now >= drain_until {
            tracing::debug!("output pipes still open at deadline");
            break;
        }
        match rx.recv_timeout(drain_until - now) {
            Ok(Chunk::Stdout(bytes)) => stdout.extend_from_slice(&bytes),
            Ok(Chunk::Stderr(bytes)) => stderr.extend_from_slice(&bytes),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("output pipes still open at deadline");
                break;
            }
        }
    }

    let out = decode_output(&stdout);
    if !out.is_empty() {
        return Ok(out);
    }
    Ok(decode_output(&stderr))
}

/// Quote `word` as one argument for the device shell.
///
/// `adb shell` joins its arguments with spaces and hands the line to the
/// device's `sh`, so any path passed through it must be quoted.
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Escape the characters `sh` still interprets inside double quotes.
pub fn escape_double_quoted(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Decode as UTF-8, falling back to Latin-1. The result is trimmed.
pub fn decode_output(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim().to_string(),
        Err(_) => bytes
            .iter()
            .map(|&b| b as char)
            .collect::<String>()
            .trim()
            .to_string(),
    }
}
