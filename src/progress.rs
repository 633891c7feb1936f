//! Acquisition progress reporting.
//!
//! Long extractions issue thousands of remote calls, each bounded only by
//! its own timeout. Reporters let the user see which phase is running and
//! how many files are left. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Walking a remote tree. Total unknown.
    Discovering { root: String },
    /// Pulling and hashing: n files processed out of total.
    Pulling { root: String, n: u64, total: u64 },
    /// Running the content-provider fallback grid for one record kind.
    Querying { label: String },
    /// Writing the archive container.
    Archiving { path: String },
}

/// Receives progress events from the extraction pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "pull /sdcard  1,234 / 5,000 files".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Discovering { root } => format!("discover {}  scanning...\n", root),
            ProgressEvent::Pulling { root, n, total } => format!(
                "pull {}  {} / {} files\n",
                root,
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Querying { label } => format!("query {}  trying variants...\n", label),
            ProgressEvent::Archiving { path } => format!("archive {}  writing...\n", path),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            ProgressEvent::Pulling { root, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "pulling",
                "root": root,
                "n": n,
                "total": total
            }),
            ProgressEvent::Querying { label } => serde_json::json!({
                "event": "progress",
                "phase": "querying",
                "label": label
            }),
            ProgressEvent::Archiving { path } => serde_json::json!({
                "event": "progress",
                "phase": "archiving",
                "path": path
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
