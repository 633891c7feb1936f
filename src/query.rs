//! Content-provider query fallback engine.
//!
//! Vendors expose messages, contacts and call logs under different URIs
//! and column names. [`query_with_fallback`] walks a URI × projection grid
//! (URIs outer, projections inner) and returns the first combination whose
//! output does not look like an error.
//!
//! The success test is a substring heuristic over [`FAILURE_MARKERS`]. It is
//! approximate on purpose: a message body that happens to contain "denied"
//! makes that attempt count as a failure.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::device::detect_profile;
use crate::models::{QueryAttempt, QueryResult};
use crate::transport::Transport;

/// Lowercased substrings that mark an output as a failed query.
pub const FAILURE_MARKERS: &[&str] = &[
    "error",
    "exception",
    "denied",
    "failed",
    "unknown",
    "no such",
    "unable",
    "cannot",
    "not found",
];

/// The three structured data sources pulled from content providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum RecordKind {
    Sms,
    Contacts,
    Calls,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Sms, RecordKind::Contacts, RecordKind::Calls];

    /// Human label used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Sms => "SMS",
            RecordKind::Contacts => "Contacts",
            RecordKind::Calls => "Call Logs",
        }
    }

    /// File name prefix for dumps.
    pub fn file_prefix(self) -> &'static str {
        match self {
            RecordKind::Sms => "sms",
            RecordKind::Contacts => "contacts",
            RecordKind::Calls => "calls",
        }
    }

    /// `remote_path` marker used for dump entries in a manifest.
    pub fn dump_marker(self) -> &'static str {
        match self {
            RecordKind::Sms => "sms-dump",
            RecordKind::Contacts => "contacts-dump",
            RecordKind::Calls => "calls-dump",
        }
    }
}

/// Ordered candidate URIs and projections for one logical query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariants {
    pub uris: Vec<String>,
    /// An empty string means "no projection" (all columns).
    pub projections: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl QueryVariants {
    pub fn new(uris: Vec<String>, projections: Vec<String>) -> Self {
        Self { uris, projections }
    }

    /// Wide table used for saved dumps.
    pub fn dump(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Sms => Self::new(
                owned(&[
                    "content://sms/",
                    "content://sms/inbox",
                    "content://sms/sent",
                    "content://mms-sms/conversations",
                    "content://sms/conversations",
                ]),
                owned(&[
                    "address:date:body:type",
                    "address:date:body",
                    "address:date_sent:body:type",
                    "_id:address:date:body:type:read",
                    "",
                ]),
            ),
            RecordKind::Contacts => Self::new(
                owned(&[
                    "content://com.android.contacts/data/phones",
                    "content://contacts/phones/",
                    "content://com.android.contacts/contacts",
                    "content://com.android.contacts/raw_contacts",
                    "content://com.android.contacts/data",
                ]),
                owned(&[
                    "display_name:data1",
                    "display_name:number",
                    "display_name_alt:data1",
                    "contact_id:display_name:data1",
                    "",
                ]),
            ),
            RecordKind::Calls => Self::new(
                owned(&[
                    "content://call_log/calls",
                    "content://call_log/calls/",
                    "content://logs/calls",
                ]),
                owned(&[
                    "name:number:duration:date:type",
                    "name:number:duration:date",
                    "cached_name:number:duration:date:type",
                    "_id:name:number:duration:date:type",
                    "",
                ]),
            ),
        }
    }

    /// Narrow table used for interactive queries and the full acquisition.
    pub fn live(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Sms => Self::new(
                owned(&["content://sms/", "content://sms/inbox", "content://sms/sent"]),
                owned(&["address:date:body:type", "address:date:body", ""]),
            ),
            RecordKind::Contacts => Self::new(
                owned(&[
                    "content://com.android.contacts/data/phones",
                    "content://contacts/phones/",
                    "content://com.android.contacts/data",
                ]),
                owned(&["display_name:data1", "display_name:number", ""]),
            ),
            RecordKind::Calls => Self::new(
                owned(&["content://call_log/calls"]),
                owned(&["name:number:duration:date:type", "name:number:duration:date", ""]),
            ),
        }
    }

    /// Every combination in the order they are tried.
    pub fn attempts(&self) -> impl Iterator<Item = QueryAttempt> + '_ {
        self.uris.iter().flat_map(move |uri| {
            self.projections.iter().map(move |projection| QueryAttempt {
                uri: uri.clone(),
                projection: projection.clone(),
            })
        })
    }
}

/// True when `output` is empty or contains any [`FAILURE_MARKERS`] entry,
/// compared case-insensitively.
pub fn is_failure_output(output: &str) -> bool {
    if output.is_empty() {
        return true;
    }
    let lower = output.to_lowercase();
    FAILURE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Issue `content query` for each combination until one succeeds.
pub fn query_with_fallback(
    transport: &dyn Transport,
    variants: &QueryVariants,
    label: &str,
) -> QueryResult {
    for attempt in variants.attempts() {
        let mut command = vec!["content", "query", "--uri", attempt.uri.as_str()];
        if !attempt.projection.is_empty() {
            command.extend(["--projection", attempt.projection.as_str()]);
        }

        let output = match transport.shell(&command) {
            Ok(out) => out,
            // A transport error is a failed attempt, whatever its diagnostic text.
            Err(e) => {
                tracing::debug!(label, uri = %attempt.uri, error = %e, "query attempt failed");
                continue;
            }
        };

        if is_failure_output(&output) {
            tracing::debug!(label, uri = %attempt.uri, projection = %attempt.projection, "query attempt rejected");
            continue;
        }

        tracing::info!(label, uri = %attempt.uri, projection = %attempt.projection, "query succeeded");
        return QueryResult {
            success: true,
            raw_text: output,
            uri_used: Some(attempt.uri),
            projection_used: Some(attempt.projection),
        };
    }

    tracing::warn!(label, "all query attempts failed");
    QueryResult {
        success: false,
        raw_text: format!("All {} query attempts failed.", label),
        uri_used: None,
        projection_used: None,
    }
}

fn or_none(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("None")
}

/// Run a live query and return a compact `#` header followed by the raw text.
pub fn query_live(transport: &dyn Transport, variants: &QueryVariants, kind: RecordKind) -> String {
    let profile = detect_profile(transport);
    let result = query_with_fallback(transport, variants, kind.label());

    let mut text = format!("# Device: {} {}\n", profile.manufacturer, profile.model);
    text.push_str(&format!(
        "# URI: {}\n# Projection: {}\n# Success: {}\n\n",
        or_none(&result.uri_used),
        or_none(&result.projection_used),
        result.success
    ));
    text.push_str(&result.raw_text);
    text
}

/// Run the dump table for `kind` and save it under `dest` with a metadata header.
///
/// Returns the written path together with the query outcome.
pub fn dump_to_file(
    transport: &dyn Transport,
    kind: RecordKind,
    dest: &Path,
) -> Result<(PathBuf, QueryResult)> {
    let profile = detect_profile(transport);
    let result = query_with_fallback(transport, &QueryVariants::dump(kind), kind.label());

    let now = Local::now();
    let path = dest.join(format!(
        "{}_{}.txt",
        kind.file_prefix(),
        now.format("%Y-%m-%d_%H-%M-%S")
    ));

    let mut text = String::new();
    text.push_str(&format!("# Device: {} {}\n", profile.manufacturer, profile.model));
    text.push_str(&format!("# SDK: {}\n", profile.sdk));
    text.push_str(&format!("# URI used: {}\n", or_none(&result.uri_used)));
    text.push_str(&format!("# Projection: {}\n", or_none(&result.projection_used)));
    text.push_str(&format!("# Timestamp: {}\n", now.format("%Y-%m-%d %H:%M:%S")));
    text.push_str(&format!("# Success: {}\n\n", result.success));
    text.push_str(&result.raw_text);

    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create dump directory: {}", dest.display()))?;
    std::fs::write(&path, text)
        .with_context(|| format!("Failed to save {} dump: {}", kind.label(), path.display()))?;

    Ok((path, result))
}
