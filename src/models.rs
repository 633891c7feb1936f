//! Core data models used throughout Acquisition Harness.
//!
//! These types describe what flows between the layers: paths found on the
//! device, per-file manifest entries, content-provider query outcomes, and
//! the normalized records produced by the parsers.

use serde::{Deserialize, Serialize};

/// A path found on the device during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPath {
    /// Absolute remote path.
    pub path: String,
    pub is_dir: bool,
}

/// One URI × projection combination tried by the query engine.
///
/// An empty `projection` means "all columns" (no `--projection` flag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAttempt {
    pub uri: String,
    pub projection: String,
}

/// Outcome of one logical content-provider query.
///
/// `raw_text` is always populated: the provider output on success, and a
/// diagnostic when every combination failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub raw_text: String,
    pub uri_used: Option<String>,
    pub projection_used: Option<String>,
}

/// Content digests of a pulled file, hex encoded.
///
/// All three are `None` when the local file is absent or unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashes {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl FileHashes {
    pub fn is_empty(&self) -> bool {
        self.md5.is_none() && self.sha1.is_none() && self.sha256.is_none()
    }
}

/// Per-file record of one extraction step. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub remote_path: String,
    pub local_path: String,
    /// Byte count of the local file at the time the entry was built.
    pub size: u64,
    /// Local modification time, epoch seconds.
    pub mtime: f64,
    pub hashes: FileHashes,
    /// Transport diagnostic for pulls, or a literal marker such as
    /// `content-provider` / `local-scan`.
    pub transport_result: String,
}

/// A parsed SMS/MMS row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsRecord {
    pub address: String,
    pub date_epoch_ms: String,
    pub date: String,
    pub body: String,
}

/// A parsed contact row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub number: String,
}

/// A parsed call-log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub name: String,
    pub number: String,
    pub duration_seconds: String,
    pub date_epoch_ms: String,
    pub date: String,
}

/// Any record the parsers produce. Serializes as the plain field map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedRecord {
    Sms(SmsRecord),
    Call(CallRecord),
    Contact(ContactRecord),
}

impl From<SmsRecord> for ParsedRecord {
    fn from(r: SmsRecord) -> Self {
        ParsedRecord::Sms(r)
    }
}

impl From<ContactRecord> for ParsedRecord {
    fn from(r: ContactRecord) -> Self {
        ParsedRecord::Contact(r)
    }
}

impl From<CallRecord> for ParsedRecord {
    fn from(r: CallRecord) -> Self {
        ParsedRecord::Call(r)
    }
}
