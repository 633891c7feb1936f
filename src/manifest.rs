//! Extraction manifest: the ordered record of every file an acquisition
//! touched.
//!
//! Insertion order is pull order. Entries are never de-duplicated; a brute
//! scan after a targeted pull may record the same remote path twice and
//! consumers are expected to cope.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::ManifestEntry;

/// Timestamp format used for `generated` and dump headers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

/// On-disk form: `{"generated": "...", "entries": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub generated: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    /// Append another manifest's entries in order, keeping duplicates.
    pub fn append(&mut self, other: Manifest) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose pull produced a local file with digests.
    pub fn retrieved_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.hashes.is_empty()).count()
    }

    /// Sum of recorded sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Wrap the entries with a generation timestamp taken now.
    pub fn to_document(&self) -> ManifestDocument {
        ManifestDocument {
            generated: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            entries: self.entries.clone(),
        }
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.to_document())
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = self.to_json_bytes()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
        Ok(())
    }

    /// Load either the wrapped document form or a bare entry array.
    pub fn load_json(path: &Path) -> Result<Manifest> {
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::from_json_slice(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Manifest> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Document(ManifestDocument),
            Bare(Vec<ManifestEntry>),
        }
        let entries = match serde_json::from_slice::<Shape>(bytes)? {
            Shape::Document(d) => d.entries,
            Shape::Bare(v) => v,
        };
        Ok(Manifest { entries })
    }

    /// Rows of (remote, local, size, md5, sha1, sha256) for display.
    pub fn table_rows(&self) -> Vec<[String; 6]> {
        self.entries
            .iter()
            .map(|e| {
                [
                    e.remote_path.clone(),
                    e.local_path.clone(),
                    e.size.to_string(),
                    e.hashes.md5.clone().unwrap_or_default(),
                    e.hashes.sha1.clone().unwrap_or_default(),
                    e.hashes.sha256.clone().unwrap_or_default(),
                ]
            })
            .collect()
    }
}

impl From<Vec<ManifestEntry>> for Manifest {
    fn from(entries: Vec<ManifestEntry>) -> Self {
        Manifest { entries }
    }
}

impl IntoIterator for Manifest {
    type Item = ManifestEntry;
    type IntoIter = std::vec::IntoIter<ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub const TABLE_HEADERS: [&str; 6] = ["Remote Path", "Local Path", "Size", "MD5", "SHA1", "SHA256"];
