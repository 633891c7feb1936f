//! Single-file evidence container.
//!
//! Layout, with no separators anywhere:
//!
//! ```text
//! MAGIC (8 bytes) | manifest length (u64 LE) | manifest JSON | payload...
//! ```
//!
//! The payload is the raw bytes of every entry whose local path was a
//! regular file at write time, in manifest order. There is no per-entry
//! framing: a reader recovers boundaries from the recorded `size` of each
//! entry, which is only sound while the files are unchanged since the
//! manifest was built. [`ArchiveReader::verify`] detects when that is not
//! the case.
//!
//! A failed [`serialize`] leaves the output file in whatever state it had
//! reached.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::discovery::normalize_path;
use crate::extract::local_path_for;
use crate::manifest::{Manifest, ManifestDocument};
use crate::models::ManifestEntry;

pub const MAGIC: &[u8; 8] = b"MOBIN001";

const BUF_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub enum ArchiveError {
    Io(io::Error),
    Json(serde_json::Error),
    BadMagic,
    /// The container ended before the named section was complete.
    Truncated(String),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "archive I/O failed: {}", e),
            ArchiveError::Json(e) => write!(f, "archive manifest is not valid JSON: {}", e),
            ArchiveError::BadMagic => write!(f, "not an evidence archive (bad magic)"),
            ArchiveError::Truncated(what) => write!(f, "archive truncated in {}", what),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io(e) => Some(e),
            ArchiveError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ArchiveError {
    fn from(e: io::Error) -> Self {
        ArchiveError::Io(e)
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        ArchiveError::Json(e)
    }
}

/// Write `manifest` and the bytes of its files to `output`.
pub fn serialize(manifest: &Manifest, output: &Path) -> Result<PathBuf, ArchiveError> {
    let document = manifest.to_json_bytes()?;
    let mut out = BufWriter::with_capacity(BUF_BYTES, File::create(output)?);

    out.write_all(MAGIC)?;
    out.write_all(&(document.len() as u64).to_le_bytes())?;
    out.write_all(&document)?;

    let mut streamed = 0usize;
    for entry in manifest.entries() {
        let local = Path::new(&entry.local_path);
        if !local.is_file() {
            continue;
        }
        let mut file = File::open(local)?;
        io::copy(&mut file, &mut out)?;
        streamed += 1;
    }
    out.flush()?;

    tracing::info!(
        output = %output.display(),
        entries = manifest.len(),
        streamed,
        "archive written"
    );
    Ok(output.to_path_buf())
}

/// Outcome of [`ArchiveReader::verify`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Payload slices whose SHA-256 matched the manifest.
    pub matched: usize,
    /// Remote paths whose slice did not match.
    pub mismatched: Vec<String>,
    /// Entries recorded without digests (never retrieved).
    pub unhashed: usize,
    /// Bytes left over after the last recorded slice.
    pub trailing_bytes: u64,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.mismatched.is_empty() && self.trailing_bytes == 0
    }
}

/// Sequential reader over an archive written by [`serialize`].
pub struct ArchiveReader<R: Read> {
    reader: R,
    generated: String,
    manifest: Manifest,
}

impl ArchiveReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::new(BufReader::with_capacity(BUF_BYTES, file))
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Consume the header and manifest, leaving `reader` at the payload.
    pub fn new(mut reader: R) -> Result<Self, ArchiveError> {
        let mut magic = [0u8; 8];
        read_section(&mut reader, &mut magic, "magic").map_err(|e| match e {
            ArchiveError::Truncated(_) => ArchiveError::BadMagic,
            other => other,
        })?;
        if &magic != MAGIC {
            return Err(ArchiveError::BadMagic);
        }

        let mut len = [0u8; 8];
        read_section(&mut reader, &mut len, "manifest length")?;
        let len = u64::from_le_bytes(len);

        let mut json = Vec::new();
        (&mut reader).take(len).read_to_end(&mut json)?;
        if (json.len() as u64) < len {
            return Err(ArchiveError::Truncated("manifest".into()));
        }
        let document: ManifestDocument = serde_json::from_slice(&json)?;

        Ok(Self {
            reader,
            generated: document.generated,
            manifest: Manifest::from(document.entries),
        })
    }

    pub fn generated(&self) -> &str {
        &self.generated
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Walk the payload, handing each entry and its slice to `visit`.
    ///
    /// Returns the number of bytes left after the last slice.
    pub fn for_each_payload<F>(mut self, mut visit: F) -> Result<u64, ArchiveError>
    where
        F: FnMut(&ManifestEntry, &mut dyn Read) -> Result<(), ArchiveError>,
    {
        for entry in self.manifest.entries() {
            let mut slice = (&mut self.reader).take(entry.size);
            visit(entry, &mut slice)?;
            io::copy(&mut slice, &mut io::sink())?;
            if slice.limit() > 0 {
                return Err(ArchiveError::Truncated(format!(
                    "payload of {}",
                    entry.remote_path
                )));
            }
        }
        Ok(io::copy(&mut self.reader, &mut io::sink())?)
    }

    /// Recompute the SHA-256 of every slice and compare with the manifest.
    pub fn verify(self) -> Result<VerifyReport, ArchiveError> {
        let mut report = VerifyReport::default();
        let trailing = self.for_each_payload(|entry, slice| {
            let Some(expected) = entry.hashes.sha256.as_deref() else {
                report.unhashed += 1;
                return Ok(());
            };
            let mut hasher = Sha256::new();
            io::copy(slice, &mut hasher)?;
            if hex::encode(hasher.finalize()) == expected {
                report.matched += 1;
            } else {
                report.mismatched.push(entry.remote_path.clone());
            }
            Ok(())
        })?;
        report.trailing_bytes = trailing;
        Ok(report)
    }

    /// Write each retrieved payload under `dir`, mirroring its remote path.
    ///
    /// Returns the number of files written. Later duplicates overwrite
    /// earlier ones.
    pub fn unpack(self, dir: &Path) -> Result<usize, ArchiveError> {
        let mut written = 0usize;
        self.for_each_payload(|entry, slice| {
            if entry.hashes.is_empty() {
                return Ok(());
            }
            // `..` in a crafted manifest must not escape `dir`.
            let target = local_path_for(&normalize_path(&entry.remote_path), dir);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(slice, &mut out)?;
            written += 1;
            Ok(())
        })?;
        Ok(written)
    }
}

fn read_section<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<(), ArchiveError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveError::Truncated(what.to_string())
        } else {
            ArchiveError::Io(e)
        }
    })
}
