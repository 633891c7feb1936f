//! Single-pass content digests for pulled files.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::models::FileHashes;

/// Read size used when streaming a file through the hashers.
pub const DEFAULT_CHUNK_BYTES: usize = 4 * 1024 * 1024;

/// MD5, SHA-1 and SHA-256 of the file at `path`, read once in `chunk_bytes` pieces.
///
/// Any I/O failure yields all-`None` digests.
pub fn compute_hashes(path: &Path, chunk_bytes: usize) -> FileHashes {
    match try_compute(path, chunk_bytes.max(1)) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "hashing failed");
            FileHashes::default()
        }
    }
}

fn try_compute(path: &Path, chunk_bytes: usize) -> std::io::Result<FileHashes> {
    let mut file = File::open(path)?;
    let mut md5 = Md5::new();
    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut buf = vec![0u8; chunk_bytes];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        sha1.update(&buf[..n]);
        sha256.update(&buf[..n]);
    }

    Ok(FileHashes {
        md5: Some(hex::encode(md5.finalize())),
        sha1: Some(hex::encode(sha1.finalize())),
        sha256: Some(hex::encode(sha256.finalize())),
    })
}

/// Hex SHA-256 of an in-memory buffer.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
