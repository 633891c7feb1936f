//! Pull discovered files to local storage and record them in a manifest.
//!
//! Every leaf gets exactly one [`ManifestEntry`], whether or not the pull
//! worked. After each pull the local filesystem, not the transport text,
//! decides size, mtime and whether digests can be computed; a file that
//! never arrived is recorded with null digests and the transport
//! diagnostic so "discovered but not retrieved" stays visible.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::config::Config;
use crate::discovery::{discover_with_limit, join_remote, list_directory, DEFAULT_MAX_DEPTH};
use crate::hashing::{compute_hashes, DEFAULT_CHUNK_BYTES};
use crate::manifest::Manifest;
use crate::models::{DiscoveredPath, FileHashes, ManifestEntry};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::transport::Transport;

/// Marker recorded for entries produced by [`scan_local_tree`].
pub const LOCAL_SCAN_MARKER: &str = "local-scan";

/// Knobs shared by the extraction passes.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub hash_chunk_bytes: usize,
    pub max_depth: usize,
    excludes: GlobSet,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            hash_chunk_bytes: DEFAULT_CHUNK_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
            excludes: GlobSet::empty(),
        }
    }
}

impl ExtractOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            hash_chunk_bytes: config.extraction.hash_chunk_bytes,
            max_depth: config.discovery.max_depth,
            excludes: build_globset(&config.extraction.exclude_globs)?,
        })
    }

    /// Skip pulling remote paths that match any of `patterns`.
    pub fn with_excludes(mut self, patterns: &[String]) -> Result<Self> {
        self.excludes = build_globset(patterns)?;
        Ok(self)
    }

    fn is_excluded(&self, remote: &str) -> bool {
        self.excludes.is_match(remote)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Mirror a remote absolute path under `local_root`.
pub fn local_path_for(remote: &str, local_root: &Path) -> PathBuf {
    local_root.join(remote.trim_start_matches('/'))
}

/// Build the entry for `local` as it exists right now.
///
/// Size and mtime are zero and digests null unless `local` is a regular file.
pub fn entry_for_local(
    remote: &str,
    local: &Path,
    transport_result: String,
    chunk_bytes: usize,
) -> ManifestEntry {
    let (size, mtime, hashes) = match std::fs::metadata(local) {
        Ok(meta) if meta.is_file() => {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            (meta.len(), mtime, compute_hashes(local, chunk_bytes))
        }
        _ => (0, 0.0, FileHashes::default()),
    };

    ManifestEntry {
        remote_path: remote.to_string(),
        local_path: local.to_string_lossy().into_owned(),
        size,
        mtime,
        hashes,
        transport_result,
    }
}

fn pull_one(
    transport: &dyn Transport,
    remote: &str,
    local: &Path,
    chunk_bytes: usize,
) -> ManifestEntry {
    if let Some(parent) = local.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(remote, local = %local.display(), error = %e, "cannot create local directory");
            return entry_for_local(remote, local, format!("local error: {}", e), chunk_bytes);
        }
    }

    let result = transport
        .pull(remote, local)
        .unwrap_or_else(|e| e.to_string());
    let entry = entry_for_local(remote, local, result, chunk_bytes);
    if !local.exists() {
        tracing::warn!(remote, diagnostic = %entry.transport_result, "pull incomplete");
    }
    entry
}

/// Discover everything under `remote_root` and pull each leaf into `local_root`.
pub fn extract(
    transport: &dyn Transport,
    remote_root: &str,
    local_root: &Path,
    options: &ExtractOptions,
    progress: &dyn ProgressReporter,
) -> Result<Manifest> {
    std::fs::create_dir_all(local_root)
        .with_context(|| format!("Failed to create destination: {}", local_root.display()))?;

    progress.report(ProgressEvent::Discovering {
        root: remote_root.to_string(),
    });
    let discovered = discover_with_limit(transport, remote_root, options.max_depth);

    Ok(extract_discovered(
        transport,
        remote_root,
        &discovered,
        local_root,
        options,
        progress,
    ))
}

/// Pull the leaves of an already computed discovery result.
///
/// Directory entries are skipped; order follows `discovered`.
pub fn extract_discovered(
    transport: &dyn Transport,
    label: &str,
    discovered: &[DiscoveredPath],
    local_root: &Path,
    options: &ExtractOptions,
    progress: &dyn ProgressReporter,
) -> Manifest {
    let leaves: Vec<&DiscoveredPath> = discovered
        .iter()
        .filter(|p| !p.is_dir && !options.is_excluded(&p.path))
        .collect();
    let total = leaves.len() as u64;
    let mut manifest = Manifest::new();

    for (i, leaf) in leaves.iter().enumerate() {
        let local = local_path_for(&leaf.path, local_root);
        manifest.push(pull_one(transport, &leaf.path, &local, options.hash_chunk_bytes));
        progress.report(ProgressEvent::Pulling {
            root: label.to_string(),
            n: i as u64 + 1,
            total,
        });
    }

    tracing::info!(
        root = label,
        files = manifest.len(),
        retrieved = manifest.retrieved_count(),
        "extraction finished"
    );
    manifest
}

/// Pull each direct child of `remote_folder` (one level, no discovery).
///
/// Children that arrive as directories are expanded into one entry per
/// file beneath them, sharing the child's transport result.
pub fn pull_folder_children(
    transport: &dyn Transport,
    remote_folder: &str,
    local_root: &Path,
    options: &ExtractOptions,
) -> Manifest {
    let mut manifest = Manifest::new();
    let children = list_directory(transport, remote_folder);
    if children.is_empty() {
        tracing::warn!(folder = remote_folder, "no files found or permission denied");
        return manifest;
    }

    for name in children {
        let remote = join_remote(remote_folder, &name);
        if options.is_excluded(&remote) {
            continue;
        }
        let local = local_path_for(&remote, local_root);
        let entry = pull_one(transport, &remote, &local, options.hash_chunk_bytes);

        if local.is_dir() {
            for file in walk_files(&local) {
                let rel = file.strip_prefix(&local).unwrap_or(&file);
                let nested_remote = join_remote(&remote, &rel.to_string_lossy());
                manifest.push(entry_for_local(
                    &nested_remote,
                    &file,
                    entry.transport_result.clone(),
                    options.hash_chunk_bytes,
                ));
            }
        } else {
            manifest.push(entry);
        }
    }
    manifest
}

fn walk_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(error = %err, "walk error");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Record every file already under `local_root` as if it had been pulled
/// from the matching remote path.
pub fn scan_local_tree(local_root: &Path, chunk_bytes: usize) -> Result<Manifest> {
    if !local_root.exists() {
        anyhow::bail!("Local root does not exist: {}", local_root.display());
    }

    let mut manifest = Manifest::new();
    for file in walk_files(local_root) {
        let rel = file.strip_prefix(local_root).unwrap_or(&file);
        let rel_str = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let remote = format!("/{}", rel_str);
        manifest.push(entry_for_local(
            &remote,
            &file,
            LOCAL_SCAN_MARKER.to_string(),
            chunk_bytes,
        ));
    }
    Ok(manifest)
}
