//! Full-device acquisition.
//!
//! Runs every source in sequence and merges the results into one manifest:
//! the configured public folders, the three content-provider dumps, a brute
//! discovery pass over the storage root and, when enabled, a scan of what
//! ended up on local disk. A failing source is logged and skipped; it never
//! stops the sources after it.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::extract::{
    entry_for_local, extract, pull_folder_children, scan_local_tree, ExtractOptions,
};
use crate::manifest::Manifest;
use crate::models::ManifestEntry;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::query::{query_live, RecordKind};
use crate::transport::Transport;

/// `transport_result` recorded for query dump entries.
pub const CONTENT_PROVIDER_MARKER: &str = "content-provider";

/// Subdirectory of the destination that receives the brute pass.
pub const BRUTE_SUBDIR: &str = "sdcard";

/// Acquire everything reachable into `dest` and return the merged manifest.
pub fn acquire(
    transport: &dyn Transport,
    config: &Config,
    dest: &Path,
    progress: &dyn ProgressReporter,
) -> Result<Manifest> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create destination: {}", dest.display()))?;
    let options = ExtractOptions::from_config(config)?;
    let mut manifest = Manifest::new();

    for folder in &config.extraction.public_folders {
        progress.report(ProgressEvent::Discovering {
            root: folder.clone(),
        });
        let pulled = pull_folder_children(transport, folder, dest, &options);
        tracing::info!(folder = %folder, files = pulled.len(), "public folder done");
        manifest.append(pulled);
    }

    for kind in RecordKind::ALL {
        progress.report(ProgressEvent::Querying {
            label: kind.label().to_string(),
        });
        match dump_live(transport, config, kind, dest, options.hash_chunk_bytes) {
            Ok(entry) => manifest.push(entry),
            Err(e) => tracing::warn!(kind = kind.label(), error = %e, "dump skipped"),
        }
    }

    let brute_root = dest.join(BRUTE_SUBDIR);
    match extract(
        transport,
        &config.discovery.root,
        &brute_root,
        &options,
        progress,
    ) {
        Ok(brute) => manifest.append(brute),
        Err(e) => tracing::warn!(root = %config.discovery.root, error = %e, "brute pass skipped"),
    }

    if config.extraction.rescan_local {
        match scan_local_tree(dest, options.hash_chunk_bytes) {
            Ok(local) => manifest.append(local),
            Err(e) => tracing::warn!(error = %e, "local scan skipped"),
        }
    }

    tracing::info!(
        entries = manifest.len(),
        retrieved = manifest.retrieved_count(),
        bytes = manifest.total_bytes(),
        "acquisition finished"
    );
    Ok(manifest)
}

/// Write the live query output for `kind` under `dest` and describe it as a
/// manifest entry.
pub fn dump_live(
    transport: &dyn Transport,
    config: &Config,
    kind: RecordKind,
    dest: &Path,
    chunk_bytes: usize,
) -> Result<ManifestEntry> {
    let text = query_live(transport, &config.queries.live_variants(kind), kind);
    let path: PathBuf = dest.join(format!(
        "{}_{}.txt",
        kind.file_prefix(),
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    ));
    std::fs::write(&path, text)
        .with_context(|| format!("Failed to write {} dump: {}", kind.label(), path.display()))?;

    Ok(entry_for_local(
        kind.dump_marker(),
        &path,
        CONTENT_PROVIDER_MARKER.to_string(),
        chunk_bytes,
    ))
}
