//! Remote filesystem discovery over a flat-listing shell.
//!
//! The device shell offers no recursive listing and no stat, only
//! `ls -1 <dir>` and a `[ -d ]` test. [`discover`] walks the tree with an
//! explicit stack: one listing per directory plus one directory probe per
//! child, so cost is O(files + directories) round trips.
//!
//! Hidden entries and oddly printed names get no special treatment; they
//! are probed and traversed like anything else. Paths are normalised and
//! the visited set is keyed on the normalised path. Entries that resolve
//! outside the root are dropped, and `max_depth` bounds loops whose path
//! grows on every lap (a symlink to an ancestor).

use std::collections::HashSet;

use crate::models::DiscoveredPath;
use crate::transport::{escape_double_quoted, shell_quote, Transport};

/// Default bound on directory depth below the discovery root.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Direct children of `path` as printed by `ls -1`.
///
/// A missing or unreadable directory, or a transport failure, yields an
/// empty list.
pub fn list_directory(transport: &dyn Transport, path: &str) -> Vec<String> {
    let quoted = shell_quote(path);
    let out = match transport.shell(&["ls", "-1", quoted.as_str()]) {
        Ok(out) => out,
        Err(e) => {
            tracing::debug!(path, error = %e, "listing failed");
            return Vec::new();
        }
    };
    if out.is_empty() || out.contains("No such") || out.to_lowercase().contains("denied") {
        return Vec::new();
    }
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `[ -d "<path>" ] && echo DIR || echo FILE`, run on the device with
/// `path` escaped for the double quotes.
pub fn is_directory(transport: &dyn Transport, path: &str) -> bool {
    let probe = format!(
        "[ -d \"{}\" ] && echo DIR || echo FILE",
        escape_double_quoted(path)
    );
    match transport.shell(&[probe.as_str()]) {
        Ok(out) => out.contains("DIR"),
        Err(e) => {
            tracing::debug!(path, error = %e, "directory probe failed");
            false
        }
    }
}

/// Collapse repeated separators, `.` and `..`, and drop any trailing slash.
///
/// `..` at the top stays at `/`.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Join a listing entry onto its parent directory.
pub fn join_remote(parent: &str, name: &str) -> String {
    normalize_path(&format!("{}/{}", parent, name))
}

fn is_within(path: &str, root: &str) -> bool {
    root == "/" || path == root || path.starts_with(&format!("{}/", root))
}

/// Discover every reachable path under `root` with the default depth bound.
pub fn discover(transport: &dyn Transport, root: &str) -> Vec<DiscoveredPath> {
    discover_with_limit(transport, root, DEFAULT_MAX_DEPTH)
}

/// Discover every reachable path under `root`, listing directories at most
/// `max_depth` levels below it.
///
/// Each directory is listed at most once and each path is emitted at most
/// once. The root itself is not emitted.
pub fn discover_with_limit(
    transport: &dyn Transport,
    root: &str,
    max_depth: usize,
) -> Vec<DiscoveredPath> {
    let root = normalize_path(root);
    let mut stack: Vec<(String, usize)> = vec![(root.clone(), 0)];
    let mut visited: HashSet<String> = HashSet::new();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut discovered = Vec::new();

    while let Some((current, depth)) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }

        let entries = list_directory(transport, &current);
        if entries.is_empty() {
            continue;
        }

        for name in entries {
            let full = join_remote(&current, &name);
            if full == root || !is_within(&full, &root) || visited.contains(&full) {
                continue;
            }
            if !emitted.insert(full.clone()) {
                continue;
            }

            if is_directory(transport, &full) {
                discovered.push(DiscoveredPath {
                    path: full.clone(),
                    is_dir: true,
                });
                if depth < max_depth {
                    stack.push((full, depth + 1));
                } else {
                    tracing::warn!(path = %full, max_depth, "depth limit reached, not descending");
                }
            } else {
                discovered.push(DiscoveredPath {
                    path: full,
                    is_dir: false,
                });
            }
        }
    }

    tracing::info!(
        root = %root,
        directories_listed = visited.len(),
        paths = discovered.len(),
        "discovery finished"
    );
    discovered
}
