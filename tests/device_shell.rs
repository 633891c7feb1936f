//! Discovery and folder pulls against a fake `adb` that, like the real
//! one, joins the shell arguments and hands the line to `sh -c`.
#![cfg(unix)]

use acquisition_harness::discovery::discover;
use acquisition_harness::extract::{pull_folder_children, ExtractOptions};
use acquisition_harness::transport::AdbTransport;
use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SHELL_ADB: &str = r#"#!/bin/sh
if [ "$1" = "-s" ]; then shift 2; fi
case "$1" in
  shell) shift; exec sh -c "$*" ;;
  pull) cp -R "$2" "$3" && echo "$2: 1 file pulled." ;;
esac
"#;

/// Names the device shell would split or expand if passed unquoted.
const AWKWARD_DIRS: &[&str] = &["WhatsApp Images", "$HOME", "it's", "a\"b", "`echo x`"];

fn setup() -> (TempDir, AdbTransport, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let adb = tmp.path().join("adb");
    fs::write(&adb, SHELL_ADB).unwrap();
    fs::set_permissions(&adb, fs::Permissions::from_mode(0o755)).unwrap();

    let root = tmp.path().join("device/sdcard");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("top.txt"), b"top").unwrap();
    for dir in AWKWARD_DIRS {
        fs::create_dir_all(root.join(dir)).unwrap();
        fs::write(root.join(dir).join("inner.jpg"), dir.as_bytes()).unwrap();
    }

    let transport = AdbTransport::new(adb.to_string_lossy().to_string());
    (tmp, transport, root)
}

fn remote(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn discovery_descends_into_names_the_shell_would_mangle() {
    let (_tmp, transport, root) = setup();
    let found = discover(&transport, &remote(&root));

    let files: HashSet<String> = found
        .iter()
        .filter(|p| !p.is_dir)
        .map(|p| p.path.clone())
        .collect();
    let mut expected: HashSet<String> = AWKWARD_DIRS
        .iter()
        .map(|d| remote(&root.join(d).join("inner.jpg")))
        .collect();
    expected.insert(remote(&root.join("top.txt")));
    assert_eq!(files, expected);

    for dir in AWKWARD_DIRS {
        let path = remote(&root.join(dir));
        assert!(
            found.iter().any(|p| p.path == path && p.is_dir),
            "{} not recorded as a directory",
            path
        );
    }
}

#[test]
fn folder_with_space_is_pulled_per_child() {
    let (tmp, transport, root) = setup();
    let out = tmp.path().join("out");
    let folder = remote(&root.join("WhatsApp Images"));

    let manifest = pull_folder_children(&transport, &folder, &out, &ExtractOptions::default());
    assert_eq!(manifest.len(), 1);
    let entry = &manifest.entries()[0];
    assert_eq!(entry.remote_path, format!("{}/inner.jpg", folder));
    assert_eq!(entry.size, "WhatsApp Images".len() as u64);
    assert!(!entry.hashes.is_empty());
}
