//! Drives the `acq` binary against a shell-script stand-in for `adb`.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const FAKE_ADB: &str = r##"#!/bin/sh
if [ "$1" = "-s" ]; then shift 2; fi
case "$1" in
  devices)
    echo "List of devices attached"
    echo "FAKE123        device product:cheetah model:Pixel_7"
    ;;
  pull)
    case "$2" in
      /sdcard/a.txt) printf 'alpha' > "$3"; echo "/sdcard/a.txt: 1 file pulled." ;;
      /sdcard/sub/b.txt) printf 'bravo' > "$3"; echo "/sdcard/sub/b.txt: 1 file pulled." ;;
      *) echo "adb: error: failed to stat remote object '$2': No such file or directory" >&2; exit 1 ;;
    esac
    ;;
  shell)
    shift
    case "$1" in
      getprop)
        case "$2" in
          ro.product.manufacturer) echo Google ;;
          ro.product.model) echo "Pixel 7" ;;
          ro.build.version.sdk) echo 34 ;;
        esac
        ;;
      ls)
        case "$3" in
          "'/sdcard'") printf 'a.txt\nsub\n' ;;
          "'/sdcard/sub'") printf 'b.txt\n' ;;
          *) echo "ls: $3: No such file or directory" ;;
        esac
        ;;
      content)
        if [ "$4" = "content://sms/" ]; then
          echo "Row: 0 address=+15551234567, date=1700000000000, body=Hello there"
          echo "Row: 1 address=+15559876543, date=1700000100000, body=See you soon"
        else
          echo "Error while accessing provider:$4"
        fi
        ;;
      *)
        case "$1" in
          *'"/sdcard"'*|*'"/sdcard/sub"'*) echo DIR ;;
          *) echo FILE ;;
        esac
        ;;
    esac
    ;;
esac
"##;

fn acq_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("acq");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let adb = root.join("fake-adb");
    fs::write(&adb, FAKE_ADB).unwrap();
    fs::set_permissions(&adb, fs::Permissions::from_mode(0o755)).unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[adb]
path = "{}"
timeout_secs = 10
pull_timeout_secs = 10

[discovery]
root = "/sdcard"

[extraction]
public_folders = ["/sdcard/sub"]
"#,
        adb.display()
    );
    let config_path = config_dir.join("acq.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_acq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = acq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run acq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_devices() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_acq(&config, &["devices"]);
    assert!(success, "devices failed: {}", stderr);
    assert!(stdout.contains("FAKE123"));
}

#[test]
fn test_discover_json() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_acq(&config, &["discover", "--json"]);
    assert!(success, "discover failed: {}", stderr);

    let found: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 3);
    assert!(found
        .iter()
        .any(|p| p["path"] == "/sdcard/sub" && p["is_dir"] == true));
    assert!(found.iter().any(|p| p["path"] == "/sdcard/sub/b.txt"));
}

#[test]
fn test_extract_archive_verify_unpack() {
    let (tmp, config) = setup_test_env();
    let dest = tmp.path().join("out");
    let dest_str = dest.to_str().unwrap();

    let (stdout, stderr, success) = run_acq(&config, &["extract", "/sdcard", "--dest", dest_str]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("2 entries, 2 retrieved, 10 bytes"), "{}", stdout);

    let manifest_path = dest.join("manifest.json");
    let doc: serde_json::Value =
        serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
    assert_eq!(doc["entries"].as_array().unwrap().len(), 2);
    assert_eq!(doc["entries"][0]["remote_path"], "/sdcard/a.txt");

    let bin = tmp.path().join("evidence.bin");
    let bin_str = bin.to_str().unwrap();
    let (stdout, stderr, success) = run_acq(
        &config,
        &["archive", "create", manifest_path.to_str().unwrap(), bin_str],
    );
    assert!(success, "archive create failed: {}", stderr);
    assert!(stdout.contains("BIN created"));

    let (stdout, stderr, success) = run_acq(&config, &["archive", "verify", bin_str]);
    assert!(success, "verify failed: {}", stderr);
    assert!(stdout.contains("matched:   2"));
    assert!(stdout.trim_end().ends_with("OK"));

    let unpacked = tmp.path().join("unpacked");
    let (_, stderr, success) = run_acq(
        &config,
        &["archive", "unpack", bin_str, "--dest", unpacked.to_str().unwrap()],
    );
    assert!(success, "unpack failed: {}", stderr);
    assert_eq!(fs::read_to_string(unpacked.join("sdcard/sub/b.txt")).unwrap(), "bravo");
}

#[test]
fn test_verify_rejects_non_archive() {
    let (tmp, config) = setup_test_env();
    let bogus = tmp.path().join("bogus.bin");
    fs::write(&bogus, b"definitely not an archive").unwrap();

    let (_, stderr, success) = run_acq(&config, &["archive", "verify", bogus.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("bad magic"), "{}", stderr);
}

#[test]
fn test_query_sms_parsed() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_acq(&config, &["query", "sms", "--parse", "--json"]);
    assert!(success, "query failed: {}", stderr);

    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["address"], "+15551234567");
    assert_eq!(records[1]["body"], "See you soon");
}

#[test]
fn test_query_exhausted_is_not_fatal() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_acq(&config, &["query", "calls"]);
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("# Success: false"));
    assert!(stdout.contains("All Call Logs query attempts failed."));
}

#[test]
fn test_acquire_writes_manifest_and_archive() {
    let (tmp, config) = setup_test_env();
    let dest = tmp.path().join("case");
    let bin = tmp.path().join("case.bin");

    let (stdout, stderr, success) = run_acq(
        &config,
        &[
            "acquire",
            "--dest",
            dest.to_str().unwrap(),
            "--archive",
            bin.to_str().unwrap(),
        ],
    );
    assert!(success, "acquire failed: {}", stderr);
    assert!(stdout.contains("BIN created"));
    assert!(bin.is_file());

    let doc: serde_json::Value =
        serde_json::from_slice(&fs::read(dest.join("manifest.json")).unwrap()).unwrap();
    let remotes: Vec<&str> = doc["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["remote_path"].as_str().unwrap())
        .collect();
    assert_eq!(remotes[0], "/sdcard/sub/b.txt");
    assert!(remotes.contains(&"sms-dump"));
    assert!(remotes.contains(&"/sdcard/a.txt"));

    let (stdout, _, success) = run_acq(&config, &["archive", "verify", bin.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.trim_end().ends_with("OK"));
}

#[test]
fn test_parse_saved_dump() {
    let (tmp, config) = setup_test_env();
    let dump = tmp.path().join("calls.txt");
    fs::write(
        &dump,
        "# Device: google pixel 7\n\nRow: 0 name=Alice, number=555, duration=30, date=1700000000000\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_acq(&config, &["parse", "calls", dump.to_str().unwrap()]);
    assert!(success, "parse failed: {}", stderr);
    assert!(stdout.contains("Alice\t555\t30s"));
}

#[test]
fn test_manifest_show_table() {
    let (tmp, config) = setup_test_env();
    let dest = tmp.path().join("out");
    let (_, _, success) = run_acq(&config, &["extract", "/sdcard", "--dest", dest.to_str().unwrap()]);
    assert!(success);

    let (stdout, stderr, success) = run_acq(
        &config,
        &["manifest", "show", dest.join("manifest.json").to_str().unwrap()],
    );
    assert!(success, "manifest show failed: {}", stderr);
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Remote Path\tLocal Path\tSize\tMD5\tSHA1\tSHA256"
    );
    assert!(lines.next().unwrap().starts_with("/sdcard/a.txt\t"));
}
