#![allow(dead_code)]

use acquisition_harness::discovery::normalize_path;
use acquisition_harness::transport::{Transport, TransportError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory device answering the handful of commands the harness issues.
#[derive(Default)]
pub struct FakeDevice {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    /// Extra names printed by `ls` for a directory (".", "..", loops).
    extra_listing: HashMap<String, Vec<String>>,
    /// Listed but not pullable.
    broken: HashSet<String>,
    providers: HashMap<(String, String), String>,
    props: HashMap<String, String>,
    pub log: Mutex<Vec<String>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let mut d = Self::default();
        d.dirs.insert("/".to_string());
        d.props.insert("ro.product.manufacturer".into(), "Google".into());
        d.props.insert("ro.product.model".into(), "Pixel 7".into());
        d.props.insert("ro.product.brand".into(), "google".into());
        d.props.insert("ro.build.version.sdk".into(), "34".into());
        d
    }

    pub fn dir(mut self, path: &str) -> Self {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
        self
    }

    pub fn file(self, path: &str, bytes: &[u8]) -> Self {
        let parent = path.rsplit_once('/').map(|(p, _)| p).unwrap_or("/");
        let mut d = self.dir(parent);
        d.files.insert(path.to_string(), bytes.to_vec());
        d
    }

    /// A file that shows up in listings but fails to pull.
    pub fn broken_file(mut self, path: &str) -> Self {
        self = self.file(path, b"");
        self.broken.insert(path.to_string());
        self
    }

    pub fn list_extra(mut self, dir: &str, names: &[&str]) -> Self {
        self.extra_listing
            .entry(dir.to_string())
            .or_default()
            .extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Make `dir` print "." and ".." like a full `ls -a`.
    pub fn with_self_entries(self, dir: &str) -> Self {
        self.list_extra(dir, &[".", ".."])
    }

    pub fn provider(mut self, uri: &str, projection: &str, output: &str) -> Self {
        self.providers
            .insert((uri.to_string(), projection.to_string()), output.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn children(&self, dir: &str) -> Vec<String> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        let mut names: BTreeSet<String> = BTreeSet::new();
        for p in self.dirs.iter().chain(self.files.keys()) {
            if let Some(rest) = p.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    names.insert(rest.to_string());
                }
            }
        }
        let mut out: Vec<String> = names.into_iter().collect();
        if let Some(extra) = self.extra_listing.get(dir) {
            out.extend(extra.iter().cloned());
        }
        out
    }

    fn ls(&self, path: &str) -> String {
        let path = normalize_path(path);
        if !self.dirs.contains(&path) {
            return format!("ls: {}: No such file or directory", path);
        }
        self.children(&path).join("\n")
    }

    fn probe(&self, script: &str) -> String {
        let quoted = script
            .strip_prefix("[ -d \"")
            .and_then(|rest| rest.split_once("\" ] &&"))
            .map(|(path, _)| path)
            .unwrap_or("");
        if self.dirs.contains(&normalize_path(&unescape_double_quoted(quoted))) {
            "DIR".into()
        } else {
            "FILE".into()
        }
    }

    fn pull(&self, remote: &str, local: &str) -> String {
        let remote = normalize_path(remote);
        let local = Path::new(local);
        if self.broken.contains(&remote) {
            return format!(
                "adb: error: failed to copy '{}' to '{}': Permission denied",
                remote,
                local.display()
            );
        }
        if let Some(bytes) = self.files.get(&remote) {
            std::fs::write(local, bytes).unwrap();
            return format!("{}: 1 file pulled.", remote);
        }
        if self.dirs.contains(&remote) {
            let prefix = format!("{}/", remote);
            let mut n = 0;
            for (path, bytes) in &self.files {
                if let Some(rel) = path.strip_prefix(&prefix) {
                    if self.broken.contains(path) {
                        continue;
                    }
                    let target = local.join(rel);
                    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
                    std::fs::write(target, bytes).unwrap();
                    n += 1;
                }
            }
            std::fs::create_dir_all(local).unwrap();
            return format!("{}/: {} files pulled.", remote, n);
        }
        format!(
            "adb: error: failed to stat remote object '{}': No such file or directory",
            remote
        )
    }

    fn content_query(&self, args: &[&str]) -> String {
        // --uri <uri> [--projection <projection>]
        let uri = args.get(1).copied().unwrap_or("");
        let projection = match args.get(2) {
            Some(&"--projection") => args.get(3).copied().unwrap_or(""),
            _ => "",
        };
        self.providers
            .get(&(uri.to_string(), projection.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("Error while accessing provider:{}", uri))
    }
}

impl Transport for FakeDevice {
    fn exec(&self, args: &[&str], _timeout: Duration) -> Result<String, TransportError> {
        self.log.lock().unwrap().push(args.join(" "));
        let out = match args {
            ["shell", "ls", "-1", word] => self.ls(&unquote_single(word)),
            ["shell", "getprop", key] => self.props.get(*key).cloned().unwrap_or_default(),
            ["shell", "content", "query", rest @ ..] => self.content_query(rest),
            ["shell", script] if script.starts_with("[ -d ") => self.probe(script),
            ["pull", remote, local] => self.pull(remote, local),
            _ => String::new(),
        };
        Ok(out)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn pull_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Undo `shell_quote`: `'a'\''b'` becomes `a'b`.
fn unquote_single(word: &str) -> String {
    word.strip_prefix('\'')
        .and_then(|w| w.strip_suffix('\''))
        .unwrap_or(word)
        .replace(r"'\''", "'")
}

fn unescape_double_quoted(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A device with a small but representative `/sdcard`.
pub fn sample_device() -> FakeDevice {
    FakeDevice::new()
        .file("/sdcard/DCIM/Camera/IMG_0001.jpg", b"jpeg-bytes-1")
        .file("/sdcard/DCIM/Camera/IMG_0002.jpg", b"jpeg-bytes-22")
        .file("/sdcard/Download/report.pdf", b"%PDF-1.4 fake")
        .file("/sdcard/.hidden/.nomedia", b"")
        .file("/sdcard/notes.txt", b"remember the milk")
        .dir("/sdcard/Music")
}
