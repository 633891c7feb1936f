use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::query::{QueryVariants, RecordKind};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub adb: AdbConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub queries: QueriesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdbConfig {
    #[serde(default = "default_adb_path")]
    pub path: String,
    /// Device serial, passed as `-s <serial>` when more than one device is attached.
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            path: default_adb_path(),
            serial: None,
            timeout_secs: default_timeout_secs(),
            pull_timeout_secs: default_pull_timeout_secs(),
        }
    }
}

impl AdbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }
}

fn default_adb_path() -> String {
    "adb".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_pull_timeout_secs() -> u64 {
    240
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_root() -> String {
    "/sdcard".to_string()
}
fn default_max_depth() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_public_folders")]
    pub public_folders: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_hash_chunk_bytes")]
    pub hash_chunk_bytes: usize,
    /// Append a local-scan pass over the destination after the device passes.
    #[serde(default)]
    pub rescan_local: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            public_folders: default_public_folders(),
            exclude_globs: Vec::new(),
            hash_chunk_bytes: default_hash_chunk_bytes(),
            rescan_local: false,
        }
    }
}

fn default_public_folders() -> Vec<String> {
    [
        "/sdcard/DCIM",
        "/sdcard/Pictures",
        "/sdcard/Movies",
        "/sdcard/Music",
        "/sdcard/Download",
        "/sdcard/Documents",
        "/sdcard/WhatsApp",
        "/sdcard/Android/media",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hash_chunk_bytes() -> usize {
    crate::hashing::DEFAULT_CHUNK_BYTES
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QueriesConfig {
    pub sms: Option<QueryOverride>,
    pub contacts: Option<QueryOverride>,
    pub calls: Option<QueryOverride>,
}

/// Per-kind replacement for the built-in live variant tables.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryOverride {
    pub uris: Vec<String>,
    #[serde(default = "default_projections")]
    pub projections: Vec<String>,
}

fn default_projections() -> Vec<String> {
    vec![String::new()]
}

impl QueriesConfig {
    /// Variants used for live queries and the full acquisition.
    pub fn live_variants(&self, kind: RecordKind) -> QueryVariants {
        let over = match kind {
            RecordKind::Sms => self.sms.as_ref(),
            RecordKind::Contacts => self.contacts.as_ref(),
            RecordKind::Calls => self.calls.as_ref(),
        };
        match over {
            Some(o) => QueryVariants::new(o.uris.clone(), o.projections.clone()),
            None => QueryVariants::live(kind),
        }
    }
}

impl Config {
    /// Defaults only, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Load the config file if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.adb.path.trim().is_empty() {
        anyhow::bail!("adb.path must not be empty");
    }
    if config.adb.timeout_secs == 0 || config.adb.pull_timeout_secs == 0 {
        anyhow::bail!("adb.timeout_secs and adb.pull_timeout_secs must be > 0");
    }

    if config.discovery.max_depth == 0 {
        anyhow::bail!("discovery.max_depth must be > 0");
    }
    if !config.discovery.root.starts_with('/') {
        anyhow::bail!(
            "discovery.root must be an absolute device path, got '{}'",
            config.discovery.root
        );
    }

    if config.extraction.hash_chunk_bytes == 0 {
        anyhow::bail!("extraction.hash_chunk_bytes must be > 0");
    }

    for (name, over) in [
        ("sms", &config.queries.sms),
        ("contacts", &config.queries.contacts),
        ("calls", &config.queries.calls),
    ] {
        if let Some(o) = over {
            if o.uris.is_empty() || o.projections.is_empty() {
                anyhow::bail!(
                    "queries.{}: uris and projections must each list at least one entry",
                    name
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_example_config_loads() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/config/acq.example.toml"));
        let cfg = load_config(path).unwrap();
        assert_eq!(cfg.discovery.root, "/sdcard");
        assert_eq!(cfg.extraction.public_folders.len(), 8);
        assert!(!cfg.extraction.rescan_local);
        assert!(cfg.extraction.exclude_globs.is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.adb.path, "adb");
        assert_eq!(cfg.adb.timeout_secs, 60);
        assert_eq!(cfg.adb.pull_timeout_secs, 240);
        assert_eq!(cfg.discovery.root, "/sdcard");
        assert_eq!(cfg.extraction.public_folders.len(), 8);
        assert!(!cfg.extraction.rescan_local);
        assert!(cfg.extraction.exclude_globs.is_empty());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse("[adb]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_relative_root_rejected() {
        assert!(parse("[discovery]\nroot = \"sdcard\"\n").is_err());
    }

    #[test]
    fn test_query_override_replaces_live_table() {
        let cfg = parse(
            r#"
[queries.sms]
uris = ["content://sms/inbox"]
projections = ["address:date:body"]
"#,
        )
        .unwrap();
        let v = cfg.queries.live_variants(RecordKind::Sms);
        assert_eq!(v.uris, vec!["content://sms/inbox".to_string()]);
        assert_eq!(v.projections, vec!["address:date:body".to_string()]);

        // Untouched kinds keep the built-in table.
        let calls = cfg.queries.live_variants(RecordKind::Calls);
        assert_eq!(calls, QueryVariants::live(RecordKind::Calls));
    }

    #[test]
    fn test_empty_override_rejected() {
        assert!(parse("[queries.calls]\nuris = []\n").is_err());
    }
}
