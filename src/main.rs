//! # Acquisition Harness CLI (`acq`)
//!
//! The `acq` binary drives acquisitions from an attached Android device
//! and works with the manifests, archives and dumps they produce.
//!
//! ## Usage
//!
//! ```bash
//! acq --config ./config/acq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `acq devices` | List attached devices |
//! | `acq info` / `battery` | Build properties / battery state |
//! | `acq grant` | Grant the shell read access to SMS, contacts, call log |
//! | `acq packages` | List third-party packages |
//! | `acq app analyze\|apk <pkg>` | Permission report / pull the base APK |
//! | `acq screenshot` | Capture and pull a screenshot |
//! | `acq copy whatsapp\|screenshots\|camera` | Pull the first folder that exists |
//! | `acq pull <remote>` | Pull one path |
//! | `acq query <kind>` | Live content-provider query, optionally parsed |
//! | `acq dump <kind>` | Save a full dump with a metadata header |
//! | `acq discover [root]` | Walk the remote tree |
//! | `acq extract <remote>` | Discover, pull and hash into a manifest |
//! | `acq acquire` | Full acquisition, optionally archived |
//! | `acq archive create\|verify\|unpack` | Evidence container tools |
//! | `acq parse <kind> <file>` | Parse a saved dump |
//! | `acq manifest show <file>` | Print a manifest as a table |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use acquisition_harness::acquire::acquire;
use acquisition_harness::archive::{serialize, ArchiveReader};
use acquisition_harness::config::{self, Config};
use acquisition_harness::device::{self, WellKnownFolder};
use acquisition_harness::discovery::discover_with_limit;
use acquisition_harness::extract::{extract, ExtractOptions};
use acquisition_harness::manifest::{Manifest, TABLE_HEADERS};
use acquisition_harness::models::ParsedRecord;
use acquisition_harness::parse;
use acquisition_harness::progress::{ProgressEvent, ProgressMode, ProgressReporter};
use acquisition_harness::query::{dump_to_file, query_live, query_with_fallback, RecordKind};
use acquisition_harness::transport::AdbTransport;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Forensic acquisition from Android devices over adb.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Defaults are used when the file does not exist.
#[derive(Parser)]
#[command(
    name = "acq",
    about = "Forensic acquisition from Android devices over adb",
    version,
    long_about = "Walks the device storage through a plain adb shell, pulls and hashes \
    every file into a manifest, reads messages, contacts and call logs through content \
    providers with vendor fallbacks, and packs the results into one evidence container."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/acq.toml")]
    config: PathBuf,

    /// Device serial; overrides `[adb].serial`.
    #[arg(long, short = 's', global = true)]
    serial: Option<String>,

    /// Progress output on stderr. Defaults to human on a TTY, otherwise off.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached devices (`adb devices -l`).
    Devices,

    /// Show model, manufacturer, Android version and patch level.
    Info,

    /// Show battery state.
    Battery,

    /// Grant the shell user read access to SMS, contacts and call log.
    Grant,

    /// List third-party packages.
    Packages,

    /// Inspect an installed application.
    App {
        #[command(subcommand)]
        action: AppAction,
    },

    /// Capture a screenshot and pull it.
    Screenshot {
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Pull the first candidate location of a well-known folder.
    Copy {
        #[arg(value_enum)]
        folder: WellKnownFolder,
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Pull a single remote path.
    Pull {
        remote: String,
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Run a live content-provider query.
    ///
    /// Prints the raw provider output behind a short header, or the parsed
    /// records with `--parse`.
    Query {
        #[arg(value_enum)]
        kind: RecordKind,
        /// Parse the output into records.
        #[arg(long)]
        parse: bool,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Save a full content-provider dump to a timestamped file.
    Dump {
        #[arg(value_enum)]
        kind: RecordKind,
        #[arg(long)]
        dest: PathBuf,
    },

    /// Walk the remote tree one directory at a time.
    Discover {
        /// Remote root; defaults to `[discovery].root`.
        root: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Discover everything under a remote path, pull and hash it.
    Extract {
        remote: String,
        #[arg(long)]
        dest: PathBuf,
        /// Manifest output; defaults to `<dest>/manifest.json`.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Full acquisition: public folders, content providers, brute pass.
    Acquire {
        #[arg(long)]
        dest: PathBuf,
        /// Manifest output; defaults to `<dest>/manifest.json`.
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Also write an evidence container.
        #[arg(long)]
        archive: Option<PathBuf>,
    },

    /// Evidence container tools.
    Archive {
        #[command(subcommand)]
        action: ArchiveAction,
    },

    /// Parse a saved dump file.
    Parse {
        #[arg(value_enum)]
        kind: RecordKind,
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Manifest tools.
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Subcommand)]
enum AppAction {
    /// Permissions requested by a package.
    Analyze { package: String },
    /// Pull the base APK of a package.
    Apk {
        package: String,
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },
}

#[derive(Subcommand)]
enum ArchiveAction {
    /// Pack a manifest and its files into a container.
    Create { manifest: PathBuf, output: PathBuf },
    /// Re-hash every payload and compare with the manifest.
    Verify { archive: PathBuf },
    /// Extract payloads, mirroring their remote paths.
    Unpack {
        archive: PathBuf,
        #[arg(long)]
        dest: PathBuf,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Print a manifest as a table.
    Show {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = config::load_or_default(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();
    let mut transport = AdbTransport::from_config(&cfg.adb);
    if cli.serial.is_some() {
        transport = transport.with_serial(cli.serial.clone());
    }

    match cli.command {
        Commands::Devices => println!("{}", device::list_devices(&transport)),
        Commands::Info => println!("{}", device::device_info(&transport)),
        Commands::Battery => println!("{}", device::battery_info(&transport)),
        Commands::Grant => println!("{}", device::grant_permissions(&transport)),
        Commands::Packages => println!("{}", device::list_packages(&transport)),
        Commands::App { action } => match action {
            AppAction::Analyze { package } => {
                println!("{}", device::analyze_app(&transport, &package).report());
            }
            AppAction::Apk { package, dest } => {
                println!("{}", device::pull_apk(&transport, &package, &dest));
            }
        },
        Commands::Screenshot { dest } => println!("{}", device::screenshot(&transport, &dest)),
        Commands::Copy { folder, dest } => {
            println!("{}", device::copy_first_available(&transport, folder, &dest));
        }
        Commands::Pull { remote, dest } => {
            println!("{}", device::pull_item(&transport, &remote, &dest));
        }
        Commands::Query {
            kind,
            parse: parsed,
            json,
        } => {
            progress.report(ProgressEvent::Querying {
                label: kind.label().to_string(),
            });
            let variants = cfg.queries.live_variants(kind);
            if parsed {
                let text = query_live(&transport, &variants, kind);
                print_records(&parse::parse(kind, &text), json)?;
            } else if json {
                let result = query_with_fallback(&transport, &variants, kind.label());
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", query_live(&transport, &variants, kind));
            }
        }
        Commands::Dump { kind, dest } => {
            progress.report(ProgressEvent::Querying {
                label: kind.label().to_string(),
            });
            let (path, result) = dump_to_file(&transport, kind, &dest)?;
            if result.success {
                println!("{} saved -> {}", kind.label(), path.display());
            } else {
                println!(
                    "{} dump saved with errors -> {}",
                    kind.label(),
                    path.display()
                );
            }
        }
        Commands::Discover { root, json } => {
            let root = root.unwrap_or_else(|| cfg.discovery.root.clone());
            progress.report(ProgressEvent::Discovering { root: root.clone() });
            let found = discover_with_limit(&transport, &root, cfg.discovery.max_depth);
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                for p in &found {
                    println!("{} {}", if p.is_dir { "d" } else { "f" }, p.path);
                }
                eprintln!("{} entries", found.len());
            }
        }
        Commands::Extract {
            remote,
            dest,
            manifest,
        } => {
            let options = ExtractOptions::from_config(&cfg)?;
            let result = extract(&transport, &remote, &dest, &options, progress.as_ref())?;
            let out = manifest.unwrap_or_else(|| dest.join("manifest.json"));
            result.save_json(&out)?;
            print_summary(&result, &out);
        }
        Commands::Acquire {
            dest,
            manifest,
            archive,
        } => {
            run_acquire(&transport, &cfg, &dest, manifest, archive, progress.as_ref())?;
        }
        Commands::Archive { action } => run_archive(action, progress.as_ref())?,
        Commands::Parse { kind, file, json } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read dump: {}", file.display()))?;
            let text = String::from_utf8_lossy(&bytes);
            print_records(&parse::parse(kind, &text), json)?;
        }
        Commands::Manifest { action } => match action {
            ManifestAction::Show { file, json } => {
                let manifest = Manifest::load_json(&file)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&manifest.to_document())?);
                } else {
                    print_table(&manifest);
                }
            }
        },
    }

    Ok(())
}

fn run_acquire(
    transport: &AdbTransport,
    cfg: &Config,
    dest: &Path,
    manifest_out: Option<PathBuf>,
    archive_out: Option<PathBuf>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let manifest = acquire(transport, cfg, dest, progress)?;
    let out = manifest_out.unwrap_or_else(|| dest.join("manifest.json"));
    manifest.save_json(&out)?;
    print_summary(&manifest, &out);

    if let Some(bin) = archive_out {
        progress.report(ProgressEvent::Archiving {
            path: bin.display().to_string(),
        });
        let written = serialize(&manifest, &bin)
            .with_context(|| format!("BIN creation failed: {}", bin.display()))?;
        println!("BIN created -> {}", written.display());
    }
    Ok(())
}

fn run_archive(action: ArchiveAction, progress: &dyn ProgressReporter) -> Result<()> {
    match action {
        ArchiveAction::Create { manifest, output } => {
            let manifest = Manifest::load_json(&manifest)?;
            progress.report(ProgressEvent::Archiving {
                path: output.display().to_string(),
            });
            let written = serialize(&manifest, &output)
                .with_context(|| format!("BIN creation failed: {}", output.display()))?;
            println!("BIN created -> {}", written.display());
        }
        ArchiveAction::Verify { archive } => {
            let reader = ArchiveReader::open(&archive)
                .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
            println!("generated: {}", reader.generated());
            println!("entries:   {}", reader.manifest().len());
            let report = reader.verify()?;
            println!("matched:   {}", report.matched);
            println!("unhashed:  {}", report.unhashed);
            for remote in &report.mismatched {
                println!("MISMATCH   {}", remote);
            }
            if report.trailing_bytes > 0 {
                println!("trailing:  {} bytes", report.trailing_bytes);
            }
            if !report.is_ok() {
                anyhow::bail!("archive verification failed");
            }
            println!("OK");
        }
        ArchiveAction::Unpack { archive, dest } => {
            let reader = ArchiveReader::open(&archive)
                .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
            let n = reader.unpack(&dest)?;
            println!("Unpacked {} files -> {}", n, dest.display());
        }
    }
    Ok(())
}

fn print_records(records: &[ParsedRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No records parsed.");
        return Ok(());
    }
    for record in records {
        match record {
            ParsedRecord::Sms(r) => println!("{}\t{}\t{}", r.date, r.address, r.body),
            ParsedRecord::Contact(r) => println!("{}\t{}", r.name, r.number),
            ParsedRecord::Call(r) => println!(
                "{}\t{}\t{}\t{}s",
                r.date, r.name, r.number, r.duration_seconds
            ),
        }
    }
    eprintln!("{} records", records.len());
    Ok(())
}

fn print_summary(manifest: &Manifest, out: &Path) {
    println!(
        "{} entries, {} retrieved, {} bytes",
        manifest.len(),
        manifest.retrieved_count(),
        manifest.total_bytes()
    );
    println!("Manifest -> {}", out.display());
}

fn print_table(manifest: &Manifest) {
    println!("{}", TABLE_HEADERS.join("\t"));
    for row in manifest.table_rows() {
        println!("{}", row.join("\t"));
    }
}
