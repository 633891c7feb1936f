//! # Acquisition Harness
//!
//! Forensic acquisition from Android devices reachable only through an
//! `adb` shell: no recursive listing, no remote stat or hash, and output
//! formats that differ by vendor.
//!
//! The harness discovers files by walking the device one `ls` at a time,
//! pulls and hashes them into a manifest, reads messages, contacts and call
//! logs through content providers with vendor fallbacks, parses those dumps
//! into records and packs everything into a single evidence container.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │ Transport │──▶│ Discovery  │──▶│  Extract   │──▶│ Archive  │
//! │   (adb)   │   │ (ls walk)  │   │ pull+hash  │   │ MOBIN001 │
//! └─────┬─────┘   └────────────┘   └────────────┘   └──────────┘
//!       │         ┌────────────┐   ┌────────────┐
//!       └────────▶│   Query    │──▶│   Parse    │
//!                 │ (fallback) │   │ strategies │
//!                 └────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! acq devices                          # list attached devices
//! acq discover /sdcard                 # walk the storage tree
//! acq query sms --parse --json         # read and parse messages
//! acq acquire --dest out --archive out.bin
//! acq archive verify out.bin
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`transport`] | `adb` invocation with timeouts |
//! | [`device`] | Device properties, packages, screenshots |
//! | [`query`] | Content-provider fallback engine |
//! | [`discovery`] | Remote filesystem walk |
//! | [`hashing`] | MD5 / SHA-1 / SHA-256 digests |
//! | [`extract`] | Pull files and build manifests |
//! | [`acquire`] | Full-device acquisition |
//! | [`manifest`] | Manifest document and JSON I/O |
//! | [`archive`] | Evidence container writer and reader |
//! | [`parse`] | Multi-strategy record parsers |
//! | [`progress`] | Progress reporting |

pub mod acquire;
pub mod archive;
pub mod config;
pub mod device;
pub mod discovery;
pub mod extract;
pub mod hashing;
pub mod manifest;
pub mod models;
pub mod parse;
pub mod progress;
pub mod query;
pub mod transport;
