//! Device-level helpers: property reads, vendor profile, package and
//! permission introspection, screenshots and well-known folder copies.
//!
//! Like the rest of the transport-facing code these helpers report
//! problems in their returned text instead of failing.

use chrono::Local;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use crate::transport::{shell_quote, Transport};

/// Manufacturer and build information used to label dumps.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeviceProfile {
    pub manufacturer: String,
    pub model: String,
    pub brand: String,
    pub sdk: u32,
    pub is_xiaomi: bool,
    pub is_samsung: bool,
    pub is_oneplus: bool,
    pub is_oppo: bool,
    pub is_motorola: bool,
    pub is_google: bool,
}

/// Read manufacturer, model, brand and SDK level and derive vendor flags.
pub fn detect_profile(transport: &dyn Transport) -> DeviceProfile {
    let manufacturer = transport.getprop("ro.product.manufacturer").to_lowercase();
    let model = transport.getprop("ro.product.model").to_lowercase();
    let brand = transport.getprop("ro.product.brand").to_lowercase();
    let sdk = transport
        .getprop("ro.build.version.sdk")
        .parse::<u32>()
        .unwrap_or(0);

    let either = |needle: &str| manufacturer.contains(needle) || brand.contains(needle);

    DeviceProfile {
        is_xiaomi: either("xiaomi") || model.contains("redmi"),
        is_samsung: either("samsung"),
        is_oneplus: either("oneplus"),
        is_oppo: either("oppo") || brand.contains("realme"),
        is_motorola: either("motorola"),
        is_google: either("google"),
        manufacturer,
        model,
        brand,
        sdk,
    }
}

const INFO_PROPS: &[(&str, &str)] = &[
    ("Model", "ro.product.model"),
    ("Manufacturer", "ro.product.manufacturer"),
    ("Brand", "ro.product.brand"),
    ("Chipset", "ro.product.board"),
    ("Android Version", "ro.build.version.release"),
    ("Security Patch", "ro.build.version.security_patch"),
    ("Build Date", "ro.build.date"),
    ("SDK", "ro.build.version.sdk"),
];

/// `Label: value` lines for the common build properties.
pub fn device_info(transport: &dyn Transport) -> String {
    INFO_PROPS
        .iter()
        .map(|(label, prop)| format!("{}: {}", label, transport.getprop(prop)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn list_devices(transport: &dyn Transport) -> String {
    transport.run(&["devices", "-l"], transport.timeout())
}

pub fn battery_info(transport: &dyn Transport) -> String {
    transport.run(&["shell", "dumpsys", "battery"], transport.timeout())
}

/// Third-party packages (`pm list packages -3`).
pub fn list_packages(transport: &dyn Transport) -> String {
    transport.run(&["shell", "pm", "list", "packages", "-3"], transport.timeout())
}

const SHELL_PACKAGE: &str = "com.android.shell";

const FORENSIC_PERMISSIONS: &[&str] = &[
    "android.permission.READ_CONTACTS",
    "android.permission.WRITE_CONTACTS",
    "android.permission.READ_SMS",
    "android.permission.READ_CALL_LOG",
];

/// Grant the shell user the read permissions the content queries need.
pub fn grant_permissions(transport: &dyn Transport) -> String {
    FORENSIC_PERMISSIONS
        .iter()
        .map(|perm| {
            let out = transport.run(
                &["shell", "pm", "grant", SHELL_PACKAGE, perm],
                transport.timeout(),
            );
            let status = if out.is_empty() { "OK" } else { out.as_str() };
            format!("{}: {}", perm, status)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn permission_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"android\.permission\.[A-Za-z0-9_]+").expect("valid regex"))
}

fn apk_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"package:(/.*?\.apk)").expect("valid regex"))
}

/// Result of `dumpsys package` for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppAnalysis {
    pub package: String,
    pub found: bool,
    pub dump: String,
    /// Sorted, de-duplicated `android.permission.*` names.
    pub permissions: Vec<String>,
}

impl AppAnalysis {
    /// Plain-text report, with the dumpsys output capped at 4000 characters.
    pub fn report(&self) -> String {
        if !self.found {
            return format!("Could not analyze package: {}\n{}", self.package, self.dump);
        }
        let excerpt: String = self.dump.chars().take(4000).collect();
        let perms = if self.permissions.is_empty() {
            "No permissions found.".to_string()
        } else {
            self.permissions.join("\n")
        };
        format!(
            "Analysis for {}:\n\n{}\n\nPermissions:\n{}",
            self.package, excerpt, perms
        )
    }
}

pub fn analyze_app(transport: &dyn Transport, package: &str) -> AppAnalysis {
    let dump = transport.run(&["shell", "dumpsys", "package", package], transport.timeout());
    let found = !(dump.contains("Unable to find") || dump.contains("Error"));
    let permissions: BTreeSet<String> = if found {
        permission_re()
            .find_iter(&dump)
            .map(|m| m.as_str().to_string())
            .collect()
    } else {
        BTreeSet::new()
    };
    AppAnalysis {
        package: package.to_string(),
        found,
        dump,
        permissions: permissions.into_iter().collect(),
    }
}

/// Resolve the base APK of `package` and pull it into `dest`.
pub fn pull_apk(transport: &dyn Transport, package: &str, dest: &Path) -> String {
    let path_out = transport.run(&["shell", "pm", "path", package], transport.timeout());
    if path_out.is_empty() || !path_out.contains("package:") {
        return format!("Unable to get APK path for {}\n{}", package, path_out);
    }
    let apk = match apk_path_re().captures(&path_out) {
        Some(c) => c[1].to_string(),
        None => path_out.replace("package:", "").trim().to_string(),
    };
    let out = transport.run(
        &["pull", &apk, &dest.to_string_lossy()],
        transport.pull_timeout(),
    );
    format!("APK pulled: {} -> {}. adb: {}", apk, dest.display(), out)
}

/// Capture the screen to `/sdcard` and pull the PNG into `dest`.
pub fn screenshot(transport: &dyn Transport, dest: &Path) -> String {
    let name = format!("screenshot_{}.png", Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let remote = format!("/sdcard/{}", name);
    let local = dest.join(&name);

    let cap = transport.run(&["shell", "screencap", "-p", &remote], transport.timeout());
    if !cap.is_empty() {
        tracing::warn!(output = %cap, "screencap reported output");
    }
    let pulled = transport.run(&["pull", &remote, &local.to_string_lossy()], transport.pull_timeout());
    tracing::debug!(output = %pulled, "screenshot pull");
    format!("Screenshot saved: {}", local.display())
}

/// Folder groups with vendor-specific locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WellKnownFolder {
    Whatsapp,
    Screenshots,
    Camera,
}

impl WellKnownFolder {
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            WellKnownFolder::Whatsapp => &[
                "/sdcard/Android/media/com.whatsapp/WhatsApp",
                "/sdcard/WhatsApp",
                "/storage/emulated/0/WhatsApp",
                "/storage/emulated/0/Android/media/com.whatsapp/WhatsApp",
            ],
            WellKnownFolder::Screenshots => &[
                "/sdcard/Pictures/Screenshots",
                "/sdcard/DCIM/Screenshots",
                "/storage/emulated/0/Pictures/Screenshots",
                "/storage/emulated/0/DCIM/Screenshots",
                "/sdcard/Screenshots",
            ],
            WellKnownFolder::Camera => &[
                "/sdcard/DCIM/Camera",
                "/storage/emulated/0/DCIM/Camera",
                "/sdcard/DCIM/100ANDRO",
            ],
        }
    }

    fn not_found_message(self) -> &'static str {
        match self {
            WellKnownFolder::Whatsapp => "WhatsApp folder not found or inaccessible.",
            WellKnownFolder::Screenshots => "Screenshots folder not found.",
            WellKnownFolder::Camera => "Camera folder not found.",
        }
    }
}

/// Pull the first candidate folder whose listing is neither missing nor denied.
pub fn copy_first_available(transport: &dyn Transport, folder: WellKnownFolder, dest: &Path) -> String {
    for candidate in folder.candidates() {
        let quoted = shell_quote(candidate);
        let ls = match transport.shell(&["ls", quoted.as_str()]) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(candidate, error = %e, "candidate listing failed");
                continue;
            }
        };
        if ls.contains("No such") || ls.to_lowercase().contains("denied") {
            continue;
        }
        tracing::info!(candidate, "pulling folder");
        return transport.run(&["pull", candidate, &dest.to_string_lossy()], transport.pull_timeout());
    }
    folder.not_found_message().to_string()
}

/// Pull a single remote path into `dest`.
pub fn pull_item(transport: &dyn Transport, remote: &str, dest: &Path) -> String {
    let out = transport.run(&["pull", remote, &dest.to_string_lossy()], transport.pull_timeout());
    format!("Pulled {} -> {}. adb: {}", remote, dest.display(), out)
}
