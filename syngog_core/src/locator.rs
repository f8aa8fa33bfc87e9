/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::locator
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Enumerate installed GOG packages through the Windows
    uninstall registry and through filesystem heuristics over
    conventional install roots, then merge the two views.

  Security / Safety Notes:
    Executes `reg query` read-only with user privileges; the
    filesystem walk only lists directories and reads metadata.

  Dependencies:
    tokio::process for registry queries, walkdir for the
    directory-size fallback, dirs for profile-relative roots.

  Operational Scope:
    First stage of every scan; its records feed the update
    check performed by the orchestrator.

  Revision History:
    2025-11-02 COD  Authored registry and directory discovery.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic discovery order, first-seen wins on merge
    - Per-root failures reported, never fatal on their own
============================================================*/

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use walkdir::WalkDir;

use crate::error::{Result, SyngogError};
use crate::executable;
use crate::metadata::{self, MetadataCache};
use crate::package_info::{PackageRecord, ProgressSink, UNKNOWN};
use crate::version;

const UNINSTALL_KEYS: [&str; 2] = [
    r"HKLM\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
];

/// Registry values consulted for a version, in priority order.
const VERSION_VALUES: [&str; 4] = ["DisplayVersion", "Version", "VersionMajor", "VersionMinor"];

/// GOG uninstall keys are named after the catalog id (`1207658924_is1`).
const MIN_REGISTRY_ID_DIGITS: usize = 8;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Subpaths probed under every volume during a deep scan.
const DEEP_SUBPATHS: [&str; 7] = [
    "GOG Games",
    "Games/GOG",
    "Games/GOG Games",
    "Games",
    "Program Files/GOG Games",
    "Program Files (x86)/GOG Games",
    "Program Files (x86)/GOG Galaxy/Games",
];

/// Profile-relative roots probed in both modes.
const PROFILE_SUBPATHS: [&str; 4] = [
    "Games/GOG",
    "Documents/GOG Games",
    "GOG Games",
    ".wine/drive_c/GOG Games",
];

/// One uninstall entry as reported by `reg query /s`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryEntry {
    pub key: String,
    pub values: Vec<(String, String, String)>,
}

impl RegistryEntry {
    /// Leaf subkey name.
    pub fn subkey(&self) -> &str {
        self.key.rsplit('\\').next().unwrap_or(&self.key)
    }

    /// Raw string data for `name` (case-insensitive), if set and non-empty.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(value_name, _, _)| value_name.eq_ignore_ascii_case(name))
            .map(|(_, _, data)| data.as_str())
            .filter(|data| !data.trim().is_empty())
    }

    /// Numeric data for `name`, accepting `REG_DWORD` hex and decimal text.
    pub fn numeric_value(&self, name: &str) -> Option<u64> {
        let data = self.value(name)?.trim();
        match data.strip_prefix("0x").or_else(|| data.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => data.parse::<u64>().ok(),
        }
    }
}

/// Discovers installed packages from the registry and the filesystem.
#[derive(Debug, Clone, Default)]
pub struct PackageLocator {
    extra_roots: Vec<PathBuf>,
    progress: ProgressSink,
}

impl PackageLocator {
    pub fn new(extra_roots: Vec<PathBuf>, progress: ProgressSink) -> Self {
        Self {
            extra_roots,
            progress,
        }
    }

    /// Union registry and directory results, deduplicated by lowercase name.
    pub async fn find_all(&self, deep: bool) -> Result<Vec<PackageRecord>> {
        self.progress.line("Scanning registry for installed packages...");
        let registry = match self.scan_registry().await {
            Ok(records) => {
                self.progress
                    .line(format!("Registry scan found {} packages", records.len()));
                Some(records)
            }
            Err(err) => {
                self.progress.line(format!("Registry scan failed: {err}"));
                None
            }
        };

        let roots = self.search_roots(deep);
        let (directories, readable_roots) = self.scan_roots(&roots);
        self.progress.line(format!(
            "Directory scan found {} packages in {} roots",
            directories.len(),
            readable_roots
        ));

        if registry.is_none() && readable_roots == 0 {
            return Err(SyngogError::Discovery(
                "registry unavailable and no install roots readable".into(),
            ));
        }

        let mut combined = registry.unwrap_or_default();
        combined.extend(directories);
        let unique = dedup_records(combined);
        self.progress
            .line(format!("Reconciled {} unique packages", unique.len()));
        Ok(unique)
    }

    /// Enumerate GOG-like uninstall entries. Skipped on non-Windows hosts.
    pub async fn scan_registry(&self) -> Result<Vec<PackageRecord>> {
        if !cfg!(windows) {
            self.progress
                .line("Registry scan skipped: not available on this platform");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut failures = 0usize;
        for key in UNINSTALL_KEYS {
            self.progress.line(format!("Checking registry path: {key}"));
            match query_registry(key).await {
                Ok(stdout) => {
                    let entries = parse_reg_query(&stdout);
                    let before = records.len();
                    records.extend(
                        entries
                            .iter()
                            .filter(|entry| is_storefront_entry(entry))
                            .map(record_from_registry),
                    );
                    self.progress.line(format!(
                        "Found {} GOG keys in {key}",
                        records.len() - before
                    ));
                }
                Err(err) => {
                    failures += 1;
                    self.progress
                        .line(format!("Error scanning registry path {key}: {err}"));
                }
            }
        }

        if failures == UNINSTALL_KEYS.len() {
            return Err(SyngogError::Discovery(
                "no uninstall registry path could be queried".into(),
            ));
        }
        Ok(records)
    }

    /// Walk conventional install roots for package directories.
    pub fn scan_directories(&self, deep: bool) -> Vec<PackageRecord> {
        let roots = self.search_roots(deep);
        self.scan_roots(&roots).0
    }

    fn scan_roots(&self, roots: &[PathBuf]) -> (Vec<PackageRecord>, usize) {
        let mut records = Vec::new();
        let mut readable = 0usize;
        for root in roots {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => {
                    self.progress
                        .line(format!("Error scanning directory {}: {err}", root.display()));
                    continue;
                }
            };
            readable += 1;
            self.progress
                .line(format!("Checking directory: {}", root.display()));

            let mut children: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            children.sort();

            for child in children {
                if let Some(record) = analyze_package_dir(&child) {
                    self.progress
                        .line(format!("Identified GOG package: {}", record.name));
                    records.push(record);
                }
            }
        }
        (records, readable)
    }

    /// Roots searched for the chosen mode, deduplicated in order.
    pub fn search_roots(&self, deep: bool) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = if deep {
            let mut deep_roots = Vec::new();
            for volume in mounted_volumes() {
                for sub in DEEP_SUBPATHS {
                    deep_roots.push(join_relative(&volume, sub));
                }
                deep_roots.push(volume);
            }
            deep_roots
        } else {
            quick_roots()
        };

        if let Some(home) = dirs::home_dir() {
            roots.extend(PROFILE_SUBPATHS.iter().map(|sub| join_relative(&home, sub)));
        }
        roots.extend(self.extra_roots.iter().cloned());

        let mut seen = HashSet::new();
        roots.retain(|root| seen.insert(root.clone()));
        roots
    }
}

/// Keep the first record for each lowercase name.
pub fn dedup_records(records: Vec<PackageRecord>) -> Vec<PackageRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| !record.name.is_empty() && seen.insert(record.dedup_key()))
        .collect()
}

/// Build a record for `dir` if it holds package metadata and a game executable.
pub fn analyze_package_dir(dir: &Path) -> Option<PackageRecord> {
    if metadata::find_metadata_files(dir).is_empty() {
        return None;
    }
    executable::find_primary_executable(dir)?;

    let folder_name = dir.file_name()?.to_string_lossy().into_owned();
    let display_name = metadata::detect_display_name(dir).unwrap_or_default();
    let mut record = PackageRecord::new(
        &display_name,
        &folder_name,
        Some(dir.to_string_lossy().into_owned()),
    );
    match metadata::detect_build_id(dir, &mut MetadataCache::new()) {
        Some(detected) => {
            record.installed_version = detected.build_id;
            record.catalog_id = Some(detected.catalog_id);
        }
        None => record.catalog_id = metadata::resolve_catalog_id(dir),
    }
    record.size = directory_size(dir);
    Some(record)
}

/// Parse `reg query <key> /s` output into one entry per subkey.
pub fn parse_reg_query(stdout: &str) -> Vec<RegistryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<RegistryEntry> = None;

    for line in stdout.lines() {
        let trimmed = line.trim_end();
        if trimmed.starts_with("HKEY_") || trimmed.starts_with("HKLM\\") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(RegistryEntry {
                key: trimmed.to_string(),
                values: Vec::new(),
            });
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        let mut parts = trimmed.trim_start().splitn(3, "    ");
        if let (Some(name), Some(kind)) = (parts.next(), parts.next()) {
            if kind.starts_with("REG_") {
                let data = parts.next().unwrap_or("").trim().to_string();
                entry
                    .values
                    .push((name.trim().to_string(), kind.trim().to_string(), data));
            }
        }
    }
    if let Some(entry) = current.take() {
        entries.push(entry);
    }
    // The root key itself carries no package values.
    entries.retain(|entry| !entry.values.is_empty());
    entries
}

/// Subkeys named after a catalog id or mentioning GOG, or published by GOG.
pub fn is_storefront_entry(entry: &RegistryEntry) -> bool {
    let subkey = entry.subkey().to_ascii_lowercase();
    let leading_digits = subkey.bytes().take_while(u8::is_ascii_digit).count();
    subkey.contains("gog")
        || leading_digits >= MIN_REGISTRY_ID_DIGITS
        || entry
            .value("Publisher")
            .map(|publisher| publisher.to_ascii_lowercase().contains("gog"))
            .unwrap_or(false)
}

/// Convert an uninstall entry into a candidate record.
pub fn record_from_registry(entry: &RegistryEntry) -> PackageRecord {
    let install_path = entry
        .value("InstallLocation")
        .map(|path| path.trim().trim_end_matches('\\').to_string());
    let mut record = PackageRecord::new(
        entry.value("DisplayName").unwrap_or_default(),
        entry.subkey(),
        install_path,
    );

    if let Some(cleaned) = VERSION_VALUES
        .iter()
        .filter_map(|name| entry.value(name))
        .find_map(version::clean)
    {
        record.installed_version = cleaned;
    }

    let digits: String = entry
        .subkey()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.len() >= MIN_REGISTRY_ID_DIGITS {
        record.catalog_id = Some(digits);
    }

    record.size = match entry.numeric_value("EstimatedSize") {
        Some(kib) => format_size(kib.saturating_mul(1024)),
        None if record.has_install_path() && Path::new(&record.install_path).is_dir() => {
            directory_size(Path::new(&record.install_path))
        }
        None => UNKNOWN.to_string(),
    };
    record
}

async fn query_registry(key: &str) -> Result<String> {
    let output = Command::new("reg")
        .arg("query")
        .arg(key)
        .arg("/s")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|err| map_spawn_error(err, "reg"))?;

    if !output.status.success() {
        return Err(SyngogError::CommandFailure {
            command: format!("reg query {key} /s"),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn map_spawn_error(err: io::Error, command: &str) -> SyngogError {
    if err.kind() == io::ErrorKind::NotFound {
        SyngogError::CommandMissing {
            command: command.into(),
        }
    } else {
        SyngogError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}

/// Sum file sizes below `path` and render them, or `Unknown` if unreadable.
pub fn directory_size(path: &Path) -> String {
    if !path.is_dir() {
        return UNKNOWN.to_string();
    }
    let total: u64 = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum();
    format_size(total)
}

/// Render a byte count in the largest fitting unit at a 1024 divisor.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in SIZE_UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}

fn quick_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        [
            r"C:\Program Files (x86)\GOG Games",
            r"C:\Program Files\GOG Games",
            r"C:\GOG Games",
            r"D:\GOG Games",
            r"C:\Games\GOG",
            r"D:\Games\GOG",
            r"C:\Games",
            r"D:\Games",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect()
    } else {
        ["/opt/GOG Games", "/opt/gog"]
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }
}

/// Drive letters on Windows; `/` plus removable and manual mounts elsewhere.
fn mounted_volumes() -> Vec<PathBuf> {
    if cfg!(windows) {
        return (b'C'..=b'Z')
            .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
            .filter(|drive| drive.exists())
            .collect();
    }

    let mut volumes = vec![PathBuf::from("/")];
    let mut parents = vec![PathBuf::from("/mnt"), PathBuf::from("/media")];
    if let Ok(user) = std::env::var("USER") {
        parents.push(PathBuf::from("/media").join(&user));
        parents.push(PathBuf::from("/run/media").join(&user));
    }
    for parent in parents {
        if let Ok(entries) = fs::read_dir(&parent) {
            let mut mounts: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            mounts.sort();
            volumes.extend(mounts);
        }
    }
    volumes
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(base.to_path_buf(), |path, part| path.join(part))
}
