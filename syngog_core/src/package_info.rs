/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::package_info
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Shared structures describing discovered game packages,
    their update status, and the progress events emitted
    while a scan runs.

  Security / Safety Notes:
    Pure data containers; no I/O performed in this module.

  Dependencies:
    serde for report serialization, tokio mpsc for progress
    delivery.

  Operational Scope:
    Used across locator, orchestrator, classifier and report
    construction to pass package state between stages.

  Revision History:
    2025-11-02 COD  Introduced PackageRecord and ScanEvent.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Serializable structures for report output
============================================================*/

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Sentinel for a version or path that could not be determined.
pub const UNKNOWN: &str = "Unknown";
/// Sentinel for "no readable version found".
pub const NO_READABLE_VERSION: &str = "-";
/// Tag glyph shown when the catalog supplies no tags.
pub const DEFAULT_TAGS: &str = "🎮";
pub const DEFAULT_CHANGELOG: &str = "Not checked yet";

/// One discovered installation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRecord {
    pub name: String,
    pub install_path: String,
    pub installed_version: String,
    pub readable_version: String,
    pub latest_version: String,
    pub latest_readable_version: Option<String>,
    pub update_status: UpdateStatus,
    pub changelog: String,
    pub tags: String,
    pub size: String,
    pub catalog_id: Option<String>,
    pub source: LatestSource,
}

impl PackageRecord {
    /// Build a fresh, unchecked record. An empty name falls back to `fallback_name`.
    pub fn new(name: &str, fallback_name: &str, install_path: Option<String>) -> Self {
        let name = if name.trim().is_empty() {
            fallback_name.trim()
        } else {
            name.trim()
        };
        Self {
            name: name.to_string(),
            install_path: install_path.unwrap_or_else(|| UNKNOWN.to_string()),
            installed_version: UNKNOWN.to_string(),
            readable_version: NO_READABLE_VERSION.to_string(),
            latest_version: UNKNOWN.to_string(),
            latest_readable_version: None,
            update_status: UpdateStatus::NotChecked,
            changelog: DEFAULT_CHANGELOG.to_string(),
            tags: DEFAULT_TAGS.to_string(),
            size: UNKNOWN.to_string(),
            catalog_id: None,
            source: LatestSource::Unknown,
        }
    }

    /// Lowercased name used for deduplication.
    pub fn dedup_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn has_install_path(&self) -> bool {
        self.install_path != UNKNOWN && !self.install_path.is_empty()
    }

    pub fn is_checked(&self) -> bool {
        self.update_status != UpdateStatus::NotChecked
    }
}

/// Classification of an installed package against the latest known build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UpdateStatus {
    #[serde(rename = "Not Checked")]
    NotChecked,
    #[serde(rename = "Cannot Check - No Installed Version")]
    NoInstalledVersion,
    #[serde(rename = "Cannot Check - No Latest Version")]
    NoLatestVersion,
    #[serde(rename = "DLC - Base Game Reference")]
    DlcBaseGameReference,
    #[serde(rename = "Local Reference Only")]
    LocalReferenceOnly,
    #[serde(rename = "Up to Date")]
    UpToDate,
    #[serde(rename = "Update Available")]
    UpdateAvailable,
    #[serde(rename = "Newer Version Installed")]
    NewerVersionInstalled,
    #[serde(rename = "Different Version")]
    DifferentVersion,
    #[serde(rename = "Not in Database")]
    NotInDatabase,
}

impl UpdateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::NotChecked => "Not Checked",
            UpdateStatus::NoInstalledVersion => "Cannot Check - No Installed Version",
            UpdateStatus::NoLatestVersion => "Cannot Check - No Latest Version",
            UpdateStatus::DlcBaseGameReference => "DLC - Base Game Reference",
            UpdateStatus::LocalReferenceOnly => "Local Reference Only",
            UpdateStatus::UpToDate => "Up to Date",
            UpdateStatus::UpdateAvailable => "Update Available",
            UpdateStatus::NewerVersionInstalled => "Newer Version Installed",
            UpdateStatus::DifferentVersion => "Different Version",
            UpdateStatus::NotInDatabase => "Not in Database",
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a record's `latest_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestSource {
    Catalog,
    LocalDetection,
    LocalFallback,
    Unknown,
}

/// Notification emitted by the scan worker.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Progress(String),
    Record(Box<PackageRecord>),
    Finished { checked: usize, cancelled: bool },
}

/// One-way progress channel; a sink without a listener drops everything.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    sender: Option<UnboundedSender<ScanEvent>>,
}

impl ProgressSink {
    pub fn new(sender: UnboundedSender<ScanEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that discards all events.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn line<S: Into<String>>(&self, message: S) {
        self.send(ScanEvent::Progress(message.into()));
    }

    pub fn record(&self, record: &PackageRecord) {
        self.send(ScanEvent::Record(Box::new(record.clone())));
    }

    pub fn finished(&self, checked: usize, cancelled: bool) {
        self.send(ScanEvent::Finished { checked, cancelled });
    }

    fn send(&self, event: ScanEvent) {
        if let Some(sender) = &self.sender {
            // A dropped receiver means nobody is listening any more.
            let _ = sender.send(event);
        }
    }
}
