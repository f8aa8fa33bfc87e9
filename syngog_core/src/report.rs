/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::report
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Assemble the JSON report describing every checked package
    and its classification, plus the run statistics line.

  Security / Safety Notes:
    Reports are written to operator-controlled paths; no
    privileged operations are performed.

  Dependencies:
    serde/serde_json for serialization, chrono for stamps.

  Operational Scope:
    Consumed by front ends and scripts that present results.

  Revision History:
    2025-11-02 COD  Adapted manifest builder into scan report.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible reports
    - Explicit provenance for each latest version
============================================================*/

use std::fs::File;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::classifier;
use crate::error::{Result, SyngogError};
use crate::logger::Logger;
use crate::package_info::{LatestSource, PackageRecord, UpdateStatus};

const WIKI_BASE: &str = "https://www.pcgamingwiki.com/wiki/";

/// Edition suffixes dropped before building a wiki page name.
const EDITION_SUFFIXES: [&str; 12] = [
    " - Enhanced Edition",
    " Enhanced Edition",
    " - Director's Cut",
    " Director's Cut",
    " - Definitive Edition",
    " Definitive Edition",
    " - Game of the Year Edition",
    " Game of the Year Edition",
    " - Complete Edition",
    " Complete Edition",
    " - Digital Deluxe Edition",
    " Digital Deluxe Edition",
];

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| compile(r"[^\w\s]"));
static SPACES: Lazy<Regex> = Lazy::new(|| compile(r"\s+"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid report pattern {pattern}: {err}"))
}

/// Wrapper representing the full report document.
#[derive(Debug, Serialize)]
pub struct ReportDocument {
    pub metadata: ReportMetadata,
    pub packages: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub generated_by: String,
    pub scan_mode: String,
    pub total_packages: usize,
    pub up_to_date: usize,
    pub updates_available: usize,
    pub not_in_database: usize,
}

/// Per-package report entry.
#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub install_path: String,
    pub catalog_id: Option<String>,
    pub installed_version: String,
    pub readable_version: String,
    pub latest_version: String,
    pub latest_readable_version: Option<String>,
    pub update_status: UpdateStatus,
    pub source: LatestSource,
    pub size: String,
    pub tags: String,
    pub changelog: String,
    /// Absent for DLC, which has no wiki page of its own.
    pub pcgamingwiki_url: Option<String>,
}

impl From<&PackageRecord> for ReportEntry {
    fn from(record: &PackageRecord) -> Self {
        Self {
            name: record.name.clone(),
            install_path: record.install_path.clone(),
            catalog_id: record.catalog_id.clone(),
            installed_version: record.installed_version.clone(),
            readable_version: record.readable_version.clone(),
            latest_version: record.latest_version.clone(),
            latest_readable_version: record.latest_readable_version.clone(),
            update_status: record.update_status,
            source: record.source,
            size: record.size.clone(),
            tags: record.tags.clone(),
            changelog: record.changelog.clone(),
            pcgamingwiki_url: (!classifier::is_dlc(&record.name))
                .then(|| format!("{WIKI_BASE}{}", wiki_page_name(&record.name)))
                .filter(|url| url.len() > WIKI_BASE.len()),
        }
    }
}

/// Counts shown in the statistics line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    pub total: usize,
    pub up_to_date: usize,
    pub updates_available: usize,
    pub not_in_database: usize,
}

impl ScanStatistics {
    pub fn from_records(records: &[PackageRecord]) -> Self {
        records.iter().fold(
            Self {
                total: records.len(),
                ..Self::default()
            },
            |mut stats, record| {
                match record.update_status {
                    UpdateStatus::UpToDate => stats.up_to_date += 1,
                    UpdateStatus::UpdateAvailable => stats.updates_available += 1,
                    UpdateStatus::NotInDatabase => stats.not_in_database += 1,
                    _ => {}
                }
                stats
            },
        )
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Total: {} | Up to Date: {} | Updates Available: {}",
            self.total, self.up_to_date, self.updates_available
        )
    }
}

/// Build a report from checked package records, sorted by name.
pub fn build_report(records: &[PackageRecord], deep: bool, logger: &Logger) -> ReportDocument {
    let stats = ScanStatistics::from_records(records);
    let mut packages: Vec<ReportEntry> = records.iter().map(ReportEntry::from).collect();
    packages.sort_by_key(|entry| entry.name.to_lowercase());

    for entry in &packages {
        logger.debug(
            "REPORT",
            format!(
                "{} → {} via {:?} ({})",
                entry.name, entry.latest_version, entry.source, entry.update_status
            ),
        );
    }

    ReportDocument {
        metadata: ReportMetadata {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            generated_by: "syngog_core".to_string(),
            scan_mode: if deep { "deep" } else { "quick" }.to_string(),
            total_packages: stats.total,
            up_to_date: stats.up_to_date,
            updates_available: stats.updates_available,
            not_in_database: stats.not_in_database,
        },
        packages,
    }
}

/// Persist the report to the given path.
pub fn write_report(document: &ReportDocument, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            SyngogError::Filesystem(format!(
                "Failed to create report directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        SyngogError::Filesystem(format!(
            "Failed to create report file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, document).map_err(|err| {
        SyngogError::Serialization(format!("Failed to write report {}: {err}", path.display()))
    })?;
    Ok(())
}

/// PCGamingWiki page name: edition suffix removed, punctuation dropped,
/// whitespace runs replaced by underscores.
pub fn wiki_page_name(name: &str) -> String {
    let trimmed = name.trim();
    let base = EDITION_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .map(str::trim)
        .unwrap_or(trimmed);
    let stripped = PUNCTUATION.replace_all(base, "");
    SPACES.replace_all(stripped.trim(), "_").into_owned()
}
