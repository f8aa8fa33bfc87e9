/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load Syn-Gog-Core configuration from TOML, applying
    defaults for every omitted section and field.

  Security / Safety Notes:
    Configuration is read from operator-controlled paths only;
    no values are executed.

  Dependencies:
    toml/serde for parsing, dirs for platform directories.

  Operational Scope:
    Loaded once by the binary entry point; sections are handed
    to the catalog client, locator and orchestrator.

  Revision History:
    2025-11-02 COD  Established configuration loader.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults, no hidden environment coupling
    - Missing default file is not an error; missing explicit
      file is
============================================================*/

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SyngogError};

const APP_DIR: &str = "syn-gog";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_BASE_URL: &str = "https://www.gogdb.org";
const DEFAULT_USER_AGENT: &str = "Syn-Gog-Core/0.4 (build-check)";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyngogConfig {
    pub catalog: CatalogConfig,
    pub scan: ScanConfig,
    pub output: OutputConfig,
}

/// Remote catalog settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Product lookup timeout in seconds.
    pub timeout: u64,
    /// Release notes timeout in seconds.
    pub changelog_timeout: u64,
    pub user_agent: String,
    /// Override for the host OS used to filter builds.
    pub target_os: Option<String>,
    pub fetch_changelog: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: 10,
            changelog_timeout: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            target_os: None,
            fetch_changelog: true,
        }
    }
}

/// Discovery settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    pub deep: bool,
    pub extra_roots: Vec<PathBuf>,
    /// Courtesy delay between catalog lookups, in milliseconds.
    pub request_delay_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            deep: false,
            extra_roots: Vec::new(),
            request_delay_ms: 1000,
        }
    }
}

impl ScanConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub report_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl SyngogConfig {
    /// Load from `path`, or from the default location when `None`.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load(explicit),
            None => match default_config_path() {
                Some(default) if default.is_file() => Self::load(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            SyngogError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|err| SyngogError::Config(format!("{}: {err}", path.display())))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output
            .report_path
            .clone()
            .unwrap_or_else(|| data_dir().join("report.json"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.output
            .log_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("logs"))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SyngogConfig::parse("").unwrap();
        assert_eq!(config, SyngogConfig::default());
        assert_eq!(config.catalog.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.scan.request_delay(), Duration::from_secs(1));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SyngogConfig::parse(
            r#"
            [catalog]
            timeout = 12
            target_os = "linux"

            [scan]
            deep = true
            extra_roots = ["/srv/games"]
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog.timeout, 12);
        assert_eq!(config.catalog.changelog_timeout, 15);
        assert_eq!(config.catalog.target_os.as_deref(), Some("linux"));
        assert!(config.scan.deep);
        assert_eq!(config.scan.extra_roots, vec![PathBuf::from("/srv/games")]);
        assert_eq!(config.scan.request_delay_ms, 1000);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = SyngogConfig::load_from_optional_path(Some(missing.as_path()));
        assert!(matches!(result, Err(SyngogError::Config(_))));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[catalog\ntimeout = ").unwrap();
        assert!(matches!(
            SyngogConfig::load(&path),
            Err(SyngogError::Config(_))
        ));
    }

    #[test]
    fn output_paths_can_be_overridden() {
        let config = SyngogConfig::parse(
            r#"
            [output]
            report_path = "/tmp/r.json"
            log_dir = "/tmp/logs"
            "#,
        )
        .unwrap();
        assert_eq!(config.report_path(), PathBuf::from("/tmp/r.json"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/logs"));
    }
}
