/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::catalog
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Query the GOGDB product catalog for a package's build
    history, select the latest build for the host operating
    system, and fetch optional release notes.

  Security / Safety Notes:
    Performs read-only HTTPS requests to a public catalog.
    No credentials are transmitted.

  Dependencies:
    reqwest for HTTP, serde for response parsing, async-trait
    for the injectable catalog seam.

  Operational Scope:
    Supplies latest-build data to the orchestrator; failures
    are returned as LookupError and trigger local fallbacks.

  Revision History:
    2025-11-02 COD  Implemented GOGDB catalog client.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Mandatory request timeouts
    - Structured response parsing with explicit error paths
    - 404 distinguished from transport failures
============================================================*/

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::changelog;
use crate::config::CatalogConfig;
use crate::error::{LookupError, Result, SyngogError};
use crate::package_info::{DEFAULT_TAGS, UNKNOWN};
use crate::version;

const MAX_TAGS_INSPECTED: usize = 5;
const MAX_RELEVANT_TAGS: usize = 3;
const MAX_FEATURES: usize = 2;
const MAX_FEATURE_LEN: usize = 15;
const MAX_DISPLAY_TAGS: usize = 3;
const SKIPPED_TAGS: [&str; 3] = ["windows", "english", "offline"];

/// Operating systems distinguished by the catalog's build list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Windows,
    Osx,
    Linux,
}

impl TargetOs {
    /// The operating system this binary runs on.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            TargetOs::Osx
        } else if cfg!(target_os = "linux") {
            TargetOs::Linux
        } else {
            TargetOs::Windows
        }
    }

    /// Parse a catalog OS tag, tolerating common naming variants.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" | "win32" | "win64" | "pc" => Some(TargetOs::Windows),
            "osx" | "mac" | "macos" | "darwin" => Some(TargetOs::Osx),
            "linux" => Some(TargetOs::Linux),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetOs::Windows => "windows",
            TargetOs::Osx => "osx",
            TargetOs::Linux => "linux",
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest-build data for one catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRelease {
    pub catalog_id: String,
    /// Build id of the selected build, the catalog id when the build id is
    /// not a build id, or `Unknown` when the product has no builds.
    pub latest_version: String,
    /// Raw identifier of the selected build.
    pub build_id: Option<String>,
    pub readable_version: Option<String>,
    pub tags: String,
    pub build_count: usize,
    /// No build matched the host OS; the newest build overall was used.
    pub os_fallback: bool,
}

impl CatalogRelease {
    pub fn has_builds(&self) -> bool {
        self.build_count > 0
    }
}

/// Read-only view of a remote product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn fetch_latest_build(
        &self,
        catalog_id: &str,
    ) -> std::result::Result<CatalogRelease, LookupError>;

    /// Best-effort release notes; `None` on any failure.
    async fn fetch_changelog(&self, catalog_id: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    builds: Option<Vec<BuildEntry>>,
    #[serde(default)]
    tags: Option<Vec<Value>>,
    #[serde(default)]
    features: Option<Vec<Value>>,
    #[serde(default)]
    version: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct BuildEntry {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    os: Option<String>,
}

/// HTTP client for the GOGDB catalog.
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    target_os: TargetOs,
    changelog_timeout: Duration,
}

impl CatalogClient {
    /// Construct a new client from configuration.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| SyngogError::Network(format!("Failed to build HTTP client: {err}")))?;

        let target_os = match config.target_os.as_deref() {
            Some(tag) => TargetOs::from_tag(tag).ok_or_else(|| {
                SyngogError::Config(format!("Unknown catalog target_os `{tag}`"))
            })?,
            None => TargetOs::current(),
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            target_os,
            changelog_timeout: Duration::from_secs(config.changelog_timeout.max(1)),
        })
    }

    pub fn target_os(&self) -> TargetOs {
        self.target_os
    }

    fn product_url(&self, catalog_id: &str) -> String {
        format!("{}/data/products/{catalog_id}/product.json", self.base_url)
    }

    fn release_notes_url(&self, catalog_id: &str) -> String {
        format!("{}/product/{catalog_id}/releasenotes", self.base_url)
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn fetch_latest_build(
        &self,
        catalog_id: &str,
    ) -> std::result::Result<CatalogRelease, LookupError> {
        if catalog_id.is_empty() || !catalog_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LookupError::NoCatalogId);
        }
        let url = self.product_url(catalog_id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| LookupError::from_transport(&err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound {
                catalog_id: catalog_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(LookupError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| LookupError::from_transport(&err))?;
        let product: ProductResponse =
            serde_json::from_str(&body).map_err(|err| LookupError::Malformed(err.to_string()))?;

        Ok(select_release(catalog_id, product, self.target_os))
    }

    async fn fetch_changelog(&self, catalog_id: &str) -> Option<String> {
        let response = self
            .client
            .get(self.release_notes_url(catalog_id))
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .timeout(self.changelog_timeout)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let bytes = response.bytes().await.ok()?;
        changelog::parse_release_notes(&String::from_utf8_lossy(&bytes))
    }
}

/// Choose the newest OS-matching build (catalog order is oldest to newest).
fn select_release(catalog_id: &str, product: ProductResponse, target: TargetOs) -> CatalogRelease {
    let builds = product.builds.unwrap_or_default();
    let tags = extract_tags(
        product.tags.as_deref().unwrap_or_default(),
        product.features.as_deref().unwrap_or_default(),
    );
    let product_version = product.version.as_ref().and_then(value_text);

    let matching: Vec<&BuildEntry> = builds
        .iter()
        .filter(|build| {
            build
                .os
                .as_deref()
                .and_then(TargetOs::from_tag)
                .map(|os| os == target)
                .unwrap_or(false)
        })
        .collect();

    let (selected, os_fallback) = match matching.last() {
        Some(build) => (Some(*build), false),
        None => (builds.last(), !builds.is_empty()),
    };

    let build_id = selected.and_then(|b| b.id.as_ref()).and_then(value_text);
    let latest_version = match (&selected, &build_id) {
        (None, _) => UNKNOWN.to_string(),
        (Some(_), Some(id)) if version::is_build_id(id) => id.clone(),
        (Some(_), _) => catalog_id.to_string(),
    };

    let readable_version = selected
        .and_then(|b| b.version.as_ref())
        .and_then(value_text)
        .or(product_version)
        .filter(|v| !version::is_build_id(v));

    CatalogRelease {
        catalog_id: catalog_id.to_string(),
        latest_version,
        build_id,
        readable_version,
        tags,
        build_count: builds.len(),
        os_fallback,
    }
}

/// Up to three relevant tags plus short features, joined for display.
fn extract_tags(tags: &[Value], features: &[Value]) -> String {
    let mut display: Vec<String> = tags
        .iter()
        .take(MAX_TAGS_INSPECTED)
        .filter_map(named_value)
        .filter(|name| {
            let lowered = name.to_lowercase();
            !SKIPPED_TAGS.iter().any(|skip| lowered.contains(skip))
        })
        .take(MAX_RELEVANT_TAGS)
        .collect();

    display.extend(
        features
            .iter()
            .take(MAX_FEATURES)
            .filter_map(named_value)
            .filter(|name| name.chars().count() < MAX_FEATURE_LEN)
            .map(|name| format!("⭐{name}")),
    );

    if display.is_empty() {
        DEFAULT_TAGS.to_string()
    } else {
        display.truncate(MAX_DISPLAY_TAGS);
        display.join(" • ")
    }
}

fn named_value(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("name").and_then(value_text),
        other => value_text(other),
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
