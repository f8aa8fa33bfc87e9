/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::metadata
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Read per-package `goggame-<id>.info` metadata and related
    sources to recover the installed build id, catalog id,
    display name, and a human-readable version.

  Security / Safety Notes:
    Only a bounded prefix of each file is read. Every step is
    fault tolerant: failures yield `None` and the next fallback
    runs.

  Dependencies:
    regex/once_cell for field patterns.

  Operational Scope:
    Called by the locator to validate package roots and by the
    orchestrator once per package during an update check.

  Revision History:
    2025-11-02 COD  Authored metadata extractor with scan cache.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Named strategies with documented precedence
    - Build id and readable version detected independently
    - Explicit cache scoped to one scan
============================================================*/

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::executable;
use crate::version;

/// Upper bound on bytes read from any metadata or version text file.
const METADATA_READ_LIMIT: u64 = 64 * 1024;

/// Conventional plain-text version files checked in the install root.
const VERSION_TEXT_FILES: [&str; 5] = [
    "version.txt",
    "VERSION",
    "VERSION.txt",
    "gameversion.txt",
    "build.txt",
];

static METADATA_FILENAME: Lazy<Regex> = Lazy::new(|| compile(r"(?i)^goggame-(\d+)\.info$"));

/// Build-id fields in priority order: explicit build id, then generic build.
static BUILD_ID_FIELDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r#"(?i)"?\bbuild_?id"?\s*[:=]\s*"?(\d+)"?"#),
        compile(r#"(?i)"?\bbuild"?\s*[:=]\s*"?(\d+)"?"#),
    ]
});

/// Readable-version fields: exact version, display-name version, product version.
static VERSION_FIELDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r#"(?i)"version"\s*:\s*"([^"]+)""#),
        compile(r#"(?i)"(?:versionName|displayVersion)"\s*:\s*"([^"]+)""#),
        compile(r#"(?i)"productVersion"\s*:\s*"([^"]+)""#),
        compile(r#"(?im)^\s*version\s*=\s*([^\s"]+)\s*$"#),
    ]
});

static NAME_FIELD: Lazy<Regex> = Lazy::new(|| compile(r#""name"\s*:\s*"([^"]+)""#));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid metadata pattern {pattern}: {err}"))
}

/// Build id detected for an install directory along with its catalog id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBuild {
    pub catalog_id: String,
    pub build_id: String,
    /// True when no build field was found and the catalog id stands in.
    pub from_catalog_id: bool,
}

/// Per-scan memo of extractor results, keyed by install directory.
///
/// Owned by a single worker; create a fresh one per update check.
#[derive(Debug, Default)]
pub struct MetadataCache {
    builds: HashMap<PathBuf, Option<DetectedBuild>>,
    readable: HashMap<PathBuf, Option<String>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.builds.len() + self.readable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// List metadata filenames (`goggame-<digits>.info`) in `dir`, sorted.
pub fn find_metadata_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| METADATA_FILENAME.is_match(name))
        .collect();
    names.sort();
    names
}

/// Extract the catalog id encoded in a metadata filename.
pub fn catalog_id_from_filename(file_name: &str) -> Option<String> {
    METADATA_FILENAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

/// Catalog id of the first metadata file in `dir`.
pub fn resolve_catalog_id(dir: &Path) -> Option<String> {
    find_metadata_files(dir)
        .first()
        .and_then(|name| catalog_id_from_filename(name))
}

/// Detect the installed build id, falling back to the catalog id.
pub fn detect_build_id(dir: &Path, cache: &mut MetadataCache) -> Option<DetectedBuild> {
    if let Some(hit) = cache.builds.get(dir) {
        return hit.clone();
    }
    let detected = detect_build_id_uncached(dir);
    cache.builds.insert(dir.to_path_buf(), detected.clone());
    detected
}

fn detect_build_id_uncached(dir: &Path) -> Option<DetectedBuild> {
    let file_name = find_metadata_files(dir).into_iter().next()?;
    let catalog_id = catalog_id_from_filename(&file_name)?;

    let build_id = read_prefix(&dir.join(&file_name))
        .and_then(|content| build_id_from_text(&content));

    Some(match build_id {
        Some(build_id) => DetectedBuild {
            catalog_id,
            build_id,
            from_catalog_id: false,
        },
        None => DetectedBuild {
            build_id: catalog_id.clone(),
            catalog_id,
            from_catalog_id: true,
        },
    })
}

/// First build-id field (in priority order) whose value is a build id.
pub fn build_id_from_text(content: &str) -> Option<String> {
    BUILD_ID_FIELDS.iter().find_map(|pattern| {
        pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|candidate| version::is_build_id(candidate))
            .map(str::to_string)
    })
}

/// Detect a human-readable version for the package in `dir`.
///
/// Order: metadata version fields, primary executable version resource,
/// conventional version text files. `None` is an expected outcome.
pub fn detect_readable_version(dir: &Path, cache: &mut MetadataCache) -> Option<String> {
    if let Some(hit) = cache.readable.get(dir) {
        return hit.clone();
    }
    let detected = readable_from_metadata(dir)
        .or_else(|| readable_from_executable(dir))
        .or_else(|| readable_from_text_files(dir));
    cache.readable.insert(dir.to_path_buf(), detected.clone());
    detected
}

fn readable_from_metadata(dir: &Path) -> Option<String> {
    let file_name = find_metadata_files(dir).into_iter().next()?;
    let content = read_prefix(&dir.join(file_name))?;
    readable_version_from_text(&content)
}

/// First version field whose value cleans to a dotted version and is not a build id.
pub fn readable_version_from_text(content: &str) -> Option<String> {
    VERSION_FIELDS.iter().find_map(|pattern| {
        pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|raw| !version::is_build_id(raw))
            .find_map(version::clean)
            .filter(|cleaned| !version::is_build_id(cleaned))
    })
}

/// The PE reader is portable, so Wine prefixes on other hosts are read too.
fn readable_from_executable(dir: &Path) -> Option<String> {
    let exe = executable::find_primary_executable(dir)?;
    executable::read_version_resource(&exe)
}

fn readable_from_text_files(dir: &Path) -> Option<String> {
    VERSION_TEXT_FILES.iter().find_map(|name| {
        let content = read_prefix(&dir.join(name))?;
        version::extract_from_text(&content)
            .filter(|found| !version::is_build_id(found))
            .map(|found| version::clean(&found).unwrap_or(found))
    })
}

/// Display name recorded in the package's metadata file, if any.
pub fn detect_display_name(dir: &Path) -> Option<String> {
    let file_name = find_metadata_files(dir).into_iter().next()?;
    let content = read_prefix(&dir.join(file_name))?;
    NAME_FIELD
        .captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Read at most `METADATA_READ_LIMIT` bytes as lossy UTF-8.
fn read_prefix(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut bytes = Vec::new();
    file.take(METADATA_READ_LIMIT)
        .read_to_end(&mut bytes)
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INFO_WITH_BUILD: &str = r#"{
        "buildId": "49183726",
        "clientId": "50225266424144145",
        "gameId": "1207658924",
        "language": "English",
        "name": "Blade Runner",
        "version": 1,
        "versionName": "1.0.3.0 (gog-2)"
    }"#;

    fn package_dir(files: &[(&str, &[u8])]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn metadata_files_follow_naming_convention() {
        let dir = package_dir(&[
            ("goggame-1207658924.info", b"{}"),
            ("goggame-1207658924.hashdb", b""),
            ("goggame-abc.info", b""),
            ("readme.txt", b""),
        ]);
        assert_eq!(find_metadata_files(dir.path()), vec!["goggame-1207658924.info"]);
        assert_eq!(resolve_catalog_id(dir.path()).as_deref(), Some("1207658924"));
    }

    #[test]
    fn catalog_id_ignores_other_names() {
        assert_eq!(
            catalog_id_from_filename("GOGGAME-1450.info").as_deref(),
            Some("1450")
        );
        assert_eq!(catalog_id_from_filename("goggame-1450.ico"), None);
        assert_eq!(catalog_id_from_filename("mygoggame-1450.info"), None);
    }

    #[test]
    fn build_id_field_takes_priority() {
        let dir = package_dir(&[("goggame-1207658924.info", INFO_WITH_BUILD.as_bytes())]);
        let mut cache = MetadataCache::new();
        let detected = detect_build_id(dir.path(), &mut cache).unwrap();
        assert_eq!(detected.catalog_id, "1207658924");
        assert_eq!(detected.build_id, "49183726");
        assert!(!detected.from_catalog_id);
    }

    #[test]
    fn generic_build_field_and_key_value_text() {
        assert_eq!(
            build_id_from_text("build=51234567\nname=Thing").as_deref(),
            Some("51234567")
        );
        assert_eq!(build_id_from_text(r#""build": "1234""#), None);
    }

    #[test]
    fn falls_back_to_catalog_id_without_build_field() {
        let dir = package_dir(&[("goggame-1450.info", br#"{"name": "Thing"}"#)]);
        let mut cache = MetadataCache::new();
        let detected = detect_build_id(dir.path(), &mut cache).unwrap();
        assert_eq!(detected.build_id, "1450");
        assert!(detected.from_catalog_id);
    }

    #[test]
    fn no_metadata_means_no_build() {
        let dir = package_dir(&[("readme.txt", b"version=1.2.3")]);
        let mut cache = MetadataCache::new();
        assert!(detect_build_id(dir.path(), &mut cache).is_none());
    }

    #[test]
    fn build_results_are_cached_per_directory() {
        let dir = package_dir(&[("goggame-1207658924.info", INFO_WITH_BUILD.as_bytes())]);
        let mut cache = MetadataCache::new();
        let first = detect_build_id(dir.path(), &mut cache);
        fs::remove_file(dir.path().join("goggame-1207658924.info")).unwrap();
        let second = detect_build_id(dir.path(), &mut cache);
        assert_eq!(first, second);
        assert!(!cache.is_empty());
    }

    #[test]
    fn readable_version_skips_numeric_format_field() {
        assert_eq!(
            readable_version_from_text(INFO_WITH_BUILD).as_deref(),
            Some("1.0.3")
        );
    }

    #[test]
    fn readable_version_rejects_build_ids() {
        let text = r#"{"version": "49183726", "productVersion": "2.4.1"}"#;
        assert_eq!(readable_version_from_text(text).as_deref(), Some("2.4.1"));
    }

    #[test]
    fn readable_version_falls_back_to_text_file() {
        let dir = package_dir(&[
            ("goggame-1450.info", br#"{"name": "Thing"}"#),
            ("version.txt", b"Release v1.7.2\n"),
        ]);
        let mut cache = MetadataCache::new();
        assert_eq!(
            detect_readable_version(dir.path(), &mut cache).as_deref(),
            Some("1.7.2")
        );
    }

    #[test]
    fn readable_version_absent_is_none() {
        let dir = package_dir(&[("goggame-1450.info", br#"{"name": "Thing"}"#)]);
        let mut cache = MetadataCache::new();
        assert_eq!(detect_readable_version(dir.path(), &mut cache), None);
    }

    #[test]
    fn display_name_comes_from_metadata() {
        let dir = package_dir(&[("goggame-1207658924.info", INFO_WITH_BUILD.as_bytes())]);
        assert_eq!(detect_display_name(dir.path()).as_deref(), Some("Blade Runner"));
    }

    #[test]
    fn missing_directory_is_absorbed() {
        let mut cache = MetadataCache::new();
        let missing = Path::new("/definitely/not/here");
        assert!(find_metadata_files(missing).is_empty());
        assert!(detect_build_id(missing, &mut cache).is_none());
        assert!(detect_readable_version(missing, &mut cache).is_none());
    }
}
