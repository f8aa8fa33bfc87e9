/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::orchestrator
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Sequence discovery, per-package metadata detection,
    catalog lookup, local fallback tiers and classification,
    emitting progress as each package completes.

  Security / Safety Notes:
    Packages are processed strictly one at a time with a
    courtesy delay between catalog requests.

  Dependencies:
    tokio for the inter-package delay, async-trait catalog
    seam for injection.

  Operational Scope:
    Runs on a single worker task spawned by the binary or any
    other front end; results flow out through ProgressSink.

  Revision History:
    2025-11-02 COD  Authored scan orchestrator.
  ------------------------------------------------------------
  SSE Principles Observed:
    - One bad package never halts the batch
    - Cooperative cancellation between packages
    - Injectable pacing policy for deterministic tests
============================================================*/

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::catalog::{Catalog, CatalogRelease};
use crate::classifier::{self, LookupOutcome};
use crate::error::{LookupError, Result};
use crate::locator::PackageLocator;
use crate::metadata::{self, MetadataCache};
use crate::package_info::{
    PackageRecord, ProgressSink, UpdateStatus, DEFAULT_TAGS, NO_READABLE_VERSION, UNKNOWN,
};

const CHANGELOG_UNAVAILABLE: &str = "Changelog not available";

/// Pacing policy applied between consecutive catalog lookups.
pub trait RateLimiter: Send + Sync {
    fn delay(&self) -> Option<Duration>;
}

/// Sleep a fixed duration between packages.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl RateLimiter for FixedDelay {
    fn delay(&self) -> Option<Duration> {
        (!self.0.is_zero()).then_some(self.0)
    }
}

/// No pacing at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl RateLimiter for NoDelay {
    fn delay(&self) -> Option<Duration> {
        None
    }
}

/// Shared flag checked between packages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives one scan-then-classify pipeline.
pub struct ScanOrchestrator {
    catalog: Arc<dyn Catalog>,
    locator: PackageLocator,
    pacer: Arc<dyn RateLimiter>,
    progress: ProgressSink,
    cancel: CancelFlag,
    fetch_changelog: bool,
}

impl ScanOrchestrator {
    pub fn new(catalog: Arc<dyn Catalog>, locator: PackageLocator, progress: ProgressSink) -> Self {
        Self {
            catalog,
            locator,
            pacer: Arc::new(NoDelay),
            progress,
            cancel: CancelFlag::new(),
            fetch_changelog: true,
        }
    }

    pub fn with_rate_limiter(mut self, pacer: Arc<dyn RateLimiter>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_changelog(mut self, enabled: bool) -> Self {
        self.fetch_changelog = enabled;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Discover installed packages. A fresh result set on every call.
    pub async fn scan(&self, deep: bool) -> Result<Vec<PackageRecord>> {
        self.progress.line(if deep {
            "Starting deep game scan..."
        } else {
            "Starting game scan..."
        });
        let records = self.locator.find_all(deep).await?;
        self.progress
            .line(format!("Scan completed! Found {} games", records.len()));
        Ok(records)
    }

    /// Discover then check every package; discovery failure yields an empty set.
    pub async fn run(&self, deep: bool) -> Vec<PackageRecord> {
        match self.scan(deep).await {
            Ok(records) => self.check_updates(records).await,
            Err(err) => {
                self.progress.line(format!("Error during scan: {err}"));
                self.progress.finished(0, false);
                Vec::new()
            }
        }
    }

    /// Check packages sequentially in discovery order.
    ///
    /// Packages left unprocessed after cancellation are returned unchecked.
    pub async fn check_updates(&self, records: Vec<PackageRecord>) -> Vec<PackageRecord> {
        self.progress.line("Starting version checking...");
        let mut cache = MetadataCache::new();
        let total = records.len();
        let mut results = Vec::with_capacity(total);
        let mut pending = records.into_iter();
        let mut checked = 0usize;
        let mut cancelled = false;

        while let Some(mut record) = pending.next() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                results.push(record);
                break;
            }

            self.check_package(&mut record, &mut cache).await;
            checked += 1;
            self.progress.record(&record);
            results.push(record);

            if checked < total {
                if let Some(delay) = self.pacer.delay() {
                    sleep(delay).await;
                }
            }
        }
        results.extend(pending);

        if cancelled {
            self.progress
                .line(format!("Version check cancelled after {checked} of {total} games"));
        } else {
            self.progress.line("Version check completed!");
        }
        self.progress.finished(checked, cancelled);
        results
    }

    /// Detect, look up and classify a single package in place.
    pub async fn check_package(&self, record: &mut PackageRecord, cache: &mut MetadataCache) {
        self.progress.line(format!("Checking: {}", record.name));

        let install_dir = record
            .has_install_path()
            .then(|| Path::new(&record.install_path).to_path_buf())
            .filter(|dir| dir.is_dir());

        match install_dir
            .as_deref()
            .and_then(|dir| metadata::detect_build_id(dir, cache))
        {
            Some(detected) => {
                let kind = if detected.from_catalog_id {
                    "catalog ID"
                } else {
                    "Build ID"
                };
                self.progress
                    .line(format!("   Found {kind}: {}", detected.build_id));
                record.installed_version = detected.build_id;
                record.catalog_id = Some(detected.catalog_id);
            }
            None => self
                .progress
                .line("   Could not detect version/build ID"),
        }

        record.readable_version = install_dir
            .as_deref()
            .and_then(|dir| metadata::detect_readable_version(dir, cache))
            .unwrap_or_else(|| NO_READABLE_VERSION.to_string());

        let outcome = self.lookup(record).await;
        self.apply_details(record, &outcome).await;
        let status = classifier::classify(record, &outcome);
        self.progress.line(format!(
            "   {status}: installed {} / latest {}",
            record.installed_version, record.latest_version
        ));
        self.progress
            .line(format!("   Completed check for {}", record.name));
    }

    /// Catalog lookup with the local fallback tiers applied on failure.
    async fn lookup(&self, record: &PackageRecord) -> LookupOutcome {
        let Some(catalog_id) = record.catalog_id.as_deref() else {
            self.progress
                .line("   No catalog ID available; skipping catalog lookup");
            return LookupOutcome::Failed(LookupError::NoCatalogId);
        };

        self.progress
            .line(format!("   Querying catalog for ID {catalog_id}"));
        let err = match self.catalog.fetch_latest_build(catalog_id).await {
            Ok(release) => {
                self.log_release(&release);
                return LookupOutcome::CatalogHit(release);
            }
            Err(err) => err,
        };

        match &err {
            LookupError::NotFound { catalog_id } => self
                .progress
                .line(format!("   Catalog ID {catalog_id} not found in catalog")),
            other => self.progress.line(format!("   Catalog lookup failed: {other}")),
        }

        let reference = record.installed_version.clone();
        if classifier::is_dlc(&record.name) {
            let base_game = classifier::base_game_name(&record.name).to_string();
            self.progress.line(format!(
                "   Detected DLC/Expansion: {} -> Base game: {base_game}",
                record.name
            ));
            LookupOutcome::LocalDetection {
                reference,
                base_game,
            }
        } else {
            self.progress
                .line(format!("   Using local build ID as reference: {reference}"));
            LookupOutcome::LocalFallback { reference }
        }
    }

    fn log_release(&self, release: &CatalogRelease) {
        if !release.has_builds() {
            self.progress.line(format!(
                "   Catalog returned no builds for ID {}",
                release.catalog_id
            ));
            return;
        }
        self.progress.line(format!(
            "   Found {} builds, latest: {}",
            release.build_count,
            release.build_id.as_deref().unwrap_or(UNKNOWN)
        ));
        if release.os_fallback {
            self.progress
                .line("   No build for this OS; using newest build overall");
        }
    }

    /// Fill tags, changelog and remote readable version from the outcome.
    async fn apply_details(&self, record: &mut PackageRecord, outcome: &LookupOutcome) {
        match outcome {
            LookupOutcome::CatalogHit(release) => {
                record.tags = release.tags.clone();
                record.latest_readable_version = release.readable_version.clone();
                record.changelog = self.release_changelog(record, release).await;
            }
            LookupOutcome::LocalDetection {
                reference,
                base_game,
            } => {
                record.tags = DEFAULT_TAGS.to_string();
                record.changelog = format!(
                    "DLC/Expansion for {base_game}\n\nNote: DLCs typically share the same build ID \
                     as the base game. No separate version checking available for individual \
                     DLCs.\n\nInstalled Build ID: {reference}"
                );
            }
            LookupOutcome::LocalFallback { reference } => {
                record.tags = DEFAULT_TAGS.to_string();
                record.changelog = format!(
                    "Build ID: {reference}\n\nNote: Unable to fetch version information from the \
                     catalog. The game may not be indexed yet or the service may be unavailable.\n\n\
                     Your installed build ID is being used as reference."
                );
            }
            LookupOutcome::Failed(_) => {
                record.tags = DEFAULT_TAGS.to_string();
                record.changelog = CHANGELOG_UNAVAILABLE.to_string();
            }
        }
    }

    async fn release_changelog(&self, record: &PackageRecord, release: &CatalogRelease) -> String {
        if !release.has_builds() {
            return "No builds recorded in catalog".to_string();
        }
        if self.fetch_changelog {
            if let Some(notes) = self.catalog.fetch_changelog(&release.catalog_id).await {
                return format!("📄 Release Notes from GOGDB:\n\n{notes}");
            }
        }

        let mut text = format!(
            "Build ID: {}",
            release.build_id.as_deref().unwrap_or(UNKNOWN)
        );
        if let Some(readable) = &release.readable_version {
            text.push_str(&format!("\nVersion: {readable}"));
        }
        if classifier::is_dlc(&record.name) {
            text.push_str(&format!(
                "\n\nNote: This DLC/Expansion shares the build ID with the base game '{}'",
                classifier::base_game_name(&record.name)
            ));
        }
        text
    }
}

/// Count records with the given status.
pub fn count_status(records: &[PackageRecord], status: UpdateStatus) -> usize {
    records
        .iter()
        .filter(|record| record.update_status == status)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_info::{LatestSource, ScanEvent};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Default)]
    struct FakeCatalog {
        releases: HashMap<String, std::result::Result<CatalogRelease, LookupError>>,
        notes: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        fn with(mut self, id: &str, result: std::result::Result<CatalogRelease, LookupError>) -> Self {
            self.releases.insert(id.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn fetch_latest_build(
            &self,
            catalog_id: &str,
        ) -> std::result::Result<CatalogRelease, LookupError> {
            self.calls.lock().unwrap().push(catalog_id.to_string());
            self.releases
                .get(catalog_id)
                .cloned()
                .unwrap_or(Err(LookupError::NotFound {
                    catalog_id: catalog_id.to_string(),
                }))
        }

        async fn fetch_changelog(&self, catalog_id: &str) -> Option<String> {
            self.notes.get(catalog_id).cloned()
        }
    }

    fn release(id: &str, latest: &str) -> CatalogRelease {
        CatalogRelease {
            catalog_id: id.into(),
            latest_version: latest.into(),
            build_id: Some(latest.into()),
            readable_version: Some("1.0.4".into()),
            tags: "Adventure".into(),
            build_count: 2,
            os_fallback: false,
        }
    }

    fn install(root: &Path, folder: &str, id: &str, build: &str) -> PackageRecord {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("goggame-{id}.info")),
            format!(r#"{{"buildId": "{build}", "name": "{folder}", "versionName": "1.0.3"}}"#),
        )
        .unwrap();
        fs::write(dir.join("Game.exe"), b"MZ").unwrap();
        PackageRecord::new(folder, folder, Some(dir.to_string_lossy().into_owned()))
    }

    fn orchestrator(catalog: FakeCatalog) -> ScanOrchestrator {
        ScanOrchestrator::new(
            Arc::new(catalog),
            PackageLocator::default(),
            ProgressSink::silent(),
        )
    }

    #[tokio::test]
    async fn catalog_hit_with_newer_build() {
        let root = TempDir::new().unwrap();
        let rec = install(root.path(), "Blade Runner", "1207658924", "49183726");
        let catalog =
            FakeCatalog::default().with("1207658924", Ok(release("1207658924", "49183999")));

        let results = orchestrator(catalog).check_updates(vec![rec]).await;
        let rec = &results[0];
        assert_eq!(rec.installed_version, "49183726");
        assert_eq!(rec.readable_version, "1.0.3");
        assert_eq!(rec.latest_version, "49183999");
        assert_eq!(rec.latest_readable_version.as_deref(), Some("1.0.4"));
        assert_eq!(rec.update_status, UpdateStatus::UpdateAvailable);
        assert_eq!(rec.source, LatestSource::Catalog);
        assert_eq!(rec.tags, "Adventure");
        assert!(rec.changelog.starts_with("Build ID: 49183999"));
    }

    #[tokio::test]
    async fn fetched_release_notes_are_used() {
        let root = TempDir::new().unwrap();
        let rec = install(root.path(), "Blade Runner", "1207658924", "49183726");
        let mut catalog =
            FakeCatalog::default().with("1207658924", Ok(release("1207658924", "49183726")));
        catalog
            .notes
            .insert("1207658924".into(), "Fixed things.".into());

        let results = orchestrator(catalog).check_updates(vec![rec]).await;
        assert_eq!(results[0].update_status, UpdateStatus::UpToDate);
        assert_eq!(
            results[0].changelog,
            "📄 Release Notes from GOGDB:\n\nFixed things."
        );
    }

    #[tokio::test]
    async fn timeout_falls_back_to_local_reference() {
        let root = TempDir::new().unwrap();
        let rec = install(root.path(), "Blade Runner", "1207658924", "49183726");
        let catalog = FakeCatalog::default().with("1207658924", Err(LookupError::Timeout));

        let results = orchestrator(catalog).check_updates(vec![rec]).await;
        let rec = &results[0];
        assert_eq!(rec.source, LatestSource::LocalFallback);
        assert_eq!(rec.update_status, UpdateStatus::LocalReferenceOnly);
        assert_eq!(rec.latest_version, rec.installed_version);
    }

    #[tokio::test]
    async fn dlc_failure_uses_local_detection() {
        let root = TempDir::new().unwrap();
        let rec = install(
            root.path(),
            "Cyberpunk 2077 - Phantom Liberty",
            "1256837418",
            "49183726",
        );
        let results = orchestrator(FakeCatalog::default())
            .check_updates(vec![rec])
            .await;
        let rec = &results[0];
        assert_eq!(rec.source, LatestSource::LocalDetection);
        assert_eq!(rec.update_status, UpdateStatus::DlcBaseGameReference);
        assert!(rec.changelog.contains("DLC/Expansion for Cyberpunk 2077"));
    }

    #[tokio::test]
    async fn no_metadata_and_no_catalog_id() {
        let root = TempDir::new().unwrap();
        let rec = PackageRecord::new(
            "Mystery",
            "Mystery",
            Some(root.path().to_string_lossy().into_owned()),
        );
        let catalog = FakeCatalog::default();
        let orchestrator = orchestrator(catalog);
        let results = orchestrator.check_updates(vec![rec]).await;
        let rec = &results[0];
        assert_eq!(rec.installed_version, UNKNOWN);
        assert_eq!(rec.readable_version, NO_READABLE_VERSION);
        assert_eq!(rec.update_status, UpdateStatus::NoInstalledVersion);
    }

    #[tokio::test]
    async fn registry_version_without_catalog_id_is_not_in_database() {
        let mut rec = PackageRecord::new("Old Game", "Old Game", None);
        rec.installed_version = "1.2".into();
        let results = orchestrator(FakeCatalog::default())
            .check_updates(vec![rec])
            .await;
        assert_eq!(results[0].update_status, UpdateStatus::NotInDatabase);
        assert_eq!(results[0].latest_version, UNKNOWN);
        assert_eq!(results[0].changelog, CHANGELOG_UNAVAILABLE);
    }

    #[tokio::test]
    async fn events_stream_records_then_finish() {
        let root = TempDir::new().unwrap();
        let first = install(root.path(), "Alpha", "1000000001", "51000001");
        let second = install(root.path(), "Beta", "1000000002", "51000002");
        let catalog = FakeCatalog::default()
            .with("1000000001", Ok(release("1000000001", "51000001")))
            .with("1000000002", Ok(release("1000000002", "51000009")));
        let (tx, mut rx) = unbounded_channel();
        let orchestrator = ScanOrchestrator::new(
            Arc::new(catalog),
            PackageLocator::default(),
            ProgressSink::new(tx),
        )
        .with_rate_limiter(Arc::new(FixedDelay(Duration::from_millis(1))));

        orchestrator.check_updates(vec![first, second]).await;

        let mut records = Vec::new();
        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                ScanEvent::Record(record) => records.push(record.name),
                ScanEvent::Finished { checked, cancelled } => finished = Some((checked, cancelled)),
                ScanEvent::Progress(_) => {}
            }
        }
        assert_eq!(records, vec!["Alpha".to_string(), "Beta".to_string()]);
        assert_eq!(finished, Some((2, false)));
    }

    #[tokio::test]
    async fn cancellation_stops_between_packages() {
        let root = TempDir::new().unwrap();
        let first = install(root.path(), "Alpha", "1000000001", "51000001");
        let second = install(root.path(), "Beta", "1000000002", "51000002");
        let catalog = Arc::new(FakeCatalog::default());
        let orchestrator = ScanOrchestrator::new(
            catalog.clone(),
            PackageLocator::default(),
            ProgressSink::silent(),
        );
        orchestrator.cancel_flag().cancel();

        let results = orchestrator.check_updates(vec![first, second]).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_checked()));
        assert!(catalog.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn pacing_policies() {
        assert_eq!(NoDelay.delay(), None);
        assert_eq!(FixedDelay(Duration::ZERO).delay(), None);
        assert_eq!(
            FixedDelay(Duration::from_millis(5)).delay(),
            Some(Duration::from_millis(5))
        );
    }
}
