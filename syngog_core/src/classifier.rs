/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::classifier
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Classify an installed package against the outcome of its
    catalog lookup, including DLC packages that share their
    base game's build id.

  Security / Safety Notes:
    Pure decision logic; no I/O performed in this module.

  Dependencies:
    None beyond crate modules.

  Operational Scope:
    Invoked by the orchestrator exactly once per package per
    update check.

  Revision History:
    2025-11-02 COD  Authored update classifier.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Exhaustive match over lookup outcomes
    - Build ids compared numerically only against build ids
============================================================*/

use std::cmp::Ordering;

use crate::catalog::CatalogRelease;
use crate::error::LookupError;
use crate::package_info::{LatestSource, PackageRecord, UpdateStatus, UNKNOWN};
use crate::version;

/// Substrings (lowercase) that mark a package name as DLC or expansion.
const DLC_MARKERS: [&str; 5] = [" - ", ": ", " dlc", " expansion", " pack"];
const BASE_NAME_SEPARATORS: [&str; 2] = [" - ", ": "];

/// Result of resolving a package's latest version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The catalog answered (possibly with an empty build history).
    CatalogHit(CatalogRelease),
    /// DLC without catalog data; the installed id stands in as reference.
    LocalDetection { reference: String, base_game: String },
    /// Non-DLC without catalog data; the installed id stands in as reference.
    LocalFallback { reference: String },
    /// No data at all.
    Failed(LookupError),
}

impl LookupOutcome {
    pub fn source(&self) -> LatestSource {
        match self {
            LookupOutcome::CatalogHit(_) => LatestSource::Catalog,
            LookupOutcome::LocalDetection { .. } => LatestSource::LocalDetection,
            LookupOutcome::LocalFallback { .. } => LatestSource::LocalFallback,
            LookupOutcome::Failed(_) => LatestSource::Unknown,
        }
    }

    fn latest_version(&self) -> &str {
        match self {
            LookupOutcome::CatalogHit(release) => &release.latest_version,
            LookupOutcome::LocalDetection { reference, .. }
            | LookupOutcome::LocalFallback { reference } => reference,
            LookupOutcome::Failed(_) => UNKNOWN,
        }
    }
}

/// True if `name` looks like a DLC or expansion.
pub fn is_dlc(name: &str) -> bool {
    let lowered = name.to_lowercase();
    DLC_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Text before ` - ` if present, else before `: `, else the whole name.
pub fn base_game_name(name: &str) -> &str {
    BASE_NAME_SEPARATORS
        .iter()
        .find_map(|sep| name.split_once(sep))
        .map(|(base, _)| base.trim())
        .unwrap_or(name)
}

/// Apply `outcome` to `record`, setting status, source and latest version.
pub fn classify(record: &mut PackageRecord, outcome: &LookupOutcome) -> UpdateStatus {
    record.source = outcome.source();
    record.latest_version = outcome.latest_version().to_string();

    let status = decide(record, outcome);
    record.update_status = status;
    status
}

fn decide(record: &mut PackageRecord, outcome: &LookupOutcome) -> UpdateStatus {
    if record.installed_version == UNKNOWN {
        return UpdateStatus::NoInstalledVersion;
    }

    let local_reference = match outcome {
        LookupOutcome::Failed(_) => {
            record.latest_version = UNKNOWN.to_string();
            return UpdateStatus::NotInDatabase;
        }
        LookupOutcome::CatalogHit(_) => false,
        LookupOutcome::LocalDetection { .. } | LookupOutcome::LocalFallback { .. } => true,
    };

    if record.latest_version == UNKNOWN {
        return UpdateStatus::NoLatestVersion;
    }

    if local_reference {
        // Both sides are reference values; never display a mismatch.
        if record.installed_version != record.latest_version {
            record.latest_version = record.installed_version.clone();
        }
        return if is_dlc(&record.name) {
            UpdateStatus::DlcBaseGameReference
        } else {
            UpdateStatus::LocalReferenceOnly
        };
    }

    if record.installed_version == record.latest_version {
        return UpdateStatus::UpToDate;
    }

    match version::compare_build_ids(&record.installed_version, &record.latest_version) {
        Some(Ordering::Less) => UpdateStatus::UpdateAvailable,
        Some(Ordering::Greater) => UpdateStatus::NewerVersionInstalled,
        Some(Ordering::Equal) => UpdateStatus::UpToDate,
        None => UpdateStatus::DifferentVersion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, installed: &str) -> PackageRecord {
        let mut record = PackageRecord::new(name, name, Some("C:/Games/x".into()));
        record.installed_version = installed.to_string();
        record
    }

    fn hit(latest: &str) -> LookupOutcome {
        LookupOutcome::CatalogHit(CatalogRelease {
            catalog_id: "1207658924".into(),
            latest_version: latest.into(),
            build_id: Some(latest.into()),
            readable_version: None,
            tags: "🎮".into(),
            build_count: usize::from(latest != UNKNOWN),
            os_fallback: false,
        })
    }

    #[test]
    fn older_build_has_update() {
        let mut rec = record("Blade Runner", "49183726");
        assert_eq!(classify(&mut rec, &hit("49183999")), UpdateStatus::UpdateAvailable);
        assert_eq!(rec.source, LatestSource::Catalog);
        assert_eq!(rec.latest_version, "49183999");
    }

    #[test]
    fn same_build_is_up_to_date() {
        let mut rec = record("Blade Runner", "49183726");
        assert_eq!(classify(&mut rec, &hit("49183726")), UpdateStatus::UpToDate);
    }

    #[test]
    fn newer_build_installed() {
        let mut rec = record("Blade Runner", "49184000");
        assert_eq!(
            classify(&mut rec, &hit("49183726")),
            UpdateStatus::NewerVersionInstalled
        );
    }

    #[test]
    fn mixed_identifier_kinds_are_different() {
        let mut rec = record("Blade Runner", "1.0.3");
        assert_eq!(classify(&mut rec, &hit("49183726")), UpdateStatus::DifferentVersion);
        let mut rec = record("Blade Runner", "1.0.3");
        assert_eq!(classify(&mut rec, &hit("1.0.4")), UpdateStatus::DifferentVersion);
    }

    #[test]
    fn dlc_reference_for_local_detection() {
        let name = "Cyberpunk 2077: Phantom Liberty";
        let mut rec = record(name, "49183726");
        let outcome = LookupOutcome::LocalDetection {
            reference: "49183726".into(),
            base_game: base_game_name(name).into(),
        };
        assert_eq!(classify(&mut rec, &outcome), UpdateStatus::DlcBaseGameReference);
        assert_eq!(rec.source, LatestSource::LocalDetection);
        assert_eq!(base_game_name(name), "Cyberpunk 2077");
    }

    #[test]
    fn local_mismatch_overwrites_latest() {
        let mut rec = record("Blade Runner", "49183726");
        let outcome = LookupOutcome::LocalFallback {
            reference: "1207658924".into(),
        };
        assert_eq!(classify(&mut rec, &outcome), UpdateStatus::LocalReferenceOnly);
        assert_eq!(rec.latest_version, "49183726");
        assert_eq!(rec.source, LatestSource::LocalFallback);
    }

    #[test]
    fn unknown_installed_wins_over_everything() {
        let mut rec = record("Blade Runner", UNKNOWN);
        let failed = LookupOutcome::Failed(LookupError::NoCatalogId);
        assert_eq!(classify(&mut rec, &failed), UpdateStatus::NoInstalledVersion);
        let mut rec = record("Blade Runner", UNKNOWN);
        assert_eq!(classify(&mut rec, &hit("49183726")), UpdateStatus::NoInstalledVersion);
    }

    #[test]
    fn failure_is_not_in_database() {
        let mut rec = record("Blade Runner", "49183726");
        let failed = LookupOutcome::Failed(LookupError::Timeout);
        assert_eq!(classify(&mut rec, &failed), UpdateStatus::NotInDatabase);
        assert_eq!(rec.latest_version, UNKNOWN);
    }

    #[test]
    fn empty_history_cannot_check() {
        let mut rec = record("Blade Runner", "49183726");
        assert_eq!(classify(&mut rec, &hit(UNKNOWN)), UpdateStatus::NoLatestVersion);
    }

    #[test]
    fn every_combination_is_classified() {
        let installed = [UNKNOWN, "49183726", "1.2.3"];
        let latest = [UNKNOWN, "same", "49999999", "2.0.1"];
        let names = ["Blade Runner", "Blade Runner - Soundtrack"];
        for name in names {
            for inst in installed {
                for lat in latest {
                    let lat = if lat == "same" { inst } else { lat };
                    let outcomes = [
                        hit(lat),
                        LookupOutcome::LocalDetection {
                            reference: lat.into(),
                            base_game: base_game_name(name).into(),
                        },
                        LookupOutcome::LocalFallback {
                            reference: lat.into(),
                        },
                        LookupOutcome::Failed(LookupError::Http { status: 500 }),
                    ];
                    for outcome in outcomes {
                        let mut rec = record(name, inst);
                        let status = classify(&mut rec, &outcome);
                        assert_ne!(status, UpdateStatus::NotChecked);
                        assert!(rec.is_checked());
                        if inst != UNKNOWN
                            && matches!(
                                outcome,
                                LookupOutcome::LocalDetection { .. }
                                    | LookupOutcome::LocalFallback { .. }
                            )
                            && lat != UNKNOWN
                        {
                            assert_eq!(rec.latest_version, rec.installed_version);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn dlc_heuristics() {
        assert!(is_dlc("The Witcher 3 - Hearts of Stone"));
        assert!(is_dlc("Stellaris: Utopia"));
        assert!(is_dlc("Some Game DLC"));
        assert!(is_dlc("Pillars of Eternity Expansion Pass"));
        assert!(is_dlc("Cities Skylines Content Pack"));
        assert!(!is_dlc("Blade Runner"));
        assert!(!is_dlc("Packman"));
        assert_eq!(base_game_name("A: B - C"), "A: B");
        assert_eq!(
            base_game_name("Warhammer 40,000: Dawn of War - Soulstorm"),
            "Warhammer 40,000: Dawn of War"
        );
        assert_eq!(base_game_name("Stellaris: Utopia"), "Stellaris");
        assert_eq!(base_game_name("Some Game DLC"), "Some Game DLC");
    }
}
