/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Gog Core. Discovers installed GOG
    packages, checks each against the catalog, and emits a
    structured report of update classifications.

  Security / Safety Notes:
    Operates within user privileges. Executes `reg query` on
    Windows and performs HTTPS GET requests only.

  Dependencies:
    clap for CLI parsing, tokio for the worker task and
    Ctrl-C handling, chrono for session stamps.

  Operational Scope:
    Invoked by operators or front ends requiring a fresh
    report; progress is mirrored into the session log.

  Revision History:
    2025-11-02 COD  Authored Syn-Gog Core runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{ArgAction, Parser};
use tokio::sync::mpsc::unbounded_channel;

use syngog_core::catalog::CatalogClient;
use syngog_core::config::SyngogConfig;
use syngog_core::error::{Result, SyngogError};
use syngog_core::locator::PackageLocator;
use syngog_core::logger::Logger;
use syngog_core::orchestrator::{
    CancelFlag, FixedDelay, NoDelay, RateLimiter, ScanOrchestrator,
};
use syngog_core::package_info::{PackageRecord, ProgressSink, ScanEvent};
use syngog_core::report::{build_report, write_report, ScanStatistics};

/// Command-line arguments for Syn-Gog-Core.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Gog-Core",
    version,
    author = "Synavera Systems",
    about = "Build and version checker for installed GOG games"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override report output path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Search every volume instead of the quick root list.
    #[arg(long, action = ArgAction::SetTrue)]
    deep: bool,
    /// Discover packages without checking the catalog.
    #[arg(long, action = ArgAction::SetTrue)]
    scan_only: bool,
    /// Limit checking to specific packages (case-insensitive).
    #[arg(long = "package", value_name = "NAME", action = ArgAction::Append)]
    packages: Vec<String>,
    /// Skip the courtesy delay between catalog requests.
    #[arg(long, action = ArgAction::SetTrue)]
    no_delay: bool,
    /// Do not write the report; print the summary only.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Gog-Core] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = SyngogConfig::load_from_optional_path(cli.config.as_deref())?;
    let deep = cli.deep || config.scan.deep;
    let report_path = cli.report.clone().unwrap_or_else(|| config.report_path());

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("core_{session_stamp}.log")));
    let logger = Logger::new(Some(log_path), cli.verbose)?;
    logger.info("INIT", "Syn-Gog Core awakening.");

    let catalog = Arc::new(CatalogClient::new(&config.catalog)?);
    logger.info(
        "CATALOG",
        format!(
            "Catalog {} (target OS {})",
            config.catalog.base_url,
            catalog.target_os()
        ),
    );

    let (tx, mut rx) = unbounded_channel();
    let progress = ProgressSink::new(tx);
    let locator = PackageLocator::new(config.scan.extra_roots.clone(), progress.clone());
    let pacer: Arc<dyn RateLimiter> = if cli.no_delay {
        Arc::new(NoDelay)
    } else {
        Arc::new(FixedDelay(config.scan.request_delay()))
    };
    let cancel = CancelFlag::new();
    let orchestrator = ScanOrchestrator::new(catalog, locator, progress.clone())
        .with_rate_limiter(pacer)
        .with_cancel_flag(cancel.clone())
        .with_changelog(config.catalog.fetch_changelog);

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let requested = cli.packages.clone();
    let scan_only = cli.scan_only;
    let worker = tokio::spawn(async move {
        let discovered = match orchestrator.scan(deep).await {
            Ok(records) => records,
            Err(err) => {
                progress.line(format!("Error during scan: {err}"));
                progress.finished(0, false);
                return Err(err);
            }
        };
        let (selected, missing) = filter_packages(discovered, &requested);
        if scan_only {
            progress.finished(0, false);
            return Ok((selected, missing));
        }
        Ok((orchestrator.check_updates(selected).await, missing))
    });

    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::Progress(line) => logger.progress(line),
            ScanEvent::Record(record) => logger.debug(
                "RECORD",
                format!("{} → {}", record.name, record.update_status),
            ),
            ScanEvent::Finished { checked, cancelled } => {
                if cancelled {
                    logger.warn("CANCELLED", format!("Stopped after {checked} packages"));
                } else {
                    logger.info("FINISHED", format!("Checked {checked} packages"));
                }
            }
        }
    }

    let outcome = worker
        .await
        .map_err(|err| SyngogError::Runtime(format!("Scan worker failed: {err}")))?;
    let (records, missing) = match outcome {
        Ok(found) => found,
        Err(err) => {
            logger.error("DISCOVERY", format!("Discovery failed: {err}"));
            (Vec::new(), Vec::new())
        }
    };

    if !missing.is_empty() {
        logger.warn(
            "PKG404",
            format!("Requested packages not installed: {}", missing.join(", ")),
        );
    }
    if records.is_empty() {
        logger.warn("EMPTY", "No packages discovered or selected");
    }

    let document = build_report(&records, deep, &logger);
    if cli.dry_run {
        println!(
            "→ Report dry-run. Packages={} Updates={} Not in database={}",
            document.metadata.total_packages,
            document.metadata.updates_available,
            document.metadata.not_in_database
        );
    } else {
        write_report(&document, &report_path)?;
        logger.info(
            "REPORT",
            format!("Report written to {}", report_path.display()),
        );
    }

    let summary = ScanStatistics::from_records(&records).summary_line();
    println!("{summary}");
    logger.info("SUMMARY", summary);
    logger.info("COMPLETE", "Consciousness synchronised.");
    logger.finalize()?;

    Ok(ExitCode::SUCCESS)
}

/// Keep only requested packages (case-insensitive); report names not found.
fn filter_packages(
    mut discovered: Vec<PackageRecord>,
    requested: &[String],
) -> (Vec<PackageRecord>, Vec<String>) {
    if requested.is_empty() {
        return (discovered, Vec::new());
    }

    let wanted: HashSet<String> = requested.iter().map(|name| name.to_lowercase()).collect();
    discovered.retain(|record| wanted.contains(&record.dedup_key()));

    let found: HashSet<String> = discovered.iter().map(PackageRecord::dedup_key).collect();
    let mut missing: Vec<String> = requested
        .iter()
        .filter(|name| !found.contains(&name.to_lowercase()))
        .cloned()
        .collect();
    missing.sort();
    missing.dedup();
    (discovered, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_is_case_insensitive_and_reports_missing() {
        let discovered = vec![
            PackageRecord::new("Blade Runner", "", None),
            PackageRecord::new("Gothic", "", None),
        ];
        let (selected, missing) = filter_packages(
            discovered,
            &["blade runner".to_string(), "Arcanum".to_string()],
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Blade Runner");
        assert_eq!(missing, vec!["Arcanum".to_string()]);
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let discovered = vec![PackageRecord::new("Gothic", "", None)];
        let (selected, missing) = filter_packages(discovered, &[]);
        assert_eq!(selected.len(), 1);
        assert!(missing.is_empty());
    }
}
