/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Version detection and update classification engine for
    GOG installations: discovery, metadata extraction, catalog
    lookup, classification and reporting.

  Security / Safety Notes:
    Read-only with respect to installations; network access is
    limited to HTTPS GET requests against the catalog.

  Dependencies:
    See Cargo.toml; each module documents its own.

  Operational Scope:
    Linked by the `syn-gog-core` binary and by any front end
    that consumes ScanEvent streams.

  Revision History:
    2025-11-02 COD  Exposed engine modules as a library.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Library code reports, binaries decide
============================================================*/

pub mod catalog;
pub mod changelog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executable;
pub mod locator;
pub mod logger;
pub mod metadata;
pub mod orchestrator;
pub mod package_info;
pub mod report;
pub mod version;
