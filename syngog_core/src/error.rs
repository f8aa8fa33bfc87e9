/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Gog-Core error types to provide consistent
    diagnostics and exit semantics, and define the lookup
    failure taxonomy consumed by the local fallback tiers.

  Security / Safety Notes:
    Error contexts expose catalog ids and high-level paths
    only; no request headers or payloads are echoed.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2025-11-02 COD  Split catalog lookup failures from runtime errors.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Gog-Core operations.
pub type Result<T> = std::result::Result<T, SyngogError>;

/// Enumerates high-level error domains surfaced by Syn-Gog-Core.
#[derive(Debug, Error)]
pub enum SyngogError {
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Discovery: {0}")]
    Discovery(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SyngogError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SyngogError::CommandMissing { .. } => ExitCode::from(10),
            SyngogError::CommandFailure { .. } => ExitCode::from(11),
            SyngogError::Config(_) => ExitCode::from(20),
            SyngogError::Network(_) => ExitCode::from(30),
            SyngogError::Serialization(_) => ExitCode::from(31),
            SyngogError::Filesystem(_) => ExitCode::from(40),
            SyngogError::Io(_) => ExitCode::from(41),
            SyngogError::Discovery(_) => ExitCode::from(42),
            SyngogError::Runtime(_) => ExitCode::from(50),
        }
    }
}

/// Failure of a single remote catalog lookup.
///
/// Every variant leads to the same local fallback path; the distinction only
/// matters for the progress log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("catalog id {catalog_id} not present in catalog")]
    NotFound { catalog_id: String },
    #[error("catalog responded with HTTP {status}")]
    Http { status: u16 },
    #[error("catalog request timed out")]
    Timeout,
    #[error("catalog network error: {0}")]
    Network(String),
    #[error("malformed catalog response: {0}")]
    Malformed(String),
    #[error("no catalog id available for lookup")]
    NoCatalogId,
}

impl LookupError {
    /// Classify a transport-level reqwest failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else if let Some(status) = err.status() {
            LookupError::Http {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            LookupError::Malformed(err.to_string())
        } else {
            LookupError::Network(err.to_string())
        }
    }
}
