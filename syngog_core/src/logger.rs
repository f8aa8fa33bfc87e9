/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Provide structured, append-only logging for Syn-Gog-Core
    runs, including mirrored scan progress lines.

  Security / Safety Notes:
    Log lines carry install paths and catalog ids only; no
    credentials pass through the engine.

  Dependencies:
    chrono for UTC stamps, sha2 for session digests.

  Operational Scope:
    Owned by the binary entry point; library code reports via
    ProgressSink and never writes to the log directly.

  Revision History:
    2025-11-02 COD  Adapted session logger for Syn-Gog-Core.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SyngogError};

/// Structured log level for Syn-Gog-Core events.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }

    fn always_echoed(self) -> bool {
        matches!(self, LogLevel::Warn | LogLevel::Error)
    }
}

/// Session logger writing to stderr and optionally to a file.
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    verbose: bool,
}

impl Logger {
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = match &path {
            Some(file_path) => Some(Mutex::new(BufWriter::new(open_append(file_path)?))),
            None => None,
        };
        Ok(Self {
            file,
            path,
            verbose,
        })
    }

    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let payload = format!("{timestamp} [{}] [{code}] {}", level.as_str(), message.as_ref());

        if self.verbose || level.always_echoed() {
            eprintln!("{payload}");
        }

        let Some(file) = &self.file else {
            return;
        };
        if let Ok(mut guard) = file.lock() {
            if writeln!(guard, "{payload}").is_err() {
                eprintln!("{timestamp} [ERROR] [LOGGER] Failed to write to log file");
            }
            if guard.flush().is_err() {
                eprintln!("{timestamp} [WARN] [LOGGER] Failed to flush log writer");
            }
        }
    }

    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Mirror an engine progress line under the `PROGRESS` code.
    pub fn progress<S: AsRef<str>>(&self, message: S) {
        self.log(LogLevel::Info, "PROGRESS", message.as_ref().trim_end());
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Compute and persist the SHA-256 digest of the log file as `<log>.hash`.
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        if let Some(file) = &self.file {
            if let Ok(mut guard) = file.lock() {
                if guard.flush().is_err() {
                    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                    eprintln!("{timestamp} [WARN] [LOGGER] Failed to flush log writer before hashing");
                }
            }
        }
        let data = std::fs::read(path).map_err(|err| {
            SyngogError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);

        let hash_path = hash_path_for(path);
        let mut file = File::create(&hash_path).map_err(|err| {
            SyngogError::Filesystem(format!(
                "Failed to create hash file {}: {err}",
                hash_path.display()
            ))
        })?;
        writeln!(
            file,
            "{digest:x}  {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        )
        .map_err(|err| {
            SyngogError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            SyngogError::Filesystem(format!(
                "Failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            SyngogError::Filesystem(format!(
                "Failed to open log file {}: {err}",
                path.display()
            ))
        })
}

fn hash_path_for(path: &Path) -> PathBuf {
    let mut hash_os = path.as_os_str().to_os_string();
    hash_os.push(".hash");
    PathBuf::from(hash_os)
}
