/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::executable
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Select a package's primary executable and read the fixed
    version block embedded in Windows PE version resources.

  Security / Safety Notes:
    Executables are only read, never launched. Reads are
    capped so oversized binaries cannot stall a scan.

  Dependencies:
    std only.

  Operational Scope:
    Used by the locator to confirm package roots and by the
    metadata extractor as a readable-version fallback.

  Revision History:
    2025-11-02 COD  Added PE fixed-file-info reader.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Every read failure degrades to "not found"
    - Bounded I/O on untrusted files
============================================================*/

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::version;

/// Filename prefixes that mark helper binaries rather than the game itself.
const EXCLUDED_PREFIXES: [&str; 6] = ["unins", "setup", "install", "crash", "error", "redist"];
/// Native launchers shipped by Linux installers.
const NATIVE_LAUNCHERS: [&str; 1] = ["start.sh"];

/// `VS_FIXEDFILEINFO.dwSignature`, little endian.
const FIXED_INFO_SIGNATURE: [u8; 4] = [0xBD, 0x04, 0xEF, 0xFE];
const FIXED_INFO_LEN: usize = 24;
const READ_CHUNK: usize = 256 * 1024;
const MAX_SCAN_BYTES: u64 = 96 * 1024 * 1024;

/// Return the first plausible game executable in `dir`, in name order.
pub fn find_primary_executable(dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| is_primary_executable(path))
        .collect();
    candidates.sort();
    candidates
        .iter()
        .find(|path| has_extension(path, "exe"))
        .or_else(|| candidates.first())
        .cloned()
}

fn is_primary_executable(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lowered = file_name.to_ascii_lowercase();
    if NATIVE_LAUNCHERS.contains(&lowered.as_str()) {
        return true;
    }
    has_extension(path, "exe") && !EXCLUDED_PREFIXES.iter().any(|p| lowered.starts_with(p))
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Read the product (else file) version from a PE's fixed version block.
///
/// Returns a cleaned dotted version, or `None` when the file has no
/// version resource, every field is zero, or the file is not a PE image.
pub fn read_version_resource(path: &Path) -> Option<String> {
    if !has_extension(path, "exe") {
        return None;
    }
    let mut file = File::open(path).ok()?;
    let mut header = [0u8; 2];
    file.read_exact(&mut header).ok()?;
    if &header != b"MZ" {
        return None;
    }

    let block = find_fixed_info(&mut file)?;
    let product = quad_version(read_u32(&block, 16), read_u32(&block, 20));
    let file_version = quad_version(read_u32(&block, 8), read_u32(&block, 12));
    [product, file_version]
        .into_iter()
        .flatten()
        .find_map(|raw| version::clean(&raw))
}

fn find_fixed_info<R: Read>(reader: &mut R) -> Option<[u8; FIXED_INFO_LEN]> {
    let mut window: Vec<u8> = Vec::with_capacity(READ_CHUNK + FIXED_INFO_LEN);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut scanned: u64 = 0;

    while scanned < MAX_SCAN_BYTES {
        let read = reader.read(&mut chunk).ok()?;
        if read == 0 {
            break;
        }
        scanned += read as u64;
        window.extend_from_slice(&chunk[..read]);

        if let Some(pos) = window
            .windows(FIXED_INFO_SIGNATURE.len())
            .position(|w| w == FIXED_INFO_SIGNATURE)
        {
            if window.len() >= pos + FIXED_INFO_LEN {
                let mut block = [0u8; FIXED_INFO_LEN];
                block.copy_from_slice(&window[pos..pos + FIXED_INFO_LEN]);
                return Some(block);
            }
            // Signature straddles the chunk boundary; keep it and read on.
            window.drain(..pos);
            continue;
        }

        // Keep a tail so a signature split across reads is still found.
        let keep = FIXED_INFO_SIGNATURE.len() - 1;
        if window.len() > keep {
            window.drain(..window.len() - keep);
        }
    }
    None
}

fn read_u32(block: &[u8; FIXED_INFO_LEN], offset: usize) -> u32 {
    u32::from_le_bytes([
        block[offset],
        block[offset + 1],
        block[offset + 2],
        block[offset + 3],
    ])
}

fn quad_version(most: u32, least: u32) -> Option<String> {
    if most == 0 && least == 0 {
        return None;
    }
    Some(format!(
        "{}.{}.{}.{}",
        most >> 16,
        most & 0xFFFF,
        least >> 16,
        least & 0xFFFF
    ))
}
