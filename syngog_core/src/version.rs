/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::version
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Parse, clean, and validate free-form version and build
    strings gathered from registry values, metadata files,
    and catalog responses.

  Security / Safety Notes:
    Pure string processing; no I/O performed in this module.

  Dependencies:
    regex for ordered extraction patterns, once_cell for
    lazily compiled pattern tables.

  Operational Scope:
    Every comparison elsewhere classifies its operands here
    before comparing build ids or dotted versions.

  Revision History:
    2025-11-02 COD  Introduced version string utilities.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Ordered, individually testable extraction strategies
    - Build ids and dotted versions never share a comparison
============================================================*/

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefixes stripped before extraction, longest first.
const VERSION_PREFIXES: [&str; 5] = ["version", "release", "ver", "rel", "v"];

const MAX_SEGMENTS: usize = 5;
const MAX_SEGMENT_VALUE: u32 = 9999;
const MIN_BUILD_ID_LEN: usize = 8;

/// Two-component matches above these magnitudes are treated as incidental numbers.
const MAX_PAIR_MAJOR: u32 = 20;
const MAX_PAIR_MINOR: u32 = 999;

/// Extraction strategies in precedence order.
static TEXT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("explicit", r"version\s*[:=]\s*([0-9]+(?:\.[0-9]+)+)"),
        ("prefixed", r"v\.?\s*([0-9]+(?:\.[0-9]+)+)"),
        ("quad", r"([0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)"),
        ("triple", r"([0-9]+\.[0-9]+\.[0-9]+)"),
        ("pair", r"\b([0-9]{1,2}\.[0-9]{1,3})\b"),
        ("build", r"build\s*[:=]\s*([0-9]+)"),
        ("release", r"release\s*[:=]\s*([0-9]+(?:\.[0-9]+)*)"),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        (
            name,
            Regex::new(pattern).unwrap_or_else(|err| panic!("invalid {name} pattern: {err}")),
        )
    })
    .collect()
});

/// Strip known prefixes and separator punctuation, extract a valid version,
/// and collapse trailing `.0` segments beyond two components.
pub fn clean(raw: &str) -> Option<String> {
    let mut candidate = raw.trim();
    if candidate.is_empty() {
        return None;
    }

    let lowered = candidate.to_ascii_lowercase();
    for prefix in VERSION_PREFIXES {
        if lowered.starts_with(prefix) {
            candidate = &candidate[prefix.len()..];
            break;
        }
    }
    let candidate = candidate.trim_matches(|c: char| c == '.' || c == ':' || c.is_whitespace());

    extract_from_text(candidate).map(|version| collapse_trailing_zeros(&version))
}

/// Validate a dotted version: 1..=5 numeric segments, each at most 9999.
pub fn is_valid(candidate: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    let segments: Vec<&str> = candidate.split('.').collect();
    if segments.is_empty() || segments.len() > MAX_SEGMENTS {
        return false;
    }
    segments.iter().all(|segment| {
        !segment.is_empty()
            && segment.bytes().all(|b| b.is_ascii_digit())
            && segment
                .parse::<u32>()
                .map(|value| value <= MAX_SEGMENT_VALUE)
                .unwrap_or(false)
    })
}

/// Return the first pattern match (in precedence order) that validates.
pub fn extract_from_text(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();

    for (_, pattern) in TEXT_PATTERNS.iter() {
        let Some(captures) = pattern.captures(&lowered) else {
            continue;
        };
        let Some(found) = captures.get(1) else {
            continue;
        };
        let version = found.as_str();
        if is_valid(version) && plausible_pair(version) {
            return Some(version.to_string());
        }
    }
    None
}

/// True iff `s` is all ASCII digits and at least eight characters long.
pub fn is_build_id(s: &str) -> bool {
    s.len() >= MIN_BUILD_ID_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

/// Order two build ids numerically without parsing into a fixed-width integer.
///
/// Returns `None` unless both operands are build ids.
pub fn compare_build_ids(left: &str, right: &str) -> Option<Ordering> {
    if !is_build_id(left) || !is_build_id(right) {
        return None;
    }
    let left = left.trim_start_matches('0');
    let right = right.trim_start_matches('0');
    Some(left.len().cmp(&right.len()).then_with(|| left.cmp(right)))
}

fn plausible_pair(version: &str) -> bool {
    let mut parts = version.split('.');
    let (Some(major), Some(minor), None) = (parts.next(), parts.next(), parts.next()) else {
        return true;
    };
    match (major.parse::<u32>(), minor.parse::<u32>()) {
        (Ok(major), Ok(minor)) => major <= MAX_PAIR_MAJOR && minor <= MAX_PAIR_MINOR,
        _ => false,
    }
}

fn collapse_trailing_zeros(version: &str) -> String {
    let mut segments: Vec<&str> = version.split('.').collect();
    while segments.len() > 2 && segments.last().is_some_and(|s| s.parse::<u32>() == Ok(0)) {
        segments.pop();
    }
    segments.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_prefix_and_collapses_zeros() {
        assert_eq!(clean("Version: 1.2.0.0").as_deref(), Some("1.2"));
        assert_eq!(clean("v2.5.1").as_deref(), Some("2.5.1"));
        assert_eq!(clean("rel. 3.0.0").as_deref(), Some("3.0"));
        assert_eq!(clean("1.0.3.0").as_deref(), Some("1.0.3"));
    }

    #[test]
    fn clean_rejects_unparseable_input() {
        assert_eq!(clean(""), None);
        assert_eq!(clean("   "), None);
        assert_eq!(clean("gold edition"), None);
        assert_eq!(clean("0x1"), None);
    }

    #[test]
    fn is_valid_enforces_segment_rules() {
        assert!(is_valid("1"));
        assert!(is_valid("1.2.3.4.5"));
        assert!(is_valid("9999.0"));
        assert!(!is_valid(""));
        assert!(!is_valid("1.2.3.4.5.6"));
        assert!(!is_valid("1.a"));
        assert!(!is_valid("1..2"));
        assert!(!is_valid("10000.1"));
        assert!(!is_valid("99999999999999999999"));
    }

    #[test]
    fn extract_prefers_explicit_version_field() {
        let text = "build=49183726 version=2.1.4 copyright 1998.2023";
        assert_eq!(extract_from_text(text).as_deref(), Some("2.1.4"));
    }

    #[test]
    fn extract_falls_through_invalid_matches() {
        assert_eq!(extract_from_text("v12345.1").as_deref(), None);
        assert_eq!(
            extract_from_text("version: 10000.1 (1.4.2)").as_deref(),
            Some("1.4.2")
        );
    }

    #[test]
    fn extract_rejects_implausible_pairs() {
        assert_eq!(extract_from_text("costs 45.99 today"), None);
        assert_eq!(extract_from_text("ratio 3.1000"), None);
        assert_eq!(extract_from_text("update 1.31").as_deref(), Some("1.31"));
    }

    #[test]
    fn extract_reads_release_field() {
        assert_eq!(extract_from_text("release=7").as_deref(), Some("7"));
    }

    #[test]
    fn build_id_requires_eight_digits() {
        assert!(is_build_id("49183726"));
        assert!(is_build_id("1234567890123456789012"));
        assert!(!is_build_id("1234567"));
        assert!(!is_build_id("1.2.26"));
        assert!(!is_build_id("4918372a"));
        assert!(!is_build_id(""));
    }

    #[test]
    fn build_ids_compare_numerically() {
        assert_eq!(
            compare_build_ids("49183726", "49183999"),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_build_ids("100000000", "99999999"),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_build_ids("0049183726", "49183726"),
            Some(Ordering::Equal)
        );
        assert_eq!(compare_build_ids("49183726", "1.2.3"), None);
    }
}
