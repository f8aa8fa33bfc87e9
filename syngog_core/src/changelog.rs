/*============================================================
  Synavera Project: Syn-Gog
  Module: syngog_core::changelog
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Reduce catalog release-notes HTML to plain text through a
    layered list of extraction strategies.

  Security / Safety Notes:
    Operates on untrusted HTML as text only; nothing is
    rendered or executed.

  Dependencies:
    regex/once_cell for the strategy patterns.

  Operational Scope:
    Used by the catalog client after a successful release
    notes fetch. Absence of a result is never fatal.

  Revision History:
    2025-11-02 COD  Authored release-notes strategies.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Named strategies with documented precedence
    - Bounded output per strategy
============================================================*/

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_RELEASE_BLOCKS: usize = 5;
const MAX_VERSION_NOTES: usize = 3;
const MAX_UPDATE_PARAGRAPHS: usize = 5;

static RELEASE_BLOCK: Lazy<Regex> =
    Lazy::new(|| compile(r#"(?is)<div[^>]*class="[^"]*release[^"]*"[^>]*>(.*?)</div>"#));
static VERSION_NOTE: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?is)Version\s+([0-9.]+)[^<]*([^<]*(?:changelog|changes|notes|update)[^<]*)")
});
static UPDATE_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?is)<p[^>]*>(.*?(?:update|change|fix|add|improve|release).*?)</p>")
});
static LONG_PARAGRAPH: Lazy<Regex> = Lazy::new(|| compile(r"<p[^>]*>([^<]{50,})</p>"));
static TAG: Lazy<Regex> = Lazy::new(|| compile(r"<[^>]+>"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| compile(r"\s+"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid changelog pattern {pattern}: {err}"))
}

type Strategy = fn(&str) -> Option<String>;

/// Extraction strategies, tried in order until one yields text.
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("release-block", release_blocks),
    ("versioned-paragraph", versioned_notes),
    ("update-paragraph", update_paragraphs),
    ("first-long-paragraph", first_long_paragraph),
];

/// Plain-text release notes from an HTML page, if any strategy matches.
pub fn parse_release_notes(html: &str) -> Option<String> {
    STRATEGIES.iter().find_map(|(_, strategy)| strategy(html))
}

/// `<div class="...release...">` blocks, first five with meaningful text.
pub fn release_blocks(html: &str) -> Option<String> {
    let blocks: Vec<String> = RELEASE_BLOCK
        .captures_iter(html)
        .take(MAX_RELEASE_BLOCKS)
        .filter_map(|caps| caps.get(1))
        .map(|m| plain_text(m.as_str()))
        .filter(|text| text.len() > 10)
        .collect();
    non_empty(blocks.join("\n\n"))
}

/// `Version X.Y ... notes` fragments, first three.
pub fn versioned_notes(html: &str) -> Option<String> {
    let notes: Vec<String> = VERSION_NOTE
        .captures_iter(html)
        .take(MAX_VERSION_NOTES)
        .filter_map(|caps| {
            let version = caps.get(1)?.as_str();
            let note = plain_text(caps.get(2)?.as_str());
            (!note.is_empty()).then(|| format!("Version {version}: {note}"))
        })
        .collect();
    non_empty(notes.join("\n\n"))
}

/// Paragraphs mentioning update keywords, bulleted.
pub fn update_paragraphs(html: &str) -> Option<String> {
    let bullets: Vec<String> = UPDATE_PARAGRAPH
        .captures_iter(html)
        .take(MAX_UPDATE_PARAGRAPHS)
        .filter_map(|caps| caps.get(1))
        .map(|m| plain_text(m.as_str()))
        .filter(|text| text.len() > 20)
        .map(|text| format!("• {text}"))
        .collect();
    non_empty(bullets.join("\n"))
}

/// The first tag-free paragraph of at least fifty characters.
pub fn first_long_paragraph(html: &str) -> Option<String> {
    let caps = LONG_PARAGRAPH.captures(html)?;
    let text = plain_text(caps.get(1)?.as_str());
    (text.len() > 30).then(|| format!("Release Information: {text}"))
}

/// Strip tags, decode common entities, and collapse whitespace.
pub fn plain_text(fragment: &str) -> String {
    let without_tags = TAG.replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_blocks_win_when_present() {
        let html = r#"
            <div class="release-notes"><h3>1.4.2</h3><p>Fixed save corruption &amp; crashes.</p></div>
            <div class="release-notes"><p>tiny</p></div>
            <p>This paragraph mentions an update but should not be reached.</p>
        "#;
        assert_eq!(
            parse_release_notes(html).as_deref(),
            Some("1.4.2 Fixed save corruption & crashes.")
        );
    }

    #[test]
    fn versioned_notes_are_labelled() {
        let html = "<span>Version 1.2.1 changes to balance</span>";
        assert_eq!(release_blocks(html), None);
        assert_eq!(
            versioned_notes(html).as_deref(),
            Some("Version 1.2.1: changes to balance")
        );
    }

    #[test]
    fn update_paragraphs_are_bulleted() {
        let html = "<p>We fixed the <b>inventory</b> duplication glitch.</p><p>Short fix.</p>";
        assert_eq!(
            parse_release_notes(html).as_deref(),
            Some("• We fixed the inventory duplication glitch.")
        );
    }

    #[test]
    fn long_paragraph_is_last_resort() {
        let html = "<p>A quiet evening in the city, rain falling on neon signs all night long.</p>";
        assert_eq!(update_paragraphs(html), None);
        assert_eq!(
            parse_release_notes(html).as_deref(),
            Some("Release Information: A quiet evening in the city, rain falling on neon signs all night long.")
        );
    }

    #[test]
    fn nothing_matches_plain_markup() {
        assert_eq!(parse_release_notes("<html><body><h1>404</h1></body></html>"), None);
        assert_eq!(parse_release_notes(""), None);
    }
}
