//! Strip OCR service artifacts out of extracted text spans.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::NOT_AVAILABLE;

/// Artifact patterns, applied in order. Each match becomes a single space.
static ARTIFACT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // <!-- text, from page 0 (l=0.06,t=0.18,r=0.93,b=0.28), with ID 5d5d... -->
        Regex::new(r"(?s)\s*<!--.*?-->\s*").unwrap(),
        Regex::new(r"\s*\(l=[\d.]+,\s*t=[\d.]+,\s*r=[\d.]+,\s*b=[\d.]+\)\s*").unwrap(),
        Regex::new(r"\s*\(\s*-?\d+\.\d+\s*,\s*-?\d+\.\d+\s*,\s*-?\d+\.\d+\s*,\s*-?\d+\.\d+\s*\)\s*")
            .unwrap(),
        Regex::new(r"\s*with ID [a-fA-F0-9-]+\s*").unwrap(),
    ]
});

static DELIMITER_FRAGMENTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<!--|-->").unwrap());

static EMPTY_CHECKBOX_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<td>\s*\[\s*\]\s*</td>").unwrap());

static HORIZONTAL_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static BLANK_SENTINEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:n/?a|\[\s*\])$").unwrap());

/// Normalize an optional extracted value. Missing input yields an empty string.
pub fn clean_value(value: Option<&str>) -> String {
    match value {
        Some(v) => clean_text(v),
        None => String::new(),
    }
}

/// Normalize extracted text. Idempotent: `clean_text(&clean_text(s)) == clean_text(s)`.
pub fn clean_text(raw: &str) -> String {
    let mut current = clean_once(raw);
    // A removal can splice together a new artifact; repeat until stable.
    // Every changing pass either shortens the text or yields "N/A".
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(raw: &str) -> String {
    let mut cleaned = raw.trim().to_string();
    for pattern in ARTIFACT_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").trim().to_string();
    }
    cleaned = DELIMITER_FRAGMENTS.replace_all(&cleaned, "").trim().to_string();
    cleaned = EMPTY_CHECKBOX_CELL
        .replace_all(&cleaned, NOT_AVAILABLE)
        .trim()
        .to_string();
    cleaned = HORIZONTAL_SPACE.replace_all(&cleaned, " ").to_string();

    if BLANK_SENTINEL.is_match(&cleaned) {
        return NOT_AVAILABLE.to_string();
    }
    cleaned
}

/// True for an empty string or the canonical "not available" marker.
pub fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == NOT_AVAILABLE
}
