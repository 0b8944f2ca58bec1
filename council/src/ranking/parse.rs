//! Free-text ranking parser.
//!
//! Rankers are instructed to end with a `FINAL RANKING:` section, but the
//! grammar is best-effort against uncooperative model output. Extraction
//! ladder, in strict priority:
//!
//! 1. marker present, numbered entries after it: take the label of each
//!    `N. Response X` match in appearance order (the digit is not a sort key)
//! 2. marker present, no numbered entries: any `Response X` after the marker
//! 3. no marker: any `Response X` anywhere in the text
//!
//! Duplicates are preserved; labels outside the current mapping are ignored
//! downstream. Total function: any input yields a (possibly empty) sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Marker line the ranking prompt demands.
pub const RANKING_MARKER: &str = "FINAL RANKING:";

static LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Response [A-Z]").unwrap());

static NUMBERED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\s*(Response [A-Z])").unwrap());

/// Extract an ordered label sequence from free-form ranking text.
pub fn parse_ranking(text: &str) -> Vec<String> {
    match text.split_once(RANKING_MARKER) {
        Some((_, tail)) => {
            let numbered: Vec<String> = NUMBERED_PATTERN
                .captures_iter(tail)
                .map(|caps| caps[1].to_string())
                .collect();
            if !numbered.is_empty() {
                return numbered;
            }
            scan_labels(tail)
        }
        None => scan_labels(text),
    }
}

fn scan_labels(text: &str) -> Vec<String> {
    LABEL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
