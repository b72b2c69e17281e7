//! Text cleanup for extracted values.

use regex::Regex;
use std::sync::LazyLock;
use textwrap::{fill, Options};
use unicode_normalization::UnicodeNormalization;

/// Any run of Unicode whitespace, non-breaking spaces included.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse whitespace runs to single spaces, trim, and NFC-normalize.
///
/// ```
/// use patent_harvester::text::clean;
///
/// assert_eq!(clean("  Gesture\n   recognition\u{a0}system "), "Gesture recognition system");
/// ```
pub fn clean(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    collapsed.trim().nfc().collect()
}

/// Like [`clean`], but `None` for text that is empty after cleaning.
pub fn clean_optional(text: &str) -> Option<String> {
    let cleaned = clean(text);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Clean each paragraph, drop the empty ones, and join with blank lines.
pub fn join_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> String {
    paragraphs
        .iter()
        .filter_map(|p| clean_optional(p.as_ref()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Wrap text at the given width, keeping paragraph breaks.
pub fn wrap_text(text: &str, width: usize) -> String {
    let options = Options::new(width).break_words(false);
    text.split("\n\n")
        .map(|paragraph| fill(paragraph, &options))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_collapses_and_trims() {
        assert_eq!(clean("\n\t a  b\n\nc  "), "a b c");
        assert_eq!(clean("   "), "");
    }

    #[test]
    fn test_clean_nfc() {
        // "e" followed by a combining acute accent
        assert_eq!(clean("Caf\u{0065}\u{0301}"), "Caf\u{00e9}");
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(" \n "), None);
        assert_eq!(clean_optional(" x "), Some("x".to_string()));
    }

    #[test]
    fn test_join_paragraphs() {
        let paragraphs = ["First  line\n continued.", "  ", "Second."];
        assert_eq!(join_paragraphs(&paragraphs), "First line continued.\n\nSecond.");
    }

    #[test]
    fn test_wrap_text_preserves_paragraphs() {
        let wrapped = wrap_text("one two three four\n\nfive", 9);
        assert_eq!(wrapped, "one two\nthree\nfour\n\nfive");
    }
}
