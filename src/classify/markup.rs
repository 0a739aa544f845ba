//! Cosmetic chat markup: `<scale 1.75>`, `<color white>`, `<bgcolor DarkGreen>`,
//! `<bordercolor red>` and friends.
//!
//! None of it is ever spoken.

use once_cell::sync::Lazy;
use regex::Regex;

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").expect("valid regex"));
static BGCOLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*bgcolor\s+([^<>\s]+)\s*>").expect("valid regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Remove every `<…>` directive and collapse the whitespace left behind.
pub fn strip_markup(text: &str) -> String {
    let stripped = DIRECTIVE_RE.replace_all(text, " ");
    SPACES_RE.replace_all(stripped.trim(), " ").into_owned()
}

/// Value of the first `<bgcolor X>` directive, if any.
pub fn bgcolor(text: &str) -> Option<String> {
    BGCOLOR_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// `true` for text that is not worth vocalising: empty, or only dots /
/// ellipsis characters and whitespace.
pub fn is_unspeakable(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_whitespace() || c == '.' || c == '…')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_all_directives() {
        let raw = "<scale 1.75><color white><bgcolor DarkGreen>Positron here.";
        assert_eq!(strip_markup(raw), "Positron here.");
    }

    #[test]
    fn strips_inline_directives_and_collapses_spaces() {
        let raw = "Watch <color red>out</color>   for <bordercolor #ff0000>Hellions";
        assert_eq!(strip_markup(raw), "Watch out for Hellions");
    }

    #[test]
    fn extracts_bgcolor_case_insensitively() {
        assert_eq!(bgcolor("<BGCOLOR DarkGreen>hi"), Some("DarkGreen".into()));
        assert_eq!(bgcolor("<color white>hi"), None);
    }

    #[test]
    fn ellipsis_is_unspeakable() {
        assert!(is_unspeakable(""));
        assert!(is_unspeakable("..."));
        assert!(is_unspeakable(" … "));
        assert!(!is_unspeakable("Hi..."));
    }
}
