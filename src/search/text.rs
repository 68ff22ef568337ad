//! Text normalization shared by index build and query time.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip diacritics, collapse non-alphanumeric runs to one space, trim.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}

/// Split normalized text into non-empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Best-effort singular form: "ies" -> "y", "es" -> "", "s" -> "".
///
/// Returns `None` when no rule applies or the stem would be empty.
pub fn depluralize(token: &str) -> Option<String> {
    let stem = if let Some(stem) = token.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = token.strip_suffix("es") {
        stem.to_string()
    } else if let Some(stem) = token.strip_suffix('s') {
        stem.to_string()
    } else {
        return None;
    };

    if stem.is_empty() || stem == "y" {
        None
    } else {
        Some(stem)
    }
}

/// Case-insensitive name order with a stable tiebreak
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics_and_punctuation() {
        assert_eq!(normalize("  Café--Crème_Logo.SVG "), "cafe creme logo svg");
        assert_eq!(normalize("Ærø"), "ærø");
        assert_eq!(normalize("***"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("Élan Vital / 2024");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Acme-Rocket.svg"), vec!["acme", "rocket", "svg"]);
        assert!(tokenize("  ").is_empty());
    }

    #[test]
    fn test_depluralize() {
        assert_eq!(depluralize("berries").as_deref(), Some("berry"));
        assert_eq!(depluralize("boxes").as_deref(), Some("box"));
        assert_eq!(depluralize("clouds").as_deref(), Some("cloud"));
        assert_eq!(depluralize("cloud"), None);
        assert_eq!(depluralize("s"), None);
    }
}
