//! Text normalization for extracted page content.

use once_cell::sync::Lazy;
use regex::Regex;

/// Any run of Unicode whitespace, NBSP included (`\s` is Unicode-aware in `regex`).
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("BUG: hardcoded whitespace regex is invalid"));

/// Quote characters stripped from the ends of extracted values.
const QUOTES: &[char] = &['"', '\'', '“', '”', '„', '«', '»', '‘', '’'];

/// Normalize extracted text.
///
/// Collapses every whitespace run to a single ASCII space, strips enclosing
/// quote characters and trims. Applying it twice yields the same string as
/// applying it once.
///
/// # Examples
/// ```
/// # use kodegen_tools_tenderscrape::utils::normalize_text;
/// assert_eq!(normalize_text("  \"Хүнсний\u{a0}\n бүтээгдэхүүн\"  "), "Хүнсний бүтээгдэхүүн");
/// assert_eq!(normalize_text(""), "");
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    // Stripping quotes can expose new outer whitespace and vice versa, so
    // trim both until stable.
    let mut view = collapsed.as_ref();
    loop {
        let next = view.trim_matches(' ').trim_matches(QUOTES);
        if next.len() == view.len() {
            break;
        }
        view = next;
    }
    view.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_mixed_whitespace() {
        assert_eq!(normalize_text("a\t\tb\u{a0}\u{a0}c\r\nd"), "a b c d");
    }

    #[test]
    fn strips_nested_quotes_and_padding() {
        assert_eq!(normalize_text(" \" «Нийслэл» \" "), "Нийслэл");
    }

    #[test]
    fn keeps_inner_quotes() {
        assert_eq!(normalize_text("ХХК \"Тэнгэр\" ХХК"), "ХХК \"Тэнгэр\" ХХК");
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(input in "\\PC{0,64}") {
            let once = normalize_text(&input);
            prop_assert_eq!(normalize_text(&once), once.clone());
        }

        #[test]
        fn output_has_no_whitespace_runs(input in "[ \\t\\n\u{a0}a-zа-я\"]{0,48}") {
            let out = normalize_text(&input);
            prop_assert!(!out.contains("  "));
            prop_assert!(!out.chars().any(|c| c.is_whitespace() && c != ' '));
        }
    }
}
