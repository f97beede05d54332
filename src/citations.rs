//! # Citation Normalization Module
//!
//! ## Purpose
//! Canonicalizes raw citation strings into comparable lookup keys, and
//! provides the slug and display helpers used by the citation URL scheme.
//!
//! ## Input/Output Specification
//! - **Input**: Raw citation strings, reporter series names, URL slugs
//! - **Output**: Normalized cite keys, canonical slugs, display cites
//! - **Guarantees**: All functions are pure and total; normalization is
//!   idempotent, so stored keys and incoming lookups always agree
//!
//! Stored citations are indexed by `normalize_cite` and incoming lookups are
//! keyed the same way, making lookups format-insensitive: `"123 F.3d 456"`
//! and `"123 f3d 456"` normalize identically.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Normalize a citation into its lookup key: lowercase, with every character
/// outside `[0-9a-z]` stripped.
pub fn normalize_cite(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Canonical slug form of a series name: lowercased, alphanumerics and
/// underscores kept, whitespace and hyphen runs collapsed to a single
/// hyphen, all other punctuation dropped. `"F. 3d"` becomes `"f-3d"`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_sep = false;
    for c in value.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_sep = true;
        }
    }
    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Display form of a series slug: hyphens become spaces and the first
/// letter of each alphabetic run is capitalized, so `"f-3d"` becomes
/// `"F 3D"` and `"mass-app-ct"` becomes `"Mass App Ct"`.
pub fn title_case(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    let mut at_word_start = true;
    for c in slug.chars() {
        if c == '-' || c.is_whitespace() {
            out.push(' ');
            at_word_start = true;
        } else if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            // digits end a capitalization run, matching str.title()
            at_word_start = true;
        }
    }
    out
}

/// Human-readable full cite for a citation path, e.g. `("123", "f-3d",
/// "456")` yields `"123 F 3d 456"`. The normalized key of this string is
/// what the resolver matches against stored citations.
pub fn full_cite(volume: &str, series_slug: &str, page: &str) -> String {
    format!("{} {} {}", volume, title_case(series_slug), page)
}

/// One comparable chunk of a natural sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortPart {
    Num(u64),
    Text(String),
}

/// Sort key treating digit runs numerically and everything else
/// alphabetically, so `"9 Foo" < "9A Foo" < "10 Foo"`. Used to order volume
/// numbers and first pages in listing views.
pub fn natural_sort_key(text: &str) -> Vec<SortPart> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"\d+").unwrap());

    let mut key = Vec::new();
    for word in text.split_whitespace() {
        let mut last = 0;
        let mut any_digits = false;
        for m in digits.find_iter(word) {
            any_digits = true;
            // the possibly-empty text part before a digit run is the
            // tiebreak that sorts "9 Foo" ahead of "9A Foo"
            key.push(SortPart::Text(word[last..m.start()].to_string()));
            // digit runs too long for u64 fall back to text comparison
            match m.as_str().parse::<u64>() {
                Ok(n) => key.push(SortPart::Num(n)),
                Err(_) => key.push(SortPart::Text(m.as_str().to_string())),
            }
            last = m.end();
        }
        if any_digits {
            key.push(SortPart::Text(word[last..].to_string()));
        } else {
            key.push(SortPart::Text(word.to_string()));
        }
    }
    key
}

/// Comparator form of [`natural_sort_key`] for use with `sort_by`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a).cmp(&natural_sort_key(b))
}
