//! # Phrase-Search Compiler Module
//!
//! ## Purpose
//! Parses free-text queries into structured, conjunctive search expressions
//! of word and phrase predicates, and evaluates those expressions against
//! stored case text.
//!
//! ## Input/Output Specification
//! - **Input**: User search strings, possibly with curly or unbalanced quotes
//! - **Output**: `SearchExpression` trees (AND of word/phrase predicates)
//! - **Guarantees**: Compilation is total; malformed quoting degrades
//!   gracefully instead of failing
//!
//! ## Key Features
//! - Curly/straight quote normalization
//! - Best-effort repair of unbalanced quotes (the trailing quote is dropped)
//! - Phrase predicates require a contiguous, ordered word match
//! - Simple-filter variant discarding words of length <= 2

use serde::{Deserialize, Serialize};

/// A single search predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchTerm {
    /// Single word that must appear somewhere in the document
    Word(String),
    /// Ordered word sequence that must appear contiguously
    Phrase(String),
}

/// A conjunctive search expression. All terms must match; the empty
/// expression matches every record (identity filter).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchExpression {
    terms: Vec<SearchTerm>,
}

impl SearchExpression {
    /// The identity filter, matching every record.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Whether this expression is the identity (no-op) filter.
    pub fn is_match_all(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// Evaluate the expression against a document. Words match any token;
    /// phrases match a contiguous run of tokens in order. Tokenization
    /// mirrors citation normalization: lowercase, split on non-alphanumerics.
    pub fn matches(&self, text: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let tokens = tokenize(text);
        self.terms.iter().all(|term| match term {
            SearchTerm::Word(word) => {
                let needle = word.to_lowercase();
                tokens.iter().any(|t| *t == needle)
            }
            SearchTerm::Phrase(phrase) => {
                let needle = tokenize(phrase);
                !needle.is_empty()
                    && tokens.len() >= needle.len()
                    && tokens.windows(needle.len()).any(|w| w == needle.as_slice())
            }
        })
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compile a free-text query into a search expression. Total: malformed
/// quoting is repaired, never rejected.
pub fn compile(query: &str) -> SearchExpression {
    // quotes become standalone tokens so the scan below sees them as words
    let mut normalized = query
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('"', " \" ");

    // balance out uneven quotes by killing the last one
    if normalized.matches('"').count() % 2 != 0 {
        if let Some(idx) = normalized.rfind('"') {
            normalized = format!("{} {}", &normalized[..idx], &normalized[idx + 1..]);
        }
    }

    let mut terms = Vec::new();
    let mut current_phrase: Vec<&str> = Vec::new();
    let mut in_a_phrase = false;
    for word in normalized.split_whitespace() {
        if word == "\"" {
            if in_a_phrase {
                in_a_phrase = false;
                // two adjacent quote markers emit nothing
                if !current_phrase.is_empty() {
                    terms.push(SearchTerm::Phrase(current_phrase.join(" ")));
                    current_phrase.clear();
                }
            } else {
                in_a_phrase = true;
            }
        } else if in_a_phrase {
            current_phrase.push(word);
        } else {
            terms.push(SearchTerm::Word(word.to_string()));
        }
    }

    SearchExpression { terms }
}

/// Simple full-text filter: words of length <= 2 are discarded before
/// compilation. If nothing remains the result is the match-all filter, not
/// a match-nothing one.
pub fn simple_filter(query: &str) -> SearchExpression {
    let kept = query
        .split_whitespace()
        .filter(|part| part.len() > 2)
        .collect::<Vec<_>>()
        .join(" ");
    if kept.is_empty() {
        SearchExpression::match_all()
    } else {
        compile(&kept)
    }
}
