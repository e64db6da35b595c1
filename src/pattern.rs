//! Pattern Compiler: keyword list → compiled alternation
//!
//! Keywords are split on `,`, trimmed, and escaped before being joined into a
//! single regex alternation. The regex crate uses leftmost-first semantics, so
//! at a given position the earliest keyword in the list wins.

use regex::{Regex, RegexBuilder};
use std::ops::Range;

use crate::config::KEYWORD_SEPARATOR;
use crate::diagnostics;
use crate::error::PatternError;

/// Upper bound on compiled program size; larger keyword lists fail safe
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// A compiled keyword matcher. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    keywords: Vec<String>,
    case_sensitive: bool,
}

impl Pattern {
    /// Build a pattern, reporting construction failures.
    /// `Ok(None)` means there were no usable keywords.
    pub fn try_compile<S: AsRef<str>>(
        keywords: &[S],
        case_sensitive: bool,
    ) -> Result<Option<Pattern>, PatternError> {
        let keywords = normalize_keywords(keywords);
        if keywords.is_empty() {
            return Ok(None);
        }

        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");

        let regex = RegexBuilder::new(&alternation)
            .case_insensitive(!case_sensitive)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| match e {
                regex::Error::CompiledTooBig(_) => PatternError::TooLarge,
                other => PatternError::Invalid(other.to_string()),
            })?;

        Ok(Some(Pattern {
            regex,
            keywords,
            case_sensitive,
        }))
    }

    /// Keywords in alternation order (after splitting and trimming)
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Non-overlapping match spans, left to right
    pub fn find_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.regex
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .map(|m| m.range())
            .collect()
    }
}

/// Compile keywords into a pattern. Best effort: construction failures are
/// logged and reported as "no matcher".
pub fn compile<S: AsRef<str>>(keywords: &[S], case_sensitive: bool) -> Option<Pattern> {
    match Pattern::try_compile(keywords, case_sensitive) {
        Ok(pattern) => pattern,
        Err(e) => {
            diagnostics::error("PatternCompiler", &e);
            None
        }
    }
}

/// Split every entry on the separator, trim, and drop empties
fn normalize_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    keywords
        .iter()
        .flat_map(|entry| entry.as_ref().split(KEYWORD_SEPARATOR))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_text<'a>(text: &'a str, pattern: &Pattern) -> Vec<&'a str> {
        pattern
            .find_spans(text)
            .into_iter()
            .map(|r| &text[r])
            .collect()
    }

    #[test]
    fn test_empty_keywords_yield_none() {
        let empty: [&str; 0] = [];
        assert!(compile(&empty, false).is_none());
        assert!(compile(&["", "  ", ","], false).is_none());
    }

    #[test]
    fn test_split_and_trim() {
        let pattern = compile(&["cat, dog", " bird "], false).unwrap();
        assert_eq!(pattern.keywords(), &["cat", "dog", "bird"]);
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let pattern = compile(&["a.b", "c++", "(x)"], true).unwrap();

        assert!(pattern.find_spans("axb").is_empty());
        assert_eq!(spans_text("a.b and c++ and (x)", &pattern), vec!["a.b", "c++", "(x)"]);
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let pattern = compile(&["cat"], false).unwrap();
        assert_eq!(spans_text("Cat CAT cat", &pattern), vec!["Cat", "CAT", "cat"]);
    }

    #[test]
    fn test_case_sensitive() {
        let pattern = compile(&["cat"], true).unwrap();
        assert!(pattern.case_sensitive());
        assert_eq!(spans_text("Cat CAT cat", &pattern), vec!["cat"]);
    }

    #[test]
    fn test_first_alternative_wins_at_position() {
        let pattern = compile(&["cat", "category"], true).unwrap();
        assert_eq!(spans_text("category", &pattern), vec!["cat"]);

        let pattern = compile(&["category", "cat"], true).unwrap();
        assert_eq!(spans_text("category", &pattern), vec!["category"]);
    }

    #[test]
    fn test_spans_are_ordered_and_disjoint() {
        let pattern = compile(&["aa"], true).unwrap();
        let spans = pattern.find_spans("aaaaa");
        assert_eq!(spans, vec![0..2, 2..4]);
    }

    #[test]
    fn test_unicode_case_folding() {
        let pattern = compile(&["straße"], false).unwrap();
        assert_eq!(spans_text("STRASSE STRAßE", &pattern), vec!["STRAßE"]);
    }

    #[test]
    fn test_oversized_pattern_fails_safe() {
        let keywords: Vec<String> = (0..50_000).map(|i| format!("keyword{}\u{3b1}", i)).collect();
        let result = Pattern::try_compile(&keywords, false);
        assert!(matches!(result, Err(PatternError::TooLarge)));
        assert!(compile(&keywords, false).is_none());
    }
}
