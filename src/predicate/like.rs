//! SQL LIKE patterns
//!
//! `%` matches any run of characters, `_` exactly one, `\` escapes the next
//! character. Patterns are anchored at both ends.

use std::fmt;

use regex::{Regex, RegexBuilder};

use super::errors::{PredicateError, PredicateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyRun,
    AnyOne,
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => tokens.push(Token::Literal(chars.next().unwrap_or('\\'))),
            '%' => tokens.push(Token::AnyRun),
            '_' => tokens.push(Token::AnyOne),
            c => tokens.push(Token::Literal(c)),
        }
    }
    tokens
}

/// A compiled LIKE / ILIKE pattern.
#[derive(Clone)]
pub struct LikePattern {
    pattern: String,
    case_insensitive: bool,
    regex: Regex,
}

impl LikePattern {
    /// Compile a pattern.
    pub fn new(pattern: impl Into<String>, case_insensitive: bool) -> PredicateResult<Self> {
        let pattern = pattern.into();

        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');
        let mut buf = [0u8; 4];
        for token in tokenize(&pattern) {
            match token {
                Token::Literal(c) => source.push_str(&regex::escape(c.encode_utf8(&mut buf))),
                Token::AnyRun => source.push_str(".*"),
                Token::AnyOne => source.push('.'),
            }
        }
        source.push('$');

        let regex = RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| PredicateError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pattern,
            case_insensitive,
            regex,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Literal text every match must start with.
    ///
    /// `None` for case-insensitive patterns and patterns starting with a
    /// wildcard. Usable to narrow an ordered index, never to decide a match.
    pub fn literal_prefix(&self) -> Option<String> {
        if self.case_insensitive {
            return None;
        }
        let prefix: String = tokenize(&self.pattern)
            .into_iter()
            .map_while(|t| match t {
                Token::Literal(c) => Some(c),
                _ => None,
            })
            .collect();

        if prefix.is_empty() {
            None
        } else {
            Some(prefix)
        }
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.case_insensitive == other.case_insensitive
    }
}

impl fmt::Debug for LikePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LikePattern")
            .field("pattern", &self.pattern)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(p: &str) -> LikePattern {
        LikePattern::new(p, false).unwrap()
    }

    #[test]
    fn test_percent_and_underscore() {
        assert!(like("%name3").matches("name3"));
        assert!(like("%name3").matches("xname3"));
        assert!(!like("%name3").matches("name30"));
        assert!(like("%name3%").matches("name30"));
        assert!(like("a_c").matches("abc"));
        assert!(!like("a_c").matches("abbc"));
        assert!(!like("a_c").matches("ac"));
    }

    #[test]
    fn test_anchored_and_regex_safe() {
        assert!(!like("abc").matches("xabc"));
        assert!(like("a.c").matches("a.c"));
        assert!(!like("a.c").matches("abc"));
        assert!(like("(x)+").matches("(x)+"));
    }

    #[test]
    fn test_escape() {
        assert!(like("100\\%").matches("100%"));
        assert!(!like("100\\%").matches("1000"));
        assert!(like("a\\_b").matches("a_b"));
        assert!(!like("a\\_b").matches("axb"));
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(!like("Name%").matches("name1"));
        let ilike = LikePattern::new("Name%", true).unwrap();
        assert!(ilike.matches("name1"));
        assert!(ilike.matches("NAME1"));
    }

    #[test]
    fn test_multiline_text() {
        assert!(like("a%b").matches("a\nb"));
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(like("abc%").literal_prefix(), Some("abc".to_string()));
        assert_eq!(like("ab_c").literal_prefix(), Some("ab".to_string()));
        assert_eq!(like("a\\%b%").literal_prefix(), Some("a%b".to_string()));
        assert_eq!(like("exact").literal_prefix(), Some("exact".to_string()));
        assert_eq!(like("%abc").literal_prefix(), None);
        assert_eq!(LikePattern::new("abc%", true).unwrap().literal_prefix(), None);
    }
}
