//! Pattern matcher implementations

use crate::result::PatternError;
use bytes::Bytes;
use memchr::memmem::Finder;
use regex::bytes::Regex;

/// Result of a pattern match, relative to the searched slice
#[derive(Debug, Clone)]
pub struct Match {
    /// Start position of the match
    pub start: usize,
    /// End position of the match
    pub end: usize,
    /// Captured groups (for regex)
    pub captures: Vec<Bytes>,
}

/// Trait for pattern matching
pub trait Matcher: Send + Sync {
    /// Find the leftmost match in the buffer
    fn find(&self, buffer: &[u8]) -> Option<Match>;
}

/// Exact byte string matcher
pub struct ExactMatcher {
    finder: Finder<'static>,
}

impl ExactMatcher {
    /// Create a new exact matcher
    pub fn new(pattern: &[u8]) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        Ok(Self {
            finder: Finder::new(pattern).into_owned(),
        })
    }
}

impl Matcher for ExactMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        let start = self.finder.find(buffer)?;
        Some(Match {
            start,
            end: start + self.finder.needle().len(),
            captures: vec![],
        })
    }
}

/// Regex matcher over raw bytes
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Create a new regex matcher
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        let captures = self.regex.captures(buffer)?;
        let full_match = captures.get(0)?;

        let capture_bytes = captures
            .iter()
            .map(|group| {
                group
                    .map(|m| Bytes::copy_from_slice(m.as_bytes()))
                    .unwrap_or_default()
            })
            .collect();

        Some(Match {
            start: full_match.start(),
            end: full_match.end(),
            captures: capture_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(pattern: &str) -> RegexMatcher {
        RegexMatcher::new(Regex::new(pattern).unwrap())
    }

    #[test]
    fn test_exact_matcher() {
        let matcher = ExactMatcher::new(b"hello").unwrap();
        let buffer = b"world hello there";

        let result = matcher.find(buffer).unwrap();
        assert_eq!(result.start, 6);
        assert_eq!(result.end, 11);
    }

    #[test]
    fn test_exact_matcher_not_found() {
        let matcher = ExactMatcher::new(b"missing").unwrap();
        assert!(matcher.find(b"this text does not contain it").is_none());
    }

    #[test]
    fn test_exact_matcher_empty_pattern() {
        assert!(matches!(
            ExactMatcher::new(b""),
            Err(PatternError::EmptyPattern)
        ));
    }

    #[test]
    fn test_exact_matcher_multiple_occurrences() {
        let matcher = ExactMatcher::new(b"test").unwrap();

        // Leftmost occurrence wins
        let result = matcher.find(b"test and test again").unwrap();
        assert_eq!(result.start, 0);
        assert_eq!(result.end, 4);
    }

    #[test]
    fn test_exact_matcher_binary_data() {
        let matcher = ExactMatcher::new(&[0xFF, 0x00, 0x16]).unwrap();
        let buffer = b"prefix\xFF\x00\x16suffix";

        let result = matcher.find(buffer).unwrap();
        assert_eq!(result.start, 6);
        assert_eq!(result.end, 9);
    }

    #[test]
    fn test_regex_matcher() {
        let result = regex(r"\d+").find(b"test 123 end").unwrap();
        assert_eq!(result.start, 5);
        assert_eq!(result.end, 8);
        assert_eq!(&result.captures[0][..], b"123");
    }

    #[test]
    fn test_regex_matcher_with_captures() {
        let result = regex(r"(\w+)@(\w+)\.(\w+)")
            .find(b"Email: user@example.com is valid")
            .unwrap();

        assert_eq!(&result.captures[0][..], b"user@example.com");
        assert_eq!(&result.captures[1][..], b"user");
        assert_eq!(&result.captures[2][..], b"example");
        assert_eq!(&result.captures[3][..], b"com");
    }

    #[test]
    fn test_regex_matcher_optional_group() {
        let result = regex(r"a(x)?b").find(b"--ab--").unwrap();
        assert_eq!(result.captures.len(), 2);
        assert!(result.captures[1].is_empty());
    }

    #[test]
    fn test_regex_matcher_invalid_utf8() {
        // Output that is not UTF-8 must still be searchable
        let result = regex(r"=(?s-u:.)=").find(b"\xfe=\xff=").unwrap();
        assert_eq!(result.start, 1);
        assert_eq!(result.end, 4);
    }

    #[test]
    fn test_regex_matcher_no_match() {
        assert!(regex(r"\d+").find(b"no numbers here").is_none());
    }
}
