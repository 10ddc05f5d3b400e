//! Pattern matching for expectations

mod matcher;

pub use matcher::{Match, Matcher};

use crate::result::PatternError;
use regex::bytes::Regex;
use std::fmt;

/// Patterns for matching target output.
///
/// Matching is done on raw bytes, so exact and regex patterns work on binary
/// output just as well as on text.
///
/// # Pattern Types
///
/// - **Exact**: literal byte string
/// - **Regex**: byte-oriented regular expression with capture groups
/// - **Glob**: shell-style wildcards, searched anywhere in the output
/// - **Eof**: matches when the target closes its side
/// - **Timeout**: matches when the timeout expires
///
/// # Examples
///
/// ```
/// use binexpect::Pattern;
///
/// let p1 = Pattern::exact("password: ");
/// let p2 = Pattern::exact([0xde, 0xad, 0xbe, 0xef]);
/// let p3 = Pattern::regex(r"\d+").unwrap();
/// let p4 = Pattern::glob("*.txt").unwrap();
/// let p5 = Pattern::Eof;
/// ```
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact byte string match.
    Exact(Vec<u8>),

    /// Regular expression match over bytes.
    Regex(Regex),

    /// Glob pattern match (shell-style wildcards).
    ///
    /// The glob is compiled to an unanchored regex, so `*.txt` finds the
    /// leftmost run of output ending in `.txt`.
    Glob(Regex, String),

    /// Match end of file.
    Eof,

    /// Match timeout condition.
    ///
    /// When present, an expired timeout produces a match instead of
    /// `ExpectError::Timeout`.
    Timeout,
}

impl Pattern {
    /// Create an exact pattern.
    ///
    /// # Examples
    ///
    /// ```
    /// use binexpect::Pattern;
    ///
    /// let prompt = Pattern::exact("$ ");
    /// let marker = Pattern::exact(b"\x00\xff");
    /// ```
    pub fn exact(bytes: impl AsRef<[u8]>) -> Self {
        Pattern::Exact(bytes.as_ref().to_vec())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Create a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the glob is malformed (for example an unclosed
    /// character class).
    pub fn glob(pattern: &str) -> Result<Self, PatternError> {
        let glob = globset::Glob::new(pattern)?;
        let regex = Regex::new(&unanchored(glob.regex()))?;
        Ok(Pattern::Glob(regex, pattern.to_string()))
    }

    /// Convert pattern to a matcher implementation.
    ///
    /// Returns `Ok(None)` for the conditions (`Eof`, `Timeout`), which the
    /// expect loop handles itself.
    pub fn to_matcher(&self) -> Result<Option<Box<dyn Matcher>>, PatternError> {
        use matcher::{ExactMatcher, RegexMatcher};

        match self {
            Pattern::Exact(bytes) => Ok(Some(Box::new(ExactMatcher::new(bytes)?))),
            Pattern::Regex(re) | Pattern::Glob(re, _) => {
                Ok(Some(Box::new(RegexMatcher::new(re.clone()))))
            }
            Pattern::Eof | Pattern::Timeout => Ok(None),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(bytes) => write!(f, "b\"{}\"", bytes.escape_ascii()),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            Pattern::Glob(_, glob) => write!(f, "glob {glob:?}"),
            Pattern::Eof => f.write_str("EOF"),
            Pattern::Timeout => f.write_str("TIMEOUT"),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::exact(s)
    }
}

impl From<&[u8]> for Pattern {
    fn from(bytes: &[u8]) -> Self {
        Pattern::exact(bytes)
    }
}

/// Drop the `^`/`$` anchors globset puts around its translation, keeping any
/// leading flag group such as `(?-u)`.
fn unanchored(regex: &str) -> String {
    match (regex.find('^'), regex.strip_suffix('$')) {
        (Some(caret), Some(body)) if caret < body.len() => {
            format!("{}{}", &body[..caret], &body[caret + 1..])
        }
        _ => regex.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanchored_keeps_flags() {
        assert_eq!(unanchored(r"(?-u)^.*\.txt$"), r"(?-u).*\.txt");
        assert_eq!(unanchored("plain"), "plain");
    }

    #[test]
    fn test_glob_finds_substring() {
        let pattern = Pattern::glob("*.txt").unwrap();
        let matcher = pattern.to_matcher().unwrap().unwrap();

        let found = matcher.find(b"ls\r\nnotes.txt\r\n").unwrap();
        assert_eq!(found.end, 13);
    }

    #[test]
    fn test_glob_question_mark() {
        let pattern = Pattern::glob("test?.log").unwrap();
        let matcher = pattern.to_matcher().unwrap().unwrap();

        assert!(matcher.find(b"see test1.log now").is_some());
        assert!(matcher.find(b"see test.log now").is_none());
    }

    #[test]
    fn test_invalid_glob() {
        assert!(matches!(
            Pattern::glob("[unclosed"),
            Err(PatternError::InvalidGlob(_))
        ));
    }

    #[test]
    fn test_special_patterns_have_no_matcher() {
        assert!(Pattern::Eof.to_matcher().unwrap().is_none());
        assert!(Pattern::Timeout.to_matcher().unwrap().is_none());
    }

    #[test]
    fn test_display_escapes_binary() {
        assert_eq!(Pattern::exact(b"ok\x00\n").to_string(), r#"b"ok\x00\n""#);
        assert_eq!(Pattern::regex(r"\d+").unwrap().to_string(), r"/\d+/");
    }
}
