//! Result types for expectations

mod error;

pub use error::{ExpectError, PatternError};

use bytes::Bytes;

/// Result of a successful expectation.
///
/// All fields are raw bytes: targets driven through a pseudo-terminal are
/// free to print anything, and binary payloads are the whole point of the
/// crate. Use [`MatchResult::matched_lossy`] and [`MatchResult::before_lossy`]
/// for display.
///
/// # Examples
///
/// ```no_run
/// use binexpect::{Pattern, SpawnConfig, Transport};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut target = SpawnConfig::builder().spawn("echo user@example.com")?;
/// let result = target.expect(Pattern::regex(r"(\w+)@(\w+)\.(\w+)")?)?;
///
/// // captures[0] is the full match, the rest are the groups
/// assert_eq!(&result.captures[1][..], b"user");
/// println!("Before: {}", result.before_lossy());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the pattern that matched.
    ///
    /// For `expect` with a single pattern, this is always 0.
    pub pattern_index: usize,

    /// The bytes that matched. Empty for `Pattern::Eof` and `Pattern::Timeout`.
    pub matched: Bytes,

    /// Output received before the match.
    ///
    /// For `Pattern::Eof` and `Pattern::Timeout` this is everything that was
    /// still unmatched.
    pub before: Bytes,

    /// Captured groups for regex patterns.
    ///
    /// Index 0 is the full match; a group that did not participate is empty.
    /// For non-regex patterns, this vector is empty.
    pub captures: Vec<Bytes>,
}

impl MatchResult {
    /// The matched bytes, decoded lossily as UTF-8.
    pub fn matched_lossy(&self) -> String {
        String::from_utf8_lossy(&self.matched).into_owned()
    }

    /// The bytes before the match, decoded lossily as UTF-8.
    pub fn before_lossy(&self) -> String {
        String::from_utf8_lossy(&self.before).into_owned()
    }
}
