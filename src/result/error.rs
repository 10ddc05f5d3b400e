//! Error types for binexpect

use nix::errno::Errno;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a target.
///
/// Most methods return `Result<T, ExpectError>`. Timeouts and end-of-file are
/// ordinary outcomes of an expectation; [`InteractivePrompting::try_expect`]
/// turns them into an interactive handoff or a mirrored termination instead
/// of an error.
///
/// [`InteractivePrompting::try_expect`]: crate::InteractivePrompting::try_expect
///
/// # Examples
///
/// ```no_run
/// use binexpect::{ExpectError, Pattern, SpawnConfig, Transport};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut target = SpawnConfig::builder()
///     .timeout(Duration::from_secs(5))
///     .spawn("some-command")?;
///
/// match target.expect(Pattern::exact("done")) {
///     Ok(result) => println!("Matched: {:?}", result.matched),
///     Err(ExpectError::Timeout { duration }) => {
///         eprintln!("Timed out after {:?}", duration);
///     }
///     Err(ExpectError::Eof) => {
///         eprintln!("Target closed its terminal");
///     }
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// Timeout waiting for pattern.
    ///
    /// Returned when no pattern matched within the timeout and
    /// `Pattern::Timeout` was not part of the pattern list.
    #[error("Timeout waiting for pattern (after {duration:?})")]
    Timeout {
        /// Duration that was waited before timeout
        duration: Duration,
    },

    /// The target closed its side.
    ///
    /// Covers both the zero-length read reported by BSD-style pseudo-terminals
    /// and the `EIO` reported by Linux once the worker side is closed.
    #[error("EOF reached before pattern matched")]
    Eof,

    /// The OS could not allocate a pseudo-terminal.
    #[error("Could not allocate a pseudo-terminal: {0}")]
    ResourceExhausted(#[source] Errno),

    /// Invalid pattern.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    /// I/O error.
    ///
    /// Returned when an underlying read, write, readiness wait or terminal
    /// attribute call fails for a reason other than end-of-file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Process spawning error.
    #[error("Failed to spawn {command:?}: {source}")]
    Spawn {
        /// The program that could not be started
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The requested operation is not honored by this transport.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl From<Errno> for ExpectError {
    fn from(errno: Errno) -> Self {
        ExpectError::Io(errno.into())
    }
}

/// Errors related to pattern creation.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Invalid glob pattern.
    #[error("Invalid glob: {0}")]
    InvalidGlob(#[from] globset::Error),

    /// Empty pattern.
    ///
    /// Returned when attempting to match an empty exact string.
    #[error("Pattern cannot be empty")]
    EmptyPattern,
}
