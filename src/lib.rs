//! binexpect: raw binary I/O and interactive handoff over pseudo-terminals
//!
//! binexpect drives programs through a pseudo-terminal the way an exploit
//! script needs to: payloads containing any byte value reach the target
//! intact, expectations are bounded in time and in how far back they
//! search, and at any point an operator can take over the terminal and
//! hand control back with a single escape keystroke.
//!
//! # Features
//!
//! - **Binary-safe sending**: every byte is escaped with the terminal's
//!   literal-next character so line editing never touches it
//! - **Pattern matching**: exact bytes, byte regexes and globs, plus EOF and
//!   timeout as matchable outcomes
//! - **Interactive handoff**: relay between the operator and the target
//!   with the operator's terminal in raw mode, restored on every exit path
//! - **Bare terminals**: open a TTY with nothing on it, for a debugger to
//!   run the target on
//! - **Attached descriptors**: drive a socket or any other open descriptor
//!   with the same expect and prompt calls
//! - **Faithful exit**: when the target dies during a handoff, the script can
//!   exit with the same status or signal
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use binexpect::{BinaryFraming, InteractivePrompting, Pattern, PromptOptions};
//! use binexpect::{SpawnConfig, Transport};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut target = SpawnConfig::builder()
//!         .timeout(Duration::from_secs(5))
//!         .spawn("./vulnerable")?;
//!     target.set_echo(false)?;
//!     target.set_nonlcr()?;
//!
//!     target.expect(Pattern::exact("name: "))?;
//!     target.send_bin_line(b"AAAAAAAA\xef\xbe\xad\xde\x03\x04")?;
//!
//!     // Look around by hand; ^] returns control to the script.
//!     target.prompt(PromptOptions::new())?;
//!     Ok(())
//! }
//! ```
//!
//! # Pattern Matching
//!
//! ```rust,no_run
//! use binexpect::{Pattern, SpawnConfig, Transport};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut target = SpawnConfig::builder().spawn("sh")?;
//! // Exact bytes
//! target.expect(Pattern::exact("password: "))?;
//!
//! // Regex with captures
//! let leak = target.expect(Pattern::regex(r"0x([0-9a-f]+)")?)?;
//! println!("leaked {}", String::from_utf8_lossy(&leak.captures[1]));
//!
//! // Several patterns: the earliest match in the output wins
//! let patterns = [Pattern::exact("win"), Pattern::exact("lose"), Pattern::Eof];
//! match target.expect_any(&patterns)?.pattern_index {
//!     0 => println!("flag!"),
//!     1 => println!("try again"),
//!     _ => println!("target closed"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Debugging a Target
//!
//! [`PtyTransport`] opens a terminal with no program on it. Start a
//! debugger with `--tty` pointing at it and drive the inferior from the
//! script:
//!
//! ```rust,no_run
//! use binexpect::{InteractivePrompting, PromptOptions, SpawnConfig};
//!
//! # fn example() -> Result<(), binexpect::ExpectError> {
//! let mut tty = SpawnConfig::builder().verbose(true).open_tty()?;
//! // gdb -q ./target --tty /dev/pts/N
//! tty.prompt(PromptOptions::new().text("Attach gdb, then press ^]\r\n"))?;
//! # Ok(())
//! # }
//! ```
//!
//! With the `cli` feature, [`cli::TargetArgs`] adds the usual switches for
//! choosing between the two modes to a script's own command line.

#![warn(missing_docs)]

#[cfg(not(unix))]
compile_error!("binexpect requires a Unix pseudo-terminal implementation");

mod buffer;
mod config;
mod expect;
mod framing;
mod interact;
mod pattern;
mod prompt;
mod result;
mod transport;
mod tty;

#[cfg(feature = "cli")]
pub mod cli;

// Public API exports
pub use config::{SpawnBuilder, SpawnConfig};
pub use expect::Expecter;
pub use framing::{frame, BinaryFraming, FRAME_MARKER};
pub use interact::{Filter, Termination, TransferSession, CHUNK_SIZE};
pub use pattern::{Match, Matcher, Pattern};
pub use prompt::{signal_name, InteractivePrompting, PromptOptions};
pub use result::{ExpectError, MatchResult, PatternError};
pub use transport::{
    ChildProcessTransport, ChildStatus, FdTransport, InteractOptions, PtyTransport, Transport,
    DEFAULT_ESCAPE,
};
pub use tty::{same_mode, EscapeControlChars, ModeStack, PtyPair, RawModeGuard, DEFAULT_EOF, DEFAULT_INTR};

// Re-export commonly used types
pub use bytes::Bytes;
pub use nix::sys::termios::Termios;
