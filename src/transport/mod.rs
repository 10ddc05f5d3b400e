//! Targets that can be driven: spawned children, bare terminals and
//! descriptors opened elsewhere

mod channel;
mod child;
mod fd;
mod pty;

pub use child::ChildProcessTransport;
pub use fd::FdTransport;
pub use pty::PtyTransport;

use crate::interact::{Filter, Termination};
use crate::pattern::Pattern;
use crate::result::{ExpectError, MatchResult};
use nix::sys::termios::Termios;
use std::os::fd::BorrowedFd;
use std::time::Duration;

/// Default escape byte for interactive transfer (`^]`).
pub const DEFAULT_ESCAPE: u8 = 0x1d;

/// What the OS reports about a target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Still running, or no process is attached.
    Alive,
    /// Exited normally with this code.
    Exited(i32),
    /// Terminated by this signal.
    Signaled(i32),
}

/// Options for [`Transport::interact`].
///
/// The operator side defaults to the process's own stdin and stdout, and
/// the escape byte to `^]`.
pub struct InteractOptions<'a> {
    escape: Option<u8>,
    input_filter: Option<Filter<'a>>,
    output_filter: Option<Filter<'a>>,
    stdin: Option<BorrowedFd<'a>>,
    stdout: Option<BorrowedFd<'a>>,
}

impl Default for InteractOptions<'_> {
    fn default() -> Self {
        Self {
            escape: Some(DEFAULT_ESCAPE),
            input_filter: None,
            output_filter: None,
            stdin: None,
            stdout: None,
        }
    }
}

impl<'a> InteractOptions<'a> {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte that ends the transfer; `None` disables escaping.
    pub fn escape(mut self, escape: Option<u8>) -> Self {
        self.escape = escape;
        self
    }

    /// Transform operator input before it is forwarded.
    pub fn input_filter(mut self, filter: impl FnMut(&[u8]) -> Vec<u8> + 'a) -> Self {
        self.input_filter = Some(Box::new(filter));
        self
    }

    /// Transform target output before it is shown.
    pub fn output_filter(mut self, filter: impl FnMut(&[u8]) -> Vec<u8> + 'a) -> Self {
        self.output_filter = Some(Box::new(filter));
        self
    }

    /// Read operator input from `fd` instead of stdin.
    pub fn stdin(mut self, fd: BorrowedFd<'a>) -> Self {
        self.stdin = Some(fd);
        self
    }

    /// Write target output to `fd` instead of stdout.
    pub fn stdout(mut self, fd: BorrowedFd<'a>) -> Self {
        self.stdout = Some(fd);
        self
    }

    pub(crate) fn escape_byte(&self) -> Option<u8> {
        self.escape
    }

    pub(crate) fn operator_output(&self) -> Option<BorrowedFd<'a>> {
        self.stdout
    }
}

/// A target reachable through a pseudo-terminal controller.
///
/// Implementors supply the primitive operations; expectation shortcuts and
/// status queries come as provided methods. Higher-level behavior lives in
/// [`BinaryFraming`](crate::BinaryFraming) and
/// [`InteractivePrompting`](crate::InteractivePrompting), which every
/// transport gets for free.
pub trait Transport {
    /// The controller descriptor everything is read from and written to.
    fn controller(&self) -> BorrowedFd<'_>;

    /// Send raw bytes, returning how many were written.
    fn send(&mut self, data: &[u8]) -> Result<usize, ExpectError>;

    /// Send `line` followed by a newline.
    fn send_line(&mut self, line: &[u8]) -> Result<usize, ExpectError> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line);
        data.push(b'\n');
        self.send(&data)
    }

    /// Send the terminal's end-of-file character, as if typed.
    fn send_eof(&mut self) -> Result<(), ExpectError>;

    /// Send the terminal's interrupt character, as if typed.
    fn send_intr(&mut self) -> Result<(), ExpectError>;

    /// Whether the terminal echoes input back.
    fn echo(&self) -> Result<bool, ExpectError>;

    /// Turn terminal echo on or off.
    fn set_echo(&mut self, on: bool) -> Result<(), ExpectError>;

    /// Apply `edit` to the terminal mode, remembering the previous mode.
    fn change_mode(&mut self, edit: &mut dyn FnMut(&mut Termios)) -> Result<Termios, ExpectError>;

    /// Undo the most recent [`change_mode`](Transport::change_mode).
    fn restore_mode(&mut self) -> Result<(), ExpectError>;

    /// Wait for any of `patterns`, overriding the configured timeout and
    /// search window when given.
    fn expect_with(
        &mut self,
        patterns: &[Pattern],
        timeout: Option<Duration>,
        search_window: Option<usize>,
    ) -> Result<MatchResult, ExpectError>;

    /// Wait for any of `patterns` with the configured defaults.
    fn expect_any(&mut self, patterns: &[Pattern]) -> Result<MatchResult, ExpectError> {
        self.expect_with(patterns, None, None)
    }

    /// Wait for a single pattern with the configured defaults.
    fn expect(&mut self, pattern: Pattern) -> Result<MatchResult, ExpectError> {
        self.expect_any(std::slice::from_ref(&pattern))
    }

    /// Hand the target over to the operator until a termination condition.
    ///
    /// Unmatched output is shown first. The operator's terminal, if it is
    /// one, is in raw mode for the duration and restored on every exit path.
    fn interact(&mut self, options: InteractOptions<'_>) -> Result<Termination, ExpectError>;

    /// Query the target process.
    fn status(&mut self) -> Result<ChildStatus, ExpectError>;

    /// Whether the target process is still running.
    fn is_alive(&mut self) -> Result<bool, ExpectError> {
        Ok(self.status()? == ChildStatus::Alive)
    }

    /// Exit code, if the target exited normally.
    fn exit_status(&mut self) -> Result<Option<i32>, ExpectError> {
        match self.status()? {
            ChildStatus::Exited(code) => Ok(Some(code)),
            _ => Ok(None),
        }
    }

    /// Terminating signal, if the target was killed by one.
    fn signal_status(&mut self) -> Result<Option<i32>, ExpectError> {
        match self.status()? {
            ChildStatus::Signaled(signal) => Ok(Some(signal)),
            _ => Ok(None),
        }
    }
}
