//! Targets reached through a descriptor the caller already holds

use super::channel::Channel;
use super::{ChildStatus, InteractOptions, Transport};
use crate::config::SpawnConfig;
use crate::interact::Termination;
use crate::pattern::Pattern;
use crate::result::{ExpectError, MatchResult};
use nix::sys::termios::Termios;
use nix::unistd::isatty;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::time::Duration;

/// An already-open descriptor: a socket, a pipe, or a terminal obtained
/// elsewhere.
///
/// Nothing is spawned, so the target always counts as alive. Terminal
/// operations only work when the descriptor is a terminal; on anything else
/// `set_echo` and mode changes return `ExpectError::Unsupported` and
/// [`echo`](Transport::echo) reports false. Pass `nlcr(false)` to
/// [`PromptOptions`](crate::PromptOptions) when prompting on such a target.
///
/// # Examples
///
/// ```no_run
/// use binexpect::{BinaryFraming, Pattern, SpawnConfig, Transport};
/// use std::net::TcpStream;
/// use std::os::fd::OwnedFd;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = TcpStream::connect("127.0.0.1:31337")?;
/// let mut target = SpawnConfig::builder().attach(OwnedFd::from(stream))?;
/// target.expect(Pattern::exact("> "))?;
/// target.send_line(b"\xef\xbe\xad\xde")?;
/// # Ok(())
/// # }
/// ```
pub struct FdTransport {
    channel: Channel,
    terminal: bool,
}

impl FdTransport {
    /// Drive `fd`, which is closed when the transport is dropped.
    pub fn new(fd: OwnedFd, config: SpawnConfig) -> Result<Self, ExpectError> {
        let terminal = isatty(fd.as_fd()).unwrap_or(false);
        tracing::debug!(terminal, "attached to descriptor");

        Ok(Self {
            channel: Channel::new(fd, &config)?,
            terminal,
        })
    }

    /// Whether the descriptor is a terminal.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn require_terminal(&self) -> Result<(), ExpectError> {
        if self.terminal {
            Ok(())
        } else {
            Err(ExpectError::Unsupported("descriptor is not a terminal"))
        }
    }
}

impl Transport for FdTransport {
    fn controller(&self) -> BorrowedFd<'_> {
        self.channel.fd()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, ExpectError> {
        self.channel.send(data)
    }

    fn send_eof(&mut self) -> Result<(), ExpectError> {
        self.channel.send_eof()
    }

    fn send_intr(&mut self) -> Result<(), ExpectError> {
        self.channel.send_intr()
    }

    fn echo(&self) -> Result<bool, ExpectError> {
        if self.terminal {
            self.channel.echo()
        } else {
            Ok(false)
        }
    }

    fn set_echo(&mut self, on: bool) -> Result<(), ExpectError> {
        self.require_terminal()?;
        self.channel.set_echo(on)
    }

    fn change_mode(&mut self, edit: &mut dyn FnMut(&mut Termios)) -> Result<Termios, ExpectError> {
        self.require_terminal()?;
        self.channel.change_mode(edit)
    }

    fn restore_mode(&mut self) -> Result<(), ExpectError> {
        self.require_terminal()?;
        self.channel.restore_mode()
    }

    fn expect_with(
        &mut self,
        patterns: &[Pattern],
        timeout: Option<Duration>,
        search_window: Option<usize>,
    ) -> Result<MatchResult, ExpectError> {
        self.channel.expect_with(patterns, timeout, search_window)
    }

    fn interact(&mut self, options: InteractOptions<'_>) -> Result<Termination, ExpectError> {
        self.channel.interact(options, &mut || true)
    }

    fn status(&mut self) -> Result<ChildStatus, ExpectError> {
        Ok(ChildStatus::Alive)
    }
}
