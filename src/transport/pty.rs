//! Bare terminals for a second program to attach to

use super::channel::Channel;
use super::{ChildStatus, InteractOptions, Transport};
use crate::config::SpawnConfig;
use crate::interact::Termination;
use crate::pattern::Pattern;
use crate::result::{ExpectError, MatchResult};
use crate::tty::PtyPair;
use nix::sys::termios::Termios;
use std::io::Write;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A pseudo-terminal with nothing spawned on it.
///
/// The worker side is kept open so that another program, typically a
/// debugger told to use it as the inferior's terminal, can attach to
/// [`worker_path`](PtyTransport::worker_path) at any time. There is no
/// process to watch, so the target always counts as alive.
///
/// # Examples
///
/// ```no_run
/// use binexpect::SpawnConfig;
///
/// # fn example() -> Result<(), binexpect::ExpectError> {
/// let tty = SpawnConfig::builder().verbose(true).open_tty()?;
/// println!("run: gdb -q ./target --tty {}", tty.worker_path().display());
/// # Ok(())
/// # }
/// ```
pub struct PtyTransport {
    channel: Channel,
    worker: OwnedFd,
    worker_path: PathBuf,
}

impl PtyTransport {
    /// Allocate a new terminal.
    ///
    /// With `verbose` set in `config`, the worker path is announced on
    /// stderr.
    pub fn open(config: SpawnConfig) -> Result<Self, ExpectError> {
        let (controller, worker, worker_path) = PtyPair::open()?.into_parts();

        if config.verbose() {
            let mut stderr = std::io::stderr();
            write!(stderr, "New tty spawned at {}\r\n", worker_path.display())?;
            stderr.flush()?;
        }

        Ok(Self {
            channel: Channel::new(controller, &config)?,
            worker,
            worker_path,
        })
    }

    /// Path of the worker device.
    pub fn worker_path(&self) -> &Path {
        &self.worker_path
    }

    /// The worker descriptor.
    pub fn worker(&self) -> BorrowedFd<'_> {
        self.worker.as_fd()
    }
}

impl Transport for PtyTransport {
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
        self.channel.echo()
    }

    /// Echo belongs to whoever attaches to the worker, so it is never changed
    /// here.
    fn set_echo(&mut self, _on: bool) -> Result<(), ExpectError> {
        tracing::warn!("set_echo ignored: echo is governed by the worker terminal");
        Err(ExpectError::Unsupported(
            "echo is governed by the worker terminal's line discipline",
        ))
    }

    fn change_mode(&mut self, edit: &mut dyn FnMut(&mut Termios)) -> Result<Termios, ExpectError> {
        self.channel.change_mode(edit)
    }

    fn restore_mode(&mut self) -> Result<(), ExpectError> {
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
