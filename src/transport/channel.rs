//! State shared by every transport

use super::InteractOptions;
use crate::config::SpawnConfig;
use crate::expect::Expecter;
use crate::interact::{write_all, Termination, TransferSession};
use crate::pattern::Pattern;
use crate::result::{ExpectError, MatchResult};
use crate::tty::{EscapeControlChars, ModeStack, RawModeGuard};
use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg, Termios};
use nix::unistd::isatty;
use std::cell::OnceCell;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::time::Duration;

/// The controller side of a target and everything tracked about it.
pub(crate) struct Channel {
    controller: OwnedFd,
    expecter: Expecter,
    modes: ModeStack,
    control: OnceCell<EscapeControlChars>,
}

impl Channel {
    pub(crate) fn new(controller: OwnedFd, config: &SpawnConfig) -> Result<Self, ExpectError> {
        Ok(Self {
            controller,
            expecter: Expecter::new(config)?,
            modes: ModeStack::new(),
            control: OnceCell::new(),
        })
    }

    pub(crate) fn fd(&self) -> BorrowedFd<'_> {
        self.controller.as_fd()
    }

    pub(crate) fn eof_seen(&self) -> bool {
        self.expecter.eof_seen()
    }

    pub(crate) fn send(&mut self, data: &[u8]) -> Result<usize, ExpectError> {
        self.expecter.send(self.controller.as_fd(), data)
    }

    /// Resolved on first use, then fixed for the life of the channel.
    fn control_chars(&self) -> EscapeControlChars {
        *self
            .control
            .get_or_init(|| EscapeControlChars::resolve(self.controller.as_fd()))
    }

    pub(crate) fn send_eof(&mut self) -> Result<(), ExpectError> {
        let eof = self.control_chars().eof;
        self.send(&[eof]).map(|_| ())
    }

    pub(crate) fn send_intr(&mut self) -> Result<(), ExpectError> {
        let intr = self.control_chars().interrupt;
        self.send(&[intr]).map(|_| ())
    }

    pub(crate) fn echo(&self) -> Result<bool, ExpectError> {
        let mode = tcgetattr(self.fd())?;
        Ok(mode.local_flags.contains(LocalFlags::ECHO))
    }

    pub(crate) fn set_echo(&mut self, on: bool) -> Result<(), ExpectError> {
        let mut mode = tcgetattr(self.fd())?;
        mode.local_flags.set(LocalFlags::ECHO, on);
        tcsetattr(self.fd(), SetArg::TCSANOW, &mode)?;
        Ok(())
    }

    pub(crate) fn change_mode(
        &mut self,
        edit: &mut dyn FnMut(&mut Termios),
    ) -> Result<Termios, ExpectError> {
        self.modes.change(self.controller.as_fd(), edit)
    }

    pub(crate) fn restore_mode(&mut self) -> Result<(), ExpectError> {
        self.modes.restore(self.controller.as_fd())
    }

    pub(crate) fn expect_with(
        &mut self,
        patterns: &[Pattern],
        timeout: Option<Duration>,
        search_window: Option<usize>,
    ) -> Result<MatchResult, ExpectError> {
        self.expecter
            .expect_with(self.controller.as_fd(), patterns, timeout, search_window)
    }

    pub(crate) fn interact(
        &mut self,
        options: InteractOptions<'_>,
        alive: &mut dyn FnMut() -> bool,
    ) -> Result<Termination, ExpectError> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let input = options.stdin.unwrap_or(stdin.as_fd());
        let output = options.stdout.unwrap_or(stdout.as_fd());

        let pending = self.expecter.take_pending();
        if !pending.is_empty() {
            write_all(output, &pending)?;
        }

        let _raw = if isatty(input).unwrap_or(false) {
            Some(RawModeGuard::acquire(input)?)
        } else {
            tracing::debug!("operator input is not a terminal, leaving its mode alone");
            None
        };

        let ended = TransferSession::new(self.controller.as_fd(), input, output)
            .escape(options.escape)
            .filters(options.input_filter, options.output_filter)
            .log_to(self.expecter.logger())
            .run(alive)?;

        tracing::debug!(?ended, "interactive transfer finished");
        if ended == Termination::Eof {
            self.expecter.set_eof();
        }
        Ok(ended)
    }
}
