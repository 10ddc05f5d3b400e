//! Terminal mode save/restore

use crate::result::ExpectError;
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};
use std::os::fd::BorrowedFd;

/// Puts a terminal into raw mode for as long as the guard lives.
///
/// The mode captured on [`RawModeGuard::acquire`] is restored exactly once:
/// by an explicit [`release`](RawModeGuard::release), or on drop if the
/// guarded code returned early, failed or unwound.
///
/// # Examples
///
/// ```no_run
/// use binexpect::RawModeGuard;
/// use std::os::fd::AsFd;
///
/// # fn example() -> Result<(), binexpect::ExpectError> {
/// let stdin = std::io::stdin();
/// let guard = RawModeGuard::acquire(stdin.as_fd())?;
/// // ... every keystroke now reaches us unmodified ...
/// drop(guard);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RawModeGuard<'fd> {
    fd: BorrowedFd<'fd>,
    saved: Option<Termios>,
}

impl<'fd> RawModeGuard<'fd> {
    /// Capture the current mode of `fd` and switch it to raw mode.
    ///
    /// Raw mode turns off echo, canonical line editing, and the driver's
    /// handling of signal-generating characters.
    ///
    /// # Errors
    ///
    /// Fails if `fd` is not a terminal or its attributes cannot be changed.
    /// The terminal is left untouched in that case.
    pub fn acquire(fd: BorrowedFd<'fd>) -> Result<Self, ExpectError> {
        let saved = tcgetattr(fd)?;
        let mut raw = saved.clone();
        cfmakeraw(&mut raw);
        tcsetattr(fd, SetArg::TCSAFLUSH, &raw)?;

        tracing::trace!("terminal switched to raw mode");
        Ok(Self {
            fd,
            saved: Some(saved),
        })
    }

    /// Restore the captured mode. Further calls do nothing.
    pub fn release(&mut self) -> Result<(), ExpectError> {
        if let Some(saved) = self.saved.take() {
            tcsetattr(self.fd, SetArg::TCSADRAIN, &saved)?;
            tracing::trace!("terminal mode restored");
        }
        Ok(())
    }

    /// The mode that will be restored, if not already released.
    pub fn saved(&self) -> Option<&Termios> {
        self.saved.as_ref()
    }
}

impl Drop for RawModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Stack of modes saved by [`ModeStack::change`].
///
/// Each change records what the terminal looked like before, so nested
/// changes can be undone in reverse order. A change that turns out to be a
/// no-op records a marker instead, and undoing it leaves the terminal alone.
#[derive(Debug, Default)]
pub struct ModeStack {
    saved: Vec<Option<Termios>>,
}

impl ModeStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `edit` to the current mode of `fd` and remember the old one.
    ///
    /// Returns the mode now in effect.
    pub fn change(
        &mut self,
        fd: BorrowedFd<'_>,
        edit: &mut dyn FnMut(&mut Termios),
    ) -> Result<Termios, ExpectError> {
        let current = tcgetattr(fd)?;
        let mut mode = current.clone();
        edit(&mut mode);

        if same_mode(&mode, &current) {
            self.saved.push(None);
        } else {
            tcsetattr(fd, SetArg::TCSADRAIN, &mode)?;
            self.saved.push(Some(current));
        }
        Ok(mode)
    }

    /// Undo the most recent change. Does nothing if the stack is empty.
    pub fn restore(&mut self, fd: BorrowedFd<'_>) -> Result<(), ExpectError> {
        match self.saved.pop() {
            Some(Some(mode)) => tcsetattr(fd, SetArg::TCSADRAIN, &mode)?,
            Some(None) => {}
            None => tracing::debug!("restore_mode called with no saved mode"),
        }
        Ok(())
    }
}

/// Compare two modes field by field, including control characters.
pub fn same_mode(a: &Termios, b: &Termios) -> bool {
    a.input_flags == b.input_flags
        && a.output_flags == b.output_flags
        && a.control_flags == b.control_flags
        && a.local_flags == b.local_flags
        && a.control_chars == b.control_chars
}
