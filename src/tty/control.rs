//! Control characters used to emulate operator keystrokes

use nix::sys::termios::{tcgetattr, SpecialCharacterIndices};
use std::os::fd::BorrowedFd;

/// Conventional `^C`, used when the terminal cannot be queried.
pub const DEFAULT_INTR: u8 = 0x03;

/// Conventional `^D`, used when the terminal cannot be queried.
pub const DEFAULT_EOF: u8 = 0x04;

/// The interrupt and end-of-file characters configured on a terminal.
///
/// Sending one of these bytes to a pseudo-terminal has the same effect as an
/// operator pressing the key: the worker's line discipline turns it into
/// `SIGINT` or an end-of-file for the attached program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeControlChars {
    /// Interrupt character (`VINTR`)
    pub interrupt: u8,
    /// End-of-file character (`VEOF`)
    pub eof: u8,
}

impl Default for EscapeControlChars {
    fn default() -> Self {
        Self {
            interrupt: DEFAULT_INTR,
            eof: DEFAULT_EOF,
        }
    }
}

impl EscapeControlChars {
    /// Read `VINTR` and `VEOF` from the terminal behind `fd`.
    ///
    /// Falls back to `^C`/`^D` when the attributes are unavailable, which
    /// happens when there is no terminal at all (cron jobs, closed stdio).
    pub fn resolve(fd: BorrowedFd<'_>) -> Self {
        match tcgetattr(fd) {
            Ok(mode) => Self {
                interrupt: mode.control_chars[SpecialCharacterIndices::VINTR as usize],
                eof: mode.control_chars[SpecialCharacterIndices::VEOF as usize],
            },
            Err(e) => {
                tracing::warn!(
                    "terminal control characters unavailable ({}), using ^C/^D",
                    e
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tty::PtyPair;
    use nix::sys::termios::{tcsetattr, SetArg};
    use std::os::fd::AsFd;

    #[test]
    fn test_resolve_from_terminal() {
        let pair = PtyPair::open().unwrap();

        let mut mode = tcgetattr(pair.controller()).unwrap();
        mode.control_chars[SpecialCharacterIndices::VINTR as usize] = 0x18;
        mode.control_chars[SpecialCharacterIndices::VEOF as usize] = 0x1a;
        tcsetattr(pair.controller(), SetArg::TCSANOW, &mode).unwrap();

        let chars = EscapeControlChars::resolve(pair.controller());
        assert_eq!(chars.interrupt, 0x18);
        assert_eq!(chars.eof, 0x1a);
    }

    #[test]
    fn test_resolve_falls_back_without_terminal() {
        let (reader, _writer) = nix::unistd::pipe().unwrap();

        let chars = EscapeControlChars::resolve(reader.as_fd());
        assert_eq!(chars, EscapeControlChars::default());
        assert_eq!(chars.interrupt, 0x03);
        assert_eq!(chars.eof, 0x04);
    }
}
