//! Binary-safe sending through a cooked terminal
//!
//! A terminal in canonical mode interprets control bytes: `^C` raises a
//! signal, `^D` ends the line, `^U` erases it. Preceding every byte with the
//! literal-next character (`^V`, 0x16) makes the line discipline hand it to
//! the reader unmodified.

use crate::result::ExpectError;
use crate::transport::Transport;
use nix::sys::termios::OutputFlags;

/// Byte placed before every payload byte.
pub const FRAME_MARKER: u8 = 0x16;

/// Frame `payload` so every byte survives a cooked terminal.
///
/// The result is exactly twice as long as the input.
///
/// # Examples
///
/// ```
/// use binexpect::frame;
///
/// assert_eq!(frame(b"\x03A"), b"\x16\x03\x16A");
/// ```
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() * 2);
    for &byte in payload {
        framed.push(FRAME_MARKER);
        framed.push(byte);
    }
    framed
}

/// Raw binary sending and newline translation.
///
/// Implemented for every [`Transport`].
///
/// # Examples
///
/// ```no_run
/// use binexpect::{BinaryFraming, Pattern, SpawnConfig, Transport};
///
/// # fn example() -> Result<(), binexpect::ExpectError> {
/// let mut target = SpawnConfig::builder().spawn("./vulnerable")?;
/// target.set_nonlcr()?;
/// target.send_bin_line(&[0xef, 0xbe, 0xad, 0xde, 0x0a])?;
/// # Ok(())
/// # }
/// ```
pub trait BinaryFraming: Transport {
    /// Frame `payload` and send it.
    fn send_bin(&mut self, payload: &[u8]) -> Result<usize, ExpectError> {
        self.send(&frame(payload))
    }

    /// Frame `payload` and send it followed by an unframed newline.
    fn send_bin_line(&mut self, payload: &[u8]) -> Result<usize, ExpectError> {
        self.send_line(&frame(payload))
    }

    /// Translate `\n` to `\r\n` in the target's output.
    ///
    /// The previous mode is pushed on the mode stack; undo with
    /// [`Transport::restore_mode`].
    fn set_nlcr(&mut self) -> Result<(), ExpectError> {
        self.change_mode(&mut |mode| mode.output_flags.insert(OutputFlags::ONLCR))?;
        Ok(())
    }

    /// Stop translating `\n` in the target's output.
    ///
    /// The previous mode is pushed on the mode stack; undo with
    /// [`Transport::restore_mode`].
    fn set_nonlcr(&mut self) -> Result<(), ExpectError> {
        self.change_mode(&mut |mode| mode.output_flags.remove(OutputFlags::ONLCR))?;
        Ok(())
    }
}

impl<T: Transport + ?Sized> BinaryFraming for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnConfig;
    use crate::tty::RawModeGuard;
    use nix::sys::termios::tcgetattr;
    use nix::unistd::read;
    use proptest::prelude::*;
    use std::os::fd::AsFd;

    proptest! {
        #[test]
        fn test_frame_doubles_length(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let framed = frame(&payload);
            prop_assert_eq!(framed.len(), payload.len() * 2);
        }

        #[test]
        fn test_frame_layout(payload in proptest::collection::vec(any::<u8>(), 1..512)) {
            let framed = frame(&payload);
            for (i, &byte) in payload.iter().enumerate() {
                prop_assert_eq!(framed[2 * i], FRAME_MARKER);
                prop_assert_eq!(framed[2 * i + 1], byte);
            }
        }
    }

    #[test]
    fn test_frame_empty() {
        assert!(frame(b"").is_empty());
    }

    #[test]
    fn test_send_bin_reaches_worker_framed() {
        let mut tty = SpawnConfig::builder().open_tty().unwrap();
        let worker = tty.worker().try_clone_to_owned().unwrap();
        let _raw = RawModeGuard::acquire(worker.as_fd()).unwrap();

        tty.send_bin(b"\x03\n").unwrap();

        let mut buf = [0u8; 16];
        let n = read(worker.as_fd(), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"\x16\x03\x16\n");
    }

    #[test]
    fn test_nlcr_toggles_and_restores() {
        let mut tty = SpawnConfig::builder().open_tty().unwrap();
        let onlcr = |tty: &crate::PtyTransport| {
            tcgetattr(tty.controller())
                .unwrap()
                .output_flags
                .contains(OutputFlags::ONLCR)
        };
        let initial = onlcr(&tty);

        tty.set_nonlcr().unwrap();
        assert!(!onlcr(&tty));
        tty.set_nlcr().unwrap();
        assert!(onlcr(&tty));

        tty.restore_mode().unwrap();
        assert!(!onlcr(&tty));
        tty.restore_mode().unwrap();
        assert_eq!(onlcr(&tty), initial);
    }
}
