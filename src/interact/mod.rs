//! Interactive transfer between an operator and a target
//!
//! [`TransferSession`] relays bytes in both directions between the
//! operator's input/output and a target descriptor until the target reaches
//! end-of-file, the operator types the escape byte, or the target dies.
//! Raw mode on the operator's terminal is the caller's business; see
//! [`RawModeGuard`](crate::RawModeGuard).

use crate::result::ExpectError;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::{read, write};
use std::io::Write;
use std::os::fd::BorrowedFd;

/// Bytes read per call from either side.
pub const CHUNK_SIZE: usize = 1000;

/// A transform applied to every chunk flowing in one direction.
pub type Filter<'a> = Box<dyn FnMut(&[u8]) -> Vec<u8> + 'a>;

/// Why a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The target closed its side, either by a zero-length read or by `EIO`.
    Eof,
    /// The operator typed the escape byte.
    Escape,
    /// The target process is no longer alive.
    TargetExited,
}

/// One interactive transfer over borrowed descriptors.
///
/// # Examples
///
/// ```no_run
/// use binexpect::{PtyPair, TransferSession};
/// use std::os::fd::AsFd;
///
/// # fn example() -> Result<(), binexpect::ExpectError> {
/// let pair = PtyPair::open()?;
/// let stdin = std::io::stdin();
/// let stdout = std::io::stdout();
///
/// let ended = TransferSession::new(pair.controller(), stdin.as_fd(), stdout.as_fd())
///     .escape(Some(0x1d))
///     .run(&mut || true)?;
/// println!("transfer ended: {:?}", ended);
/// # Ok(())
/// # }
/// ```
pub struct TransferSession<'a> {
    child: BorrowedFd<'a>,
    stdin: BorrowedFd<'a>,
    stdout: BorrowedFd<'a>,
    escape: Option<u8>,
    input_filter: Option<Filter<'a>>,
    output_filter: Option<Filter<'a>>,
    log: Option<&'a mut dyn Write>,
}

impl<'a> TransferSession<'a> {
    /// Prepare a transfer between `child` and the operator's `stdin`/`stdout`.
    ///
    /// No escape byte is configured by default.
    pub fn new(child: BorrowedFd<'a>, stdin: BorrowedFd<'a>, stdout: BorrowedFd<'a>) -> Self {
        Self {
            child,
            stdin,
            stdout,
            escape: None,
            input_filter: None,
            output_filter: None,
            log: None,
        }
    }

    /// Set the byte that ends the transfer when typed by the operator.
    pub fn escape(mut self, escape: Option<u8>) -> Self {
        self.escape = escape;
        self
    }

    /// Transform operator input before escape detection and forwarding.
    pub fn input_filter(mut self, filter: impl FnMut(&[u8]) -> Vec<u8> + 'a) -> Self {
        self.input_filter = Some(Box::new(filter));
        self
    }

    /// Transform target output before it reaches the operator.
    pub fn output_filter(mut self, filter: impl FnMut(&[u8]) -> Vec<u8> + 'a) -> Self {
        self.output_filter = Some(Box::new(filter));
        self
    }

    pub(crate) fn filters(mut self, input: Option<Filter<'a>>, output: Option<Filter<'a>>) -> Self {
        self.input_filter = input;
        self.output_filter = output;
        self
    }

    /// Copy every byte relayed in either direction to `log`.
    pub fn log_to(mut self, log: Option<&'a mut dyn Write>) -> Self {
        self.log = log;
        self
    }

    /// Relay until a termination condition is reached.
    ///
    /// `alive` is consulted before every readiness wait and before every
    /// write to the target; once it returns false the transfer ends and any
    /// unwritten operator input is dropped.
    ///
    /// # Errors
    ///
    /// Any read, write or readiness failure other than interruption and the
    /// target's end-of-file.
    pub fn run(&mut self, alive: &mut dyn FnMut() -> bool) -> Result<Termination, ExpectError> {
        let mut buf = [0u8; CHUNK_SIZE];
        let mut stdin_open = true;

        while alive() {
            let (child_ready, stdin_ready) = self.wait_ready(stdin_open)?;

            if child_ready {
                match read_retrying(self.child, &mut buf) {
                    // BSD reports a closed worker as a zero-length read,
                    // Linux as EIO.
                    Ok(0) | Err(Errno::EIO) => {
                        tracing::trace!("target reached end-of-file");
                        return Ok(Termination::Eof);
                    }
                    Ok(n) => self.relay_output(&buf[..n])?,
                    Err(e) => return Err(e.into()),
                }
            }

            if stdin_ready {
                let n = read_retrying(self.stdin, &mut buf)?;
                if n == 0 {
                    tracing::debug!("operator input closed, relaying target output only");
                    stdin_open = false;
                    continue;
                }

                let mut data = match self.input_filter.as_mut() {
                    Some(filter) => filter(&buf[..n]),
                    None => buf[..n].to_vec(),
                };

                let escaped = match self.escape {
                    Some(escape) => match data.iter().rposition(|&b| b == escape) {
                        Some(pos) => {
                            data.truncate(pos);
                            true
                        }
                        None => false,
                    },
                    None => false,
                };

                if !data.is_empty() {
                    self.log(&data);
                    self.write_target(&data, alive)?;
                }
                if escaped {
                    tracing::trace!("escape byte received");
                    return Ok(Termination::Escape);
                }
            }
        }

        Ok(Termination::TargetExited)
    }

    /// Block until the target or the operator side is readable.
    fn wait_ready(&self, stdin_open: bool) -> Result<(bool, bool), ExpectError> {
        let mut fds = vec![PollFd::new(self.child, PollFlags::POLLIN)];
        if stdin_open {
            fds.push(PollFd::new(self.stdin, PollFlags::POLLIN));
        }

        loop {
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let readable = |fd: &PollFd<'_>| {
            fd.revents().is_some_and(|r| {
                r.intersects(
                    PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL,
                )
            })
        };
        Ok((readable(&fds[0]), fds.get(1).is_some_and(readable)))
    }

    fn relay_output(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        let filtered;
        let data = match self.output_filter.as_mut() {
            Some(filter) => {
                filtered = filter(data);
                &filtered[..]
            }
            None => data,
        };

        tracing::trace!(len = data.len(), "target -> operator");
        self.log(data);
        write_all(self.stdout, data)
    }

    /// Partial writes are retried until everything is written or the target
    /// is gone.
    fn write_target(
        &self,
        mut data: &[u8],
        alive: &mut dyn FnMut() -> bool,
    ) -> Result<(), ExpectError> {
        tracing::trace!(len = data.len(), "operator -> target");
        while !data.is_empty() && alive() {
            match write(self.child, data) {
                Ok(n) => data = &data[n..],
                Err(Errno::EINTR | Errno::EAGAIN) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn log(&mut self, data: &[u8]) {
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.write_all(data).and_then(|_| log.flush()) {
                tracing::warn!("failed to write session log: {}", e);
            }
        }
    }
}

/// `read(2)` that retries when interrupted by a signal.
pub(crate) fn read_retrying(fd: BorrowedFd<'_>, buf: &mut [u8]) -> nix::Result<usize> {
    loop {
        match read(fd, buf) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// Write all of `data`, retrying short writes and interruptions.
pub(crate) fn write_all(fd: BorrowedFd<'_>, mut data: &[u8]) -> Result<(), ExpectError> {
    while !data.is_empty() {
        match write(fd, data) {
            Ok(n) => data = &data[n..],
            Err(Errno::EINTR | Errno::EAGAIN) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tty::PtyPair;
    use nix::unistd::pipe;
    use std::io::Read;
    use std::os::fd::{AsFd, OwnedFd};
    use std::os::unix::net::UnixStream;

    struct Operator {
        stdin_r: OwnedFd,
        stdin_w: Option<OwnedFd>,
        stdout_r: OwnedFd,
        stdout_w: OwnedFd,
    }

    impl Operator {
        fn new() -> Self {
            let (stdin_r, stdin_w) = pipe().unwrap();
            let (stdout_r, stdout_w) = pipe().unwrap();
            Self {
                stdin_r,
                stdin_w: Some(stdin_w),
                stdout_r,
                stdout_w,
            }
        }

        fn type_keys(&self, keys: &[u8]) {
            write_all(self.stdin_w.as_ref().unwrap().as_fd(), keys).unwrap();
        }

        fn hang_up(&mut self) {
            self.stdin_w = None;
        }

        fn screen(&self) -> Vec<u8> {
            let mut buf = [0u8; 4096];
            let n = read(self.stdout_r.as_fd(), &mut buf).unwrap();
            buf[..n].to_vec()
        }
    }

    #[test]
    fn test_escape_uses_last_occurrence() {
        let (target, mut peer) = UnixStream::pair().unwrap();
        let operator = Operator::new();
        operator.type_keys(b"ab\x1dcd\x1def");

        let ended = TransferSession::new(
            target.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .escape(Some(0x1d))
        .run(&mut || true)
        .unwrap();

        assert_eq!(ended, Termination::Escape);
        drop(target);
        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"ab\x1dcd");
    }

    #[test]
    fn test_escape_alone_forwards_nothing() {
        let (target, mut peer) = UnixStream::pair().unwrap();
        let operator = Operator::new();
        operator.type_keys(b"\x1d");

        let ended = TransferSession::new(
            target.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .escape(Some(0x1d))
        .run(&mut || true)
        .unwrap();

        assert_eq!(ended, Termination::Escape);
        drop(target);
        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        assert!(received.is_empty());
    }

    #[test]
    fn test_zero_length_read_is_eof() {
        let (target, peer) = UnixStream::pair().unwrap();
        let operator = Operator::new();
        drop(peer);

        let ended = TransferSession::new(
            target.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .run(&mut || true)
        .unwrap();

        assert_eq!(ended, Termination::Eof);
    }

    #[test]
    fn test_eio_read_is_eof() {
        let (controller, worker, _) = PtyPair::open().unwrap().into_parts();
        let operator = Operator::new();
        drop(worker);

        let ended = TransferSession::new(
            controller.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .run(&mut || true)
        .unwrap();

        assert_eq!(ended, Termination::Eof);
    }

    #[test]
    fn test_output_filter_and_log() {
        let (target, mut peer) = UnixStream::pair().unwrap();
        let operator = Operator::new();
        std::io::Write::write_all(&mut peer, b"hello").unwrap();
        drop(peer);

        let mut log = Vec::new();
        let ended = TransferSession::new(
            target.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .output_filter(|data| data.to_ascii_uppercase())
        .log_to(Some(&mut log as &mut dyn Write))
        .run(&mut || true)
        .unwrap();

        assert_eq!(ended, Termination::Eof);
        assert_eq!(operator.screen(), b"HELLO");
        assert_eq!(log, b"HELLO");
    }

    #[test]
    fn test_input_filter_runs_before_escape_detection() {
        let (target, mut peer) = UnixStream::pair().unwrap();
        let operator = Operator::new();
        operator.type_keys(b"ls^");

        let ended = TransferSession::new(
            target.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .escape(Some(0x1d))
        .input_filter(|data| {
            data.iter()
                .map(|&b| if b == b'^' { 0x1d } else { b })
                .collect()
        })
        .run(&mut || true)
        .unwrap();

        assert_eq!(ended, Termination::Escape);
        drop(target);
        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"ls");
    }

    #[test]
    fn test_operator_hangup_keeps_relaying() {
        let (target, mut peer) = UnixStream::pair().unwrap();
        let mut operator = Operator::new();
        operator.hang_up();
        std::io::Write::write_all(&mut peer, b"late output").unwrap();
        drop(peer);

        let ended = TransferSession::new(
            target.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .run(&mut || true)
        .unwrap();

        assert_eq!(ended, Termination::Eof);
        assert_eq!(operator.screen(), b"late output");
    }

    #[test]
    fn test_dead_target_abandons_writes() {
        let (target, mut peer) = UnixStream::pair().unwrap();
        let operator = Operator::new();
        operator.type_keys(b"never delivered");

        let mut checks = 0;
        let ended = TransferSession::new(
            target.as_fd(),
            operator.stdin_r.as_fd(),
            operator.stdout_w.as_fd(),
        )
        .run(&mut || {
            checks += 1;
            checks == 1
        })
        .unwrap();

        assert_eq!(ended, Termination::TargetExited);
        drop(target);
        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        assert!(received.is_empty());
    }
}
