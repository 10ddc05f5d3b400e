//! The pattern-expectation engine
//!
//! An [`Expecter`] accumulates output read from a target descriptor and
//! searches it for patterns. It owns no descriptor itself; transports hand it
//! their controller on every call.

use crate::buffer::BufferManager;
use crate::config::SpawnConfig;
use crate::interact::{read_retrying, write_all};
use crate::pattern::{Matcher, Pattern};
use crate::result::{ExpectError, MatchResult};
use bytes::Bytes;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::BorrowedFd;
use std::time::{Duration, Instant};

/// Expectation state for one target.
pub struct Expecter {
    buffer: BufferManager,
    timeout: Option<Duration>,
    maxread: usize,
    search_window: Option<usize>,
    logfile: Option<Box<dyn Write + Send>>,
    delay_before_send: Duration,
    eof: bool,
}

impl Expecter {
    /// Create the expectation state described by `config`, opening its
    /// session log for appending.
    pub fn new(config: &SpawnConfig) -> Result<Self, ExpectError> {
        let logfile: Option<Box<dyn Write + Send>> = match config.logfile() {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                tracing::debug!(path = %path.display(), "logging session");
                Some(Box::new(file))
            }
            None => None,
        };

        Ok(Self {
            buffer: BufferManager::new(config.maxread()),
            timeout: config.timeout(),
            maxread: config.maxread(),
            search_window: config.search_window(),
            logfile,
            delay_before_send: config.delay_before_send(),
            eof: false,
        })
    }

    /// The session log, if any.
    pub fn logger(&mut self) -> Option<&mut dyn Write> {
        self.logfile.as_deref_mut().map(|w| w as &mut dyn Write)
    }

    /// Whether the target has been seen to close its side.
    pub fn eof_seen(&self) -> bool {
        self.eof
    }

    pub(crate) fn set_eof(&mut self) {
        self.eof = true;
    }

    /// Take all output no expectation has consumed yet.
    pub fn take_pending(&mut self) -> Bytes {
        self.buffer.take_all()
    }

    /// Write `data` to `fd` and the session log.
    pub fn send(&mut self, fd: BorrowedFd<'_>, data: &[u8]) -> Result<usize, ExpectError> {
        if !self.delay_before_send.is_zero() {
            std::thread::sleep(self.delay_before_send);
        }
        write_all(fd, data)?;
        self.log(data);
        Ok(data.len())
    }

    /// Wait until one of `patterns` matches output read from `fd`.
    ///
    /// `timeout` and `search_window` override the configured defaults when
    /// given. The earliest match in the buffer wins; when two patterns match
    /// at the same position the one listed first wins.
    ///
    /// # Errors
    ///
    /// - `ExpectError::Timeout` if nothing matched in time and
    ///   `Pattern::Timeout` is not listed
    /// - `ExpectError::Eof` if the target closed and `Pattern::Eof` is not
    ///   listed
    /// - `ExpectError::Pattern` for an empty exact pattern
    pub fn expect_with(
        &mut self,
        fd: BorrowedFd<'_>,
        patterns: &[Pattern],
        timeout: Option<Duration>,
        search_window: Option<usize>,
    ) -> Result<MatchResult, ExpectError> {
        let timeout = timeout.or(self.timeout);
        let window = search_window.or(self.search_window);

        let mut matchers: Vec<(usize, Box<dyn Matcher>)> = Vec::new();
        let mut eof_index = None;
        let mut timeout_index = None;
        for (idx, pattern) in patterns.iter().enumerate() {
            match pattern {
                Pattern::Eof => {
                    eof_index.get_or_insert(idx);
                }
                Pattern::Timeout => {
                    timeout_index.get_or_insert(idx);
                }
                _ => {
                    if let Some(matcher) = pattern.to_matcher()? {
                        matchers.push((idx, matcher));
                    }
                }
            }
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut chunk = vec![0u8; self.maxread];

        loop {
            if let Some(result) = self.search(&matchers, window) {
                return Ok(result);
            }

            if self.eof {
                return match eof_index {
                    Some(idx) => Ok(MatchResult {
                        pattern_index: idx,
                        matched: Bytes::new(),
                        before: self.buffer.take_all(),
                        captures: vec![],
                    }),
                    None => Err(ExpectError::Eof),
                };
            }

            let remaining = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        let duration = timeout.unwrap_or_default();
                        return match timeout_index {
                            Some(idx) => Ok(MatchResult {
                                pattern_index: idx,
                                matched: Bytes::new(),
                                before: Bytes::copy_from_slice(self.buffer.as_bytes()),
                                captures: vec![],
                            }),
                            None => Err(ExpectError::Timeout { duration }),
                        };
                    }
                    Some(remaining)
                }
                None => None,
            };

            if !wait_readable(fd, remaining)? {
                continue;
            }

            match read_retrying(fd, &mut chunk) {
                Ok(0) | Err(Errno::EIO) => {
                    tracing::debug!("target reached end-of-file");
                    self.eof = true;
                }
                Ok(n) => {
                    tracing::trace!(len = n, "read from target");
                    self.log(&chunk[..n]);
                    self.buffer.append(&chunk[..n]);
                }
                Err(Errno::EAGAIN) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn search(
        &mut self,
        matchers: &[(usize, Box<dyn Matcher>)],
        window: Option<usize>,
    ) -> Option<MatchResult> {
        let (offset, haystack) = self.buffer.window(window);

        let mut best: Option<(usize, crate::pattern::Match)> = None;
        for (idx, matcher) in matchers {
            if let Some(m) = matcher.find(haystack) {
                if best.as_ref().is_none_or(|(_, b)| m.start < b.start) {
                    best = Some((*idx, m));
                }
            }
        }

        let (pattern_index, m) = best?;
        let (before, matched) = self.buffer.consume(offset + m.start, offset + m.end);
        Some(MatchResult {
            pattern_index,
            matched,
            before,
            captures: m.captures,
        })
    }

    fn log(&mut self, data: &[u8]) {
        if let Some(log) = self.logfile.as_mut() {
            if let Err(e) = log.write_all(data).and_then(|_| log.flush()) {
                tracing::warn!("failed to write session log: {}", e);
            }
        }
    }
}

/// Wait up to `timeout` for `fd` to become readable.
///
/// Returns false when the wait expired or was interrupted.
fn wait_readable(fd: BorrowedFd<'_>, timeout: Option<Duration>) -> Result<bool, ExpectError> {
    let timeout = match timeout {
        // Longer waits are split into several polls.
        Some(t) => PollTimeout::from(t.as_micros().div_ceil(1000).min(u16::MAX as u128) as u16),
        None => PollTimeout::NONE,
    };

    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, timeout) {
        Ok(0) => Ok(false),
        Ok(_) => Ok(fds[0].revents().is_some_and(|r| !r.is_empty())),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
