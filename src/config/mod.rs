//! Spawn configuration

use crate::result::ExpectError;
use crate::transport::{ChildProcessTransport, FdTransport, PtyTransport};
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for expect operations (in seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of bytes read from the target per call
const DEFAULT_MAXREAD: usize = 2000;

/// Options shared by every transport.
///
/// A `SpawnConfig` is immutable; build one with [`SpawnConfig::builder`].
///
/// # Defaults
///
/// - Timeout: 30 seconds
/// - Max read: 2000 bytes
/// - Search window: whole buffer
/// - No session log, working directory or environment override
/// - `SIGHUP` ignored by spawned children
/// - Not verbose, no delay before sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    timeout: Option<Duration>,
    maxread: usize,
    search_window: Option<usize>,
    logfile: Option<PathBuf>,
    cwd: Option<PathBuf>,
    env: Option<Vec<(String, String)>>,
    ignore_sighup: bool,
    verbose: bool,
    delay_before_send: Duration,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            maxread: DEFAULT_MAXREAD,
            search_window: None,
            logfile: None,
            cwd: None,
            env: None,
            ignore_sighup: true,
            verbose: false,
            delay_before_send: Duration::ZERO,
        }
    }
}

impl SpawnConfig {
    /// Start building a configuration from the defaults.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use binexpect::{SpawnConfig, Transport};
    /// use std::time::Duration;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut target = SpawnConfig::builder()
    ///     .timeout(Duration::from_secs(60))
    ///     .maxread(4096)
    ///     .spawn("python3 -i")?;
    /// target.send_line(b"print('hello')")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> SpawnBuilder {
        SpawnBuilder::new()
    }

    /// Default timeout for expectations; `None` waits forever.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Maximum number of bytes read from the target per call.
    pub fn maxread(&self) -> usize {
        self.maxread
    }

    /// Default search window; `None` searches the whole buffer.
    pub fn search_window(&self) -> Option<usize> {
        self.search_window
    }

    /// File receiving a copy of everything read from and sent to the target.
    pub fn logfile(&self) -> Option<&Path> {
        self.logfile.as_deref()
    }

    /// Working directory for spawned children.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Environment replacing the one spawned children would inherit.
    pub fn env(&self) -> Option<&[(String, String)]> {
        self.env.as_deref()
    }

    /// Whether spawned children ignore `SIGHUP`.
    pub fn ignore_sighup(&self) -> bool {
        self.ignore_sighup
    }

    /// Whether new terminals are announced on stderr.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Pause before every send.
    pub fn delay_before_send(&self) -> Duration {
        self.delay_before_send
    }
}

/// Builder for [`SpawnConfig`] and the transports that use it.
#[derive(Debug, Clone, Default)]
pub struct SpawnBuilder {
    config: SpawnConfig,
}

impl SpawnBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for expect operations.
    ///
    /// If a pattern is not matched within this duration, `expect()` will return
    /// a timeout error unless `Pattern::Timeout` is in the pattern list.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable timeout (wait indefinitely).
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set how many bytes are read from the target per call (default: 2000).
    ///
    /// Zero is treated as one.
    pub fn maxread(mut self, maxread: usize) -> Self {
        self.config.maxread = maxread.max(1);
        self
    }

    /// Only search the newest `size` bytes of unmatched output.
    pub fn search_window(mut self, size: usize) -> Self {
        self.config.search_window = Some(size);
        self
    }

    /// Append a copy of all target traffic to `path`.
    pub fn logfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.logfile = Some(path.into());
        self
    }

    /// Run spawned children in `dir`.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cwd = Some(dir.into());
        self
    }

    /// Add a variable to the child's environment.
    ///
    /// Once any variable is set the child no longer inherits the caller's
    /// environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .env
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Let spawned children receive `SIGHUP` (default: ignored).
    pub fn ignore_sighup(mut self, ignore: bool) -> Self {
        self.config.ignore_sighup = ignore;
        self
    }

    /// Announce new terminals on stderr.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Pause for `delay` before every send.
    pub fn delay_before_send(mut self, delay: Duration) -> Self {
        self.config.delay_before_send = delay;
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> SpawnConfig {
        self.config
    }

    /// Spawn a command line, split on whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The command string is empty
    /// - The pseudo-terminal cannot be allocated
    /// - The process cannot be spawned
    pub fn spawn(self, command: &str) -> Result<ChildProcessTransport, ExpectError> {
        ChildProcessTransport::spawn(command, self.config)
    }

    /// Spawn `program` with explicit arguments.
    pub fn spawn_args<I, S>(self, program: &str, args: I) -> Result<ChildProcessTransport, ExpectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        ChildProcessTransport::spawn_args(program, &args, self.config)
    }

    /// Open a new pseudo-terminal with no program attached.
    pub fn open_tty(self) -> Result<PtyTransport, ExpectError> {
        PtyTransport::open(self.config)
    }

    /// Drive a descriptor opened elsewhere, such as a connected socket.
    pub fn attach(self, fd: OwnedFd) -> Result<FdTransport, ExpectError> {
        FdTransport::new(fd, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpawnConfig::builder().build();

        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.maxread(), 2000);
        assert_eq!(config.search_window(), None);
        assert!(config.logfile().is_none());
        assert!(config.env().is_none());
        assert!(config.ignore_sighup());
        assert!(!config.verbose());
        assert_eq!(config.delay_before_send(), Duration::ZERO);
    }

    #[test]
    fn test_builder_overrides() {
        let config = SpawnConfig::builder()
            .no_timeout()
            .maxread(0)
            .search_window(64)
            .logfile("/tmp/session.log")
            .cwd("/tmp")
            .env("TERM", "dumb")
            .env("LANG", "C")
            .ignore_sighup(false)
            .verbose(true)
            .build();

        assert_eq!(config.timeout(), None);
        assert_eq!(config.maxread(), 1);
        assert_eq!(config.search_window(), Some(64));
        assert_eq!(config.logfile(), Some(Path::new("/tmp/session.log")));
        assert_eq!(config.cwd(), Some(Path::new("/tmp")));
        assert_eq!(
            config.env().unwrap(),
            &[
                ("TERM".to_string(), "dumb".to_string()),
                ("LANG".to_string(), "C".to_string())
            ]
        );
        assert!(!config.ignore_sighup());
        assert!(config.verbose());
    }
}
