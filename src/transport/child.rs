//! Children spawned on a fresh pseudo-terminal

use super::channel::Channel;
use super::{ChildStatus, InteractOptions, Transport};
use crate::config::SpawnConfig;
use crate::interact::Termination;
use crate::pattern::Pattern;
use crate::result::{ExpectError, MatchResult};
use crate::tty::PtyPair;
use nix::sys::termios::Termios;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// How long a child that closed its terminal gets to be reaped before it is
/// reported alive.
const EXIT_GRACE: Duration = Duration::from_secs(1);

/// A program running with a pseudo-terminal as its controlling terminal.
///
/// The child is the leader of a new session whose controlling terminal is
/// the worker side of a fresh pair; stdin, stdout and stderr all point at
/// it. Dropping the transport kills and reaps the child if it is still
/// running.
///
/// # Examples
///
/// ```no_run
/// use binexpect::{Pattern, SpawnConfig, Transport};
///
/// # fn example() -> Result<(), binexpect::ExpectError> {
/// let mut target = SpawnConfig::builder().spawn("sh")?;
/// target.send_line(b"echo $((6 * 7))")?;
/// target.expect(Pattern::exact("42"))?;
/// # Ok(())
/// # }
/// ```
pub struct ChildProcessTransport {
    channel: Channel,
    child: Child,
}

impl ChildProcessTransport {
    /// Spawn a command line, split on whitespace.
    pub fn spawn(command: &str, config: SpawnConfig) -> Result<Self, ExpectError> {
        let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        let Some((program, args)) = parts.split_first() else {
            return Err(ExpectError::Spawn {
                command: command.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };
        Self::spawn_args(program, args, config)
    }

    /// Spawn `program` with `args`.
    pub fn spawn_args(program: &str, args: &[String], config: SpawnConfig) -> Result<Self, ExpectError> {
        let (controller, worker, worker_path) = PtyPair::open()?.into_parts();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::from(worker.try_clone()?))
            .stdout(Stdio::from(worker.try_clone()?));
        if let Some(cwd) = config.cwd() {
            cmd.current_dir(cwd);
        }
        if let Some(env) = config.env() {
            cmd.env_clear();
            cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let controller_fd = controller.as_raw_fd();
        let worker_fd = worker.as_raw_fd();
        let ignore_sighup = config.ignore_sighup();
        cmd.stderr(Stdio::from(worker));

        // SAFETY: only async-signal-safe libc calls run between fork and exec.
        unsafe {
            cmd.pre_exec(move || {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                for fd in [controller_fd, worker_fd] {
                    if fd > 2 {
                        libc::close(fd);
                    }
                }
                if ignore_sighup {
                    libc::signal(libc::SIGHUP, libc::SIG_IGN);
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|source| ExpectError::Spawn {
            command: program.to_string(),
            source,
        })?;
        // Our copies of the worker must go, or the controller never sees EOF.
        drop(cmd);

        tracing::debug!(
            pid = child.id(),
            program,
            tty = %worker_path.display(),
            "spawned child"
        );

        Ok(Self {
            channel: Channel::new(controller, &config)?,
            child,
        })
    }

    /// Process id of the child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

fn child_status(child: &mut Child, wait_for_exit: bool) -> Result<ChildStatus, ExpectError> {
    let mut status = child.try_wait()?;
    if status.is_none() && wait_for_exit {
        // The terminal closed; the child is normally a moment away from exit.
        let deadline = Instant::now() + EXIT_GRACE;
        while status.is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
            status = child.try_wait()?;
        }
    }

    Ok(match status {
        None => ChildStatus::Alive,
        Some(status) => match (status.code(), status.signal()) {
            (Some(code), _) => ChildStatus::Exited(code),
            (None, Some(signal)) => ChildStatus::Signaled(signal),
            (None, None) => ChildStatus::Alive,
        },
    })
}

impl Transport for ChildProcessTransport {
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

    fn set_echo(&mut self, on: bool) -> Result<(), ExpectError> {
        self.channel.set_echo(on)
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
        let child = &mut self.child;
        let mut alive = || matches!(child_status(child, false), Ok(ChildStatus::Alive));
        self.channel.interact(options, &mut alive)
    }

    fn status(&mut self) -> Result<ChildStatus, ExpectError> {
        let wait_for_exit = self.channel.eof_seen();
        child_status(&mut self.child, wait_for_exit)
    }
}

impl Drop for ChildProcessTransport {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            tracing::debug!(pid = self.child.id(), "killing child");
            if let Err(e) = self.child.kill().and_then(|_| self.child.wait()) {
                tracing::warn!("failed to reap child: {}", e);
            }
        }
    }
}
