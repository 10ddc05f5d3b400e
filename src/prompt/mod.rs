//! Handing a target to the operator
//!
//! [`InteractivePrompting`] wraps [`Transport::interact`] with the chores a
//! script needs around it: echo and newline handling, an escape-character
//! banner, and what to do when the target died in the meantime. Its
//! [`try_expect`](InteractivePrompting::try_expect) turns a failed
//! expectation into a chance for the operator to step in.

mod signals;

pub use signals::signal_name;

use crate::framing::BinaryFraming;
use crate::interact::write_all;
use crate::pattern::Pattern;
use crate::result::{ExpectError, MatchResult};
use crate::transport::{ChildStatus, InteractOptions, Transport};
use nix::sys::signal::{kill, signal, SigHandler, Signal};
use nix::unistd::{isatty, Pid};
use std::io::{IsTerminal, Write};
use std::os::fd::BorrowedFd;
use std::time::Duration;

/// Banner for [`InteractivePrompting::pwned`].
const SPLASH: &str = "\r\n  ==[ shell acquired, the target is yours ]==\r\n\r\n";

/// Options for [`InteractivePrompting::prompt`].
///
/// By default echo is turned on, newline translation is enabled for the
/// duration, the escape character is announced, and the hosting process
/// follows the target if it dies.
pub struct PromptOptions<'a> {
    text: Option<String>,
    interact: InteractOptions<'a>,
    echo: Option<bool>,
    nlcr: bool,
    print_escape_character: bool,
    exit_with_program: bool,
}

impl Default for PromptOptions<'_> {
    fn default() -> Self {
        Self {
            text: None,
            interact: InteractOptions::default(),
            echo: Some(true),
            nlcr: true,
            print_escape_character: true,
            exit_with_program: true,
        }
    }
}

impl<'a> PromptOptions<'a> {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text shown to the operator before the transfer starts.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Options for the transfer itself.
    pub fn interact(mut self, interact: InteractOptions<'a>) -> Self {
        self.interact = interact;
        self
    }

    /// Echo setting during the transfer; `None` leaves it alone.
    pub fn echo(mut self, echo: Option<bool>) -> Self {
        self.echo = echo;
        self
    }

    /// Enable `\n` to `\r\n` translation for the duration.
    pub fn nlcr(mut self, nlcr: bool) -> Self {
        self.nlcr = nlcr;
        self
    }

    /// Announce the escape character on a terminal.
    pub fn print_escape_character(mut self, print: bool) -> Self {
        self.print_escape_character = print;
        self
    }

    /// Terminate the hosting process the same way the target terminated.
    pub fn exit_with_program(mut self, exit: bool) -> Self {
        self.exit_with_program = exit;
        self
    }
}

/// Where diagnostics for the operator go.
#[derive(Clone, Copy)]
struct Console<'a> {
    fd: Option<BorrowedFd<'a>>,
}

impl Console<'_> {
    fn is_terminal(&self) -> bool {
        match self.fd {
            Some(fd) => isatty(fd).unwrap_or(false),
            None => std::io::stdout().is_terminal(),
        }
    }

    fn write(&self, text: &str) -> Result<(), ExpectError> {
        match self.fd {
            Some(fd) => write_all(fd, text.as_bytes()),
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
                Ok(())
            }
        }
    }
}

/// Interactive handoff, implemented for every [`Transport`].
///
/// # Examples
///
/// ```no_run
/// use binexpect::{BinaryFraming, InteractivePrompting, Pattern, PromptOptions, SpawnConfig};
///
/// # fn example() -> Result<(), binexpect::ExpectError> {
/// let mut target = SpawnConfig::builder().spawn("./challenge")?;
/// target.try_expect(Pattern::exact("name: "))?;
/// target.send_bin_line(b"\x90\x90\x90\x90")?;
/// target.prompt(PromptOptions::new().text("$ "))?;
/// # Ok(())
/// # }
/// ```
pub trait InteractivePrompting: Transport {
    /// Let the operator drive the target until they type the escape byte or
    /// the target ends.
    ///
    /// If the target is still alive afterwards, echo and newline translation
    /// are put back. If it died, its fate is reported and, unless disabled,
    /// mirrored onto this process.
    fn prompt(&mut self, options: PromptOptions<'_>) -> Result<(), ExpectError> {
        let PromptOptions {
            text,
            interact,
            echo,
            nlcr,
            print_escape_character,
            exit_with_program,
        } = options;
        let console = Console {
            fd: interact.operator_output(),
        };

        let old_echo = self.echo()?;
        let mut restore_echo = false;
        if let Some(on) = echo {
            match self.set_echo(on) {
                Ok(()) => restore_echo = on != old_echo,
                Err(ExpectError::Unsupported(reason)) => {
                    let mut stderr = std::io::stderr();
                    write!(stderr, "Echo left unchanged: {}.\r\n", reason)?;
                }
                Err(e) => return Err(e),
            }
        }

        if nlcr {
            self.set_nlcr()?;
        }

        if console.is_terminal() {
            if let Some(escape) = interact.escape_byte().filter(|_| print_escape_character) {
                console.write(&format!(
                    "Escape character is '^{}'\r\n",
                    char::from(escape.wrapping_add(64))
                ))?;
            }
            if let Some(text) = &text {
                console.write(text)?;
            }
        }

        if let Err(e) = self.interact(interact) {
            if let Err(restore) = restore_terminal(self, nlcr, restore_echo.then_some(old_echo)) {
                tracing::warn!("failed to restore target terminal: {}", restore);
            }
            return Err(e);
        }

        if self.is_alive()? {
            return restore_terminal(self, nlcr, restore_echo.then_some(old_echo));
        }

        let status = self.status()?;
        report_target(console, status, exit_with_program)?;
        Ok(())
    }

    /// Celebrate on a terminal, then [`prompt`](InteractivePrompting::prompt)
    /// without ever exiting this process.
    ///
    /// Meant for the end of an exploit, when the target is a shell the
    /// operator should be left with. `exit_with_program` is forced off.
    fn pwned(&mut self, options: PromptOptions<'_>) -> Result<(), ExpectError> {
        let console = Console {
            fd: options.interact.operator_output(),
        };
        if console.is_terminal() {
            console.write(SPLASH)?;
        }
        self.prompt(options.exit_with_program(false))
    }

    /// Expect `pattern` with the configured defaults, recovering from
    /// timeouts and a dead target.
    ///
    /// See [`try_expect_with`](InteractivePrompting::try_expect_with).
    fn try_expect(&mut self, pattern: Pattern) -> Result<Option<MatchResult>, ExpectError> {
        self.try_expect_with(pattern, None, None, PromptOptions::default())
    }

    /// Expect `pattern`, recovering from timeouts and a dead target.
    ///
    /// - On timeout the operator is told what was missing and prompted; when
    ///   they detach the script continues and `Ok(None)` is returned.
    /// - On end-of-file from a target that is still alive, `ExpectError::Eof`
    ///   is returned.
    /// - On end-of-file from a dead target its exit code or signal is reported
    ///   and mirrored unless `exit_with_program` is off, in which case
    ///   `Ok(None)` is returned.
    fn try_expect_with(
        &mut self,
        pattern: Pattern,
        timeout: Option<Duration>,
        search_window: Option<usize>,
        options: PromptOptions<'_>,
    ) -> Result<Option<MatchResult>, ExpectError> {
        let console = Console {
            fd: options.interact.operator_output(),
        };
        let exit_with_program = options.exit_with_program;

        match self.expect_with(std::slice::from_ref(&pattern), timeout, search_window) {
            Ok(result) => Ok(Some(result)),
            Err(ExpectError::Timeout { duration }) => {
                tracing::debug!(%pattern, ?duration, "expectation timed out, prompting");
                self.prompt(options.text(format!("Didn't receive expected {}.\r\n", pattern)))?;
                console.write("Continuing script.\r\n")?;
                Ok(None)
            }
            Err(ExpectError::Eof) => {
                if self.is_alive()? {
                    return Err(ExpectError::Eof);
                }
                let status = self.status()?;
                if report_target(console, status, exit_with_program)? {
                    return Err(ExpectError::Eof);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Report the target's fate on stdout and optionally mirror it.
    ///
    /// Returns true if the target is still alive.
    fn check_target(&mut self, exit_with_program: bool) -> Result<bool, ExpectError> {
        let status = self.status()?;
        report_target(Console { fd: None }, status, exit_with_program)
    }
}

impl<T: Transport + ?Sized> InteractivePrompting for T {}

/// Undo what `prompt` changed on the target's terminal.
fn restore_terminal<T: Transport + ?Sized>(
    target: &mut T,
    nlcr: bool,
    echo: Option<bool>,
) -> Result<(), ExpectError> {
    if nlcr {
        target.restore_mode()?;
    }
    if let Some(on) = echo {
        target.set_echo(on)?;
    }
    Ok(())
}

/// Print what happened to the target. With `exit_with_program`, end this
/// process the same way when the target is dead.
fn report_target(
    console: Console<'_>,
    status: ChildStatus,
    exit_with_program: bool,
) -> Result<bool, ExpectError> {
    match status {
        ChildStatus::Alive => Ok(true),
        ChildStatus::Signaled(number) => {
            console.write(&format!(
                "Program received signal {}. ({})\r\n",
                number,
                signal_name(number)
            ))?;
            if exit_with_program {
                console.write("Killing ourself with same signal.\r\n")?;
                mirror_signal(number)?;
            }
            Ok(false)
        }
        ChildStatus::Exited(code) => {
            console.write(&format!("Program exited with status {}.\r\n", code))?;
            if exit_with_program {
                console.write("Exiting with same status.\r\n")?;
                std::process::exit(code);
            }
            Ok(false)
        }
    }
}

/// Deliver `number` to ourselves with its default disposition.
fn mirror_signal(number: i32) -> Result<(), ExpectError> {
    let sig = Signal::try_from(number)?;
    // SIGKILL and SIGSTOP cannot have their disposition changed.
    if !matches!(sig, Signal::SIGKILL | Signal::SIGSTOP) {
        // SAFETY: restoring the default disposition installs no handler.
        unsafe { signal(sig, SigHandler::SigDfl) }?;
    }
    kill(Pid::this(), sig)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnConfig;
    use crate::transport::{ChildProcessTransport, PtyTransport};
    use nix::sys::termios::{tcgetattr, OutputFlags};
    use nix::unistd::{pipe, read, write};
    use std::os::fd::{AsFd, OwnedFd};

    fn screen(fd: &OwnedFd) -> String {
        let mut buf = [0u8; 4096];
        let n = read(fd.as_fd(), &mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn test_report_exit_without_mirroring() {
        let (out_r, out_w) = pipe().unwrap();
        let console = Console {
            fd: Some(out_w.as_fd()),
        };

        let alive = report_target(console, ChildStatus::Exited(7), false).unwrap();
        assert!(!alive);
        assert_eq!(screen(&out_r), "Program exited with status 7.\r\n");
    }

    #[test]
    fn test_report_signal_without_mirroring() {
        let (out_r, out_w) = pipe().unwrap();
        let console = Console {
            fd: Some(out_w.as_fd()),
        };

        let alive = report_target(console, ChildStatus::Signaled(9), false).unwrap();
        assert!(!alive);
        assert_eq!(screen(&out_r), "Program received signal 9. (SIGKILL)\r\n");
    }

    #[test]
    fn test_report_alive_is_silent() {
        let (_out_r, out_w) = pipe().unwrap();
        let console = Console {
            fd: Some(out_w.as_fd()),
        };

        assert!(report_target(console, ChildStatus::Alive, true).unwrap());
    }

    #[test]
    fn test_prompt_restores_newline_translation() {
        let (in_r, in_w) = pipe().unwrap();
        let (out_r, out_w) = pipe().unwrap();
        write(&in_w, b"\x1d").unwrap();

        let mut tty = PtyTransport::open(SpawnConfig::default()).unwrap();
        tty.set_nonlcr().unwrap();

        tty.prompt(
            PromptOptions::new()
                .text("never shown on a pipe")
                .interact(InteractOptions::new().stdin(in_r.as_fd()).stdout(out_w.as_fd())),
        )
        .unwrap();

        let mode = tcgetattr(tty.controller()).unwrap();
        assert!(!mode.output_flags.contains(OutputFlags::ONLCR));

        write(&out_w, b"|").unwrap();
        assert_eq!(screen(&out_r), "|");
    }

    #[test]
    fn test_try_expect_timeout_continues() {
        let (in_r, in_w) = pipe().unwrap();
        let (out_r, out_w) = pipe().unwrap();
        write(&in_w, b"\x1d").unwrap();

        let mut tty = PtyTransport::open(SpawnConfig::default()).unwrap();
        tty.set_nonlcr().unwrap();
        write(tty.worker(), b"noise").unwrap();

        let result = tty
            .try_expect_with(
                Pattern::exact("never"),
                Some(Duration::from_millis(200)),
                None,
                PromptOptions::new()
                    .interact(InteractOptions::new().stdin(in_r.as_fd()).stdout(out_w.as_fd())),
            )
            .unwrap();

        assert!(result.is_none());
        assert_eq!(screen(&out_r), "noiseContinuing script.\r\n");
    }

    #[test]
    fn test_try_expect_match() {
        let mut tty = PtyTransport::open(SpawnConfig::default()).unwrap();
        write(tty.worker(), b"ready> ").unwrap();

        let result = tty.try_expect(Pattern::exact("ready>")).unwrap().unwrap();
        assert_eq!(&result.matched[..], b"ready>");
    }

    #[test]
    fn test_prompt_restores_modes_when_transfer_fails() {
        let (in_r, _in_w) = pipe().unwrap();
        let (out_r, out_w) = pipe().unwrap();
        drop(out_r);

        let mut tty = PtyTransport::open(SpawnConfig::default()).unwrap();
        let initial = tcgetattr(tty.controller()).unwrap().output_flags;
        tty.set_nonlcr().unwrap();
        write(tty.worker(), b"x").unwrap();

        // Relaying "x" to a pipe nobody reads fails with EPIPE.
        let result = tty.prompt(
            PromptOptions::new()
                .interact(InteractOptions::new().stdin(in_r.as_fd()).stdout(out_w.as_fd())),
        );
        assert!(matches!(result, Err(ExpectError::Io(_))));

        let mode = tcgetattr(tty.controller()).unwrap();
        assert!(!mode.output_flags.contains(OutputFlags::ONLCR));

        // Only the caller's own change is left on the stack.
        tty.restore_mode().unwrap();
        let mode = tcgetattr(tty.controller()).unwrap();
        assert_eq!(
            mode.output_flags.contains(OutputFlags::ONLCR),
            initial.contains(OutputFlags::ONLCR)
        );
    }

    #[test]
    fn test_pwned_never_exits() {
        let (in_r, _in_w) = pipe().unwrap();
        let (out_r, out_w) = pipe().unwrap();
        let mut target: ChildProcessTransport = SpawnConfig::builder()
            .spawn_args("sh", ["-c", "exit 5"])
            .unwrap();

        // exit_with_program(true) would end the test binary with status 5.
        target
            .pwned(
                PromptOptions::new()
                    .echo(None)
                    .nlcr(false)
                    .exit_with_program(true)
                    .interact(InteractOptions::new().stdin(in_r.as_fd()).stdout(out_w.as_fd())),
            )
            .unwrap();

        // No splash on a pipe, and no mirroring.
        assert_eq!(screen(&out_r), "Program exited with status 5.\r\n");
    }
}
