//! Command-line glue for scripts built on binexpect
//!
//! [`TargetArgs`] is meant to be flattened into a script's own clap parser,
//! so every script gets the same switches for picking between spawning its
//! target and handing out a terminal for a debugger.
//!
//! ```no_run
//! use binexpect::cli::TargetArgs;
//! use binexpect::{InteractivePrompting, PromptOptions};
//! use clap::Parser;
//!
//! #[derive(Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     target: TargetArgs,
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse();
//!     let mut target = cli.target.target(Some("./challenge"), &[])?;
//!     target.prompt(PromptOptions::new())?;
//!     Ok(())
//! }
//! ```

use crate::config::{SpawnBuilder, SpawnConfig};
use crate::framing::BinaryFraming;
use crate::result::ExpectError;
use crate::transport::Transport;
use clap::{ArgAction, Args};
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Options controlling how the target is started.
#[derive(Args, Debug, Clone, PartialEq)]
#[command(next_help_heading = "binexpect options")]
pub struct TargetArgs {
    /// Spawn and interact with a new TTY instead of spawning the process
    #[arg(short = 't', long, conflicts_with = "gdb")]
    pub tty: bool,

    /// Spawn a new terminal running gdb on the target, attached to a new TTY
    #[arg(short = 'g', long)]
    pub gdb: bool,

    /// Don't print information such as the TTY's name
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Seconds to wait for an expected message before giving up on it
    #[arg(long, value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Keep '\n' to '\r\n' translation on the TTY
    #[arg(long)]
    pub nlcr: bool,

    /// Seconds to wait before every send
    #[arg(long, value_parser = parse_seconds, default_value = "0")]
    pub delay_before_send: Duration,

    /// Maximum number of bytes read from the target at once
    #[arg(long)]
    pub maxread: Option<usize>,

    /// How far back in unmatched output patterns are searched
    #[arg(long)]
    pub search_window_size: Option<usize>,

    /// Copy everything sent to and received from the target to this file
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Working directory of the spawned target
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Environment of the spawned target, replacing the inherited one
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Whether the spawned target ignores SIGHUP
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub ignore_sighup: bool,

    /// Terminal used for --gdb; '-e' is appended if it is a bare command name
    #[arg(long, env = "TERMINAL", default_value = "x-terminal-emulator")]
    pub terminal: String,

    /// With a TTY, write its name and the target's arguments to this file
    #[arg(long)]
    pub writeback: Option<PathBuf>,

    /// Target command
    pub command: Option<String>,

    /// Target arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl TargetArgs {
    /// The command and arguments to run, given the script's defaults.
    ///
    /// A command on the command line replaces `default_command`, and
    /// arguments on the command line replace `default_args`.
    pub fn resolve_command(
        &self,
        default_command: Option<&str>,
        default_args: &[&str],
    ) -> (Option<String>, Vec<String>) {
        let command = self
            .command
            .clone()
            .or_else(|| default_command.map(str::to_string));
        let args = if self.args.is_empty() {
            default_args.iter().map(|a| a.to_string()).collect()
        } else {
            self.args.clone()
        };
        (command, args)
    }

    /// The spawn configuration these options describe.
    pub fn spawn_builder(&self) -> SpawnBuilder {
        let mut builder = SpawnConfig::builder()
            .verbose(!self.quiet)
            .ignore_sighup(self.ignore_sighup)
            .delay_before_send(self.delay_before_send);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(maxread) = self.maxread {
            builder = builder.maxread(maxread);
        }
        if let Some(size) = self.search_window_size {
            builder = builder.search_window(size);
        }
        if let Some(path) = &self.logfile {
            builder = builder.logfile(path);
        }
        if let Some(cwd) = &self.cwd {
            builder = builder.cwd(cwd);
        }
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }
        builder
    }

    /// Start the target described by these options.
    ///
    /// With `--tty` or `--gdb` a new terminal is opened instead of running
    /// the command; its name and the command's arguments are written to
    /// `--writeback`, and `--gdb` launches a debugger on it in a new
    /// terminal window. Unless `--nlcr` is given, newline translation is
    /// switched off on the new target.
    ///
    /// # Errors
    ///
    /// Returns `ExpectError::Spawn` if no command is known or it cannot be
    /// started, and the usual allocation and I/O errors otherwise.
    pub fn target(
        &self,
        default_command: Option<&str>,
        default_args: &[&str],
    ) -> Result<Box<dyn Transport>, ExpectError> {
        let (command, args) = self.resolve_command(default_command, default_args);
        let words: Vec<String> = command
            .as_deref()
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let mut target: Box<dyn Transport> = if self.tty || self.gdb {
            let tty = self.spawn_builder().open_tty()?;
            let tty_name = tty.worker_path().display().to_string();

            let target_args: Vec<&str> = words
                .iter()
                .skip(1)
                .chain(args.iter())
                .map(String::as_str)
                .collect();

            if let Some(path) = &self.writeback {
                std::fs::write(path, format!("{}\0{}", tty_name, target_args.join("\0")))?;
            }

            if self.gdb {
                let binary = words.first().ok_or_else(|| missing_command("gdb"))?;
                spawn_terminal(
                    &self.terminal,
                    &["gdb", "-q", binary.as_str(), "--tty", tty_name.as_str()],
                )?;
            }
            Box::new(tty)
        } else {
            let (program, program_args) = words.split_first().ok_or_else(|| missing_command(""))?;
            let all_args = program_args.iter().chain(args.iter());
            Box::new(self.spawn_builder().spawn_args(program, all_args)?)
        };

        if !self.nlcr {
            target.set_nonlcr()?;
        }
        Ok(target)
    }
}

fn missing_command(command: &str) -> ExpectError {
    ExpectError::Spawn {
        command: command.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "no target command given"),
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

/// The argv that runs `cmdline` inside `terminal`.
///
/// `terminal` is split on whitespace; a bare command name gets `-e`
/// appended, a command line is assumed to already end in the right option.
pub fn terminal_command(terminal: &str, cmdline: &[&str]) -> Vec<String> {
    let mut argv: Vec<String> = terminal.split_whitespace().map(str::to_string).collect();
    if argv.len() == 1 {
        argv.push("-e".to_string());
    }
    argv.extend(cmdline.iter().map(|s| s.to_string()));
    argv
}

/// Launch `cmdline` in a new terminal window without waiting for it.
pub fn spawn_terminal(terminal: &str, cmdline: &[&str]) -> Result<Child, ExpectError> {
    let argv = terminal_command(terminal, cmdline);
    let (program, args) = argv.split_first().ok_or_else(|| missing_command(terminal))?;

    tracing::debug!(?argv, "launching terminal");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| ExpectError::Spawn {
            command: program.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        target: TargetArgs,
    }

    fn parse(argv: &[&str]) -> TargetArgs {
        let argv = std::iter::once("test").chain(argv.iter().copied());
        Cli::try_parse_from(argv).unwrap().target
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);

        assert!(!args.tty && !args.gdb && !args.quiet && !args.nlcr);
        assert!(args.ignore_sighup);
        assert_eq!(args.delay_before_send, Duration::ZERO);
        assert_eq!(args.timeout, None);
        assert!(args.command.is_none());
        assert!(args.args.is_empty());
    }

    #[test]
    fn test_tty_and_gdb_conflict() {
        let argv = ["test", "--tty", "--gdb"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_command_resolution() {
        let cases: &[(Option<&str>, &[&str], Option<&str>)] = &[
            (None, &[], None),
            (Some("cat"), &[], Some("cat")),
            (None, &["foo"], Some("foo")),
            (Some("cat"), &["foo"], Some("foo")),
        ];
        for (default, argv, expected) in cases {
            let (command, _) = parse(argv).resolve_command(*default, &[]);
            assert_eq!(command.as_deref(), *expected, "argv {:?}", argv);
        }
    }

    #[test]
    fn test_args_resolution() {
        let cases: &[(&[&str], &[&str], &[&str])] = &[
            (&[], &[], &[]),
            (&["a", "b"], &[], &["a", "b"]),
            (&[], &["cmd"], &[]),
            (&[], &["cmd", "c", "d"], &["c", "d"]),
            (&["a", "b"], &["cmd"], &["a", "b"]),
            (&["a", "b"], &["cmd", "c", "d"], &["c", "d"]),
        ];
        for (defaults, argv, expected) in cases {
            let (_, args) = parse(argv).resolve_command(Some("cat"), defaults);
            assert_eq!(&args, expected, "argv {:?}", argv);
        }
    }

    #[test]
    fn test_trailing_args_keep_hyphens() {
        let args = parse(&["--tty", "./target", "-v", "--flag"]);
        assert!(args.tty);
        assert_eq!(args.command.as_deref(), Some("./target"));
        assert_eq!(args.args, ["-v", "--flag"]);
    }

    #[test]
    fn test_numeric_options() {
        let args = parse(&[
            "--timeout",
            "1.5",
            "--delay-before-send",
            "0.25",
            "--maxread",
            "1",
            "--search-window-size",
            "64",
            "--ignore-sighup",
            "false",
        ]);

        assert_eq!(args.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(args.delay_before_send, Duration::from_millis(250));
        assert_eq!(args.maxread, Some(1));
        assert_eq!(args.search_window_size, Some(64));
        assert!(!args.ignore_sighup);

        let config = args.spawn_builder().build();
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.search_window(), Some(64));
        assert!(!config.ignore_sighup());
    }

    #[test]
    fn test_negative_seconds_rejected() {
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn test_env_pairs() {
        let args = parse(&["--env", "TERM=dumb", "--env", "EMPTY="]);
        assert_eq!(
            args.env,
            [
                ("TERM".to_string(), "dumb".to_string()),
                ("EMPTY".to_string(), String::new())
            ]
        );
        assert!(parse_env("=x").is_err());
        assert!(parse_env("novalue").is_err());
    }

    #[test]
    fn test_terminal_command() {
        assert_eq!(
            terminal_command("xterm", &["gdb", "-q"]),
            ["xterm", "-e", "gdb", "-q"]
        );
        assert_eq!(
            terminal_command("gnome-terminal --", &["gdb"]),
            ["gnome-terminal", "--", "gdb"]
        );
    }

    #[test]
    fn test_missing_command() {
        let err = parse(&[]).target(None, &[]).err().unwrap();
        assert!(matches!(err, ExpectError::Spawn { .. }));
    }

    #[test]
    fn test_spawned_target() {
        let mut target = parse(&[]).target(Some("cat"), &[]).unwrap();
        assert!(target.is_alive().unwrap());
    }

    #[test]
    fn test_tty_writeback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writeback");
        let path_arg = format!("--writeback={}", path.display());

        let _target = parse(&["--tty", "-q", &path_arg]).target(Some("cat"), &[]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let (tty, rest) = written.split_once('\0').unwrap();
        assert!(tty.starts_with("/dev/"));
        assert!(std::path::Path::new(tty).exists());
        assert_eq!(rest, "");
    }

    #[test]
    fn test_tty_writeback_lists_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writeback");
        let path_arg = format!("--writeback={}", path.display());

        let _target = parse(&["--tty", "-q", &path_arg, "./vuln", "AAAA", "BBBB"])
            .target(None, &[])
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("\0AAAA\0BBBB"));
    }
}
