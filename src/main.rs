//! Open a new terminal and relay it to this one.
//!
//! Point a debugger at the printed device (`gdb -q ./target --tty /dev/pts/N`)
//! and talk to the inferior from here.

use anyhow::{Context, Result};
use binexpect::{InteractivePrompting, PromptOptions, SpawnConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "binexpect")]
#[command(author, version, about = "Spawn a new TTY and interact with it", long_about = None)]
struct Args {
    /// Copy everything received from and typed into the TTY to FILE
    #[arg(short, long, value_name = "FILE")]
    logfile: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut builder = SpawnConfig::builder().verbose(true);
    if let Some(path) = &args.logfile {
        builder = builder.logfile(path);
    }

    let mut tty = builder.open_tty().context("failed to open a new tty")?;
    tty.prompt(PromptOptions::new())
        .context("interaction with the tty failed")?;

    Ok(())
}
