//! Thin wrapper for invoking external command-line tools.

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run `program` with `args`, failing with the tool's stderr on a non-zero exit.
///
/// `description` names the step in logs and error messages.
pub fn run_program<S, I, A>(program: S, args: I, description: &str) -> Result<()>
where
    S: AsRef<OsStr>,
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let mut command = Command::new(program.as_ref());
    command.args(args);
    debug!("{}: {:?}", description, command);

    let output = command
        .output()
        .with_context(|| format!("{}: failed to launch {:?}", description, program.as_ref()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} failed ({}): {}",
            description,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

/// Run `program` with its standard output written to `out`.
///
/// Used for tools that only stream to stdout, such as `bgzip -c`.
pub fn run_program_to_file<S, I, A>(program: S, args: I, out: &Path, description: &str) -> Result<()>
where
    S: AsRef<OsStr>,
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let sink = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut command = Command::new(program.as_ref());
    command.args(args).stdout(Stdio::from(sink));
    debug!("{}: {:?} > {}", description, command, out.display());

    let output = command
        .output()
        .with_context(|| format!("{}: failed to launch {:?}", description, program.as_ref()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} failed ({}): {}",
            description,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}
