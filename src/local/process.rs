//! Running external programs with a bounded run time.

use std::{ffi::OsStr, fmt, io, process::ExitStatus, process::Stdio, time::Duration};

use log::{debug, warn};
use tokio::process::Command;


//------------ ExitOutcome ---------------------------------------------------

/// How an external program ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitOutcome {
    Success,
    Code(i32),

    /// Terminated by a signal, or otherwise without an exit code.
    Killed,

    /// Did not finish in time and was killed.
    TimedOut(Duration),
}

impl ExitOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            ExitOutcome::Success
        } else {
            match status.code() {
                Some(code) => ExitOutcome::Code(code),
                None => ExitOutcome::Killed,
            }
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitOutcome::Success => f.write_str("exited successfully"),
            ExitOutcome::Code(code) => write!(f, "exited with status {code}"),
            ExitOutcome::Killed => f.write_str("was terminated by a signal"),
            ExitOutcome::TimedOut(timeout) => {
                write!(f, "did not finish within {} seconds", timeout.as_secs())
            }
        }
    }
}


//------------ Running -------------------------------------------------------

/// Runs `program` and waits for it to finish, at most for `timeout`.
///
/// Output is inherited from this process and not inspected.
pub async fn run<P, A>(
    program: P,
    args: &[A],
    timeout: Duration,
) -> Result<ExitOutcome, io::Error>
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    let mut child = Command::new(program.as_ref())
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let outcome = ExitOutcome::from(status?);
            debug!("{} {}", program.as_ref().to_string_lossy(), outcome);
            Ok(outcome)
        }
        Err(_) => {
            warn!(
                "{} did not finish within {} seconds, killing it",
                program.as_ref().to_string_lossy(),
                timeout.as_secs()
            );
            let _ = child.kill().await;
            Ok(ExitOutcome::TimedOut(timeout))
        }
    }
}

/// The result of [`output`].
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub outcome: ExitOutcome,
    pub stderr: String,
}

/// Runs `program` like [`run`], but captures its output.
pub async fn output<P, A>(
    program: P,
    args: &[A],
    timeout: Duration,
) -> Result<CommandOutput, io::Error>
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    let child = Command::new(program.as_ref())
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => {
            let output = output?;
            Ok(CommandOutput {
                outcome: output.status.into(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
        Err(_) => Ok(CommandOutput {
            outcome: ExitOutcome::TimedOut(timeout),
            stderr: String::new(),
        }),
    }
}


//------------ Tests ---------------------------------------------------------
