//! Sandboxed execution contexts the tools act on.

mod docker;
mod local;

use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

pub use docker::DockerEnvironment;
pub use local::LocalEnvironment;

/// What a finished command left behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output, decoded lossily.
    pub stdout: String,
    /// Standard error, decoded lossily.
    pub stderr: String,
    /// The exit code, or `-1` if the process was killed by a signal.
    pub return_code: i32,
}

impl From<Output> for ExecOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            return_code: output.status.code().unwrap_or(-1),
        }
    }
}

/// Errors raised by an [`Environment`].
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    /// The command did not finish within its budget and was killed.
    #[error("no result within {0:?}")]
    Timeout(Duration),
    /// A file could not be copied in or out of the environment.
    #[error("cannot transfer `{path}`: {source}")]
    Transfer {
        /// The path inside the environment.
        path: String,
        /// The underlying failure.
        source: io::Error,
    },
    /// A helper command exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed {
        /// The command line, for diagnostics.
        command: String,
        /// What the command printed to stderr.
        stderr: String,
    },
    /// Spawning or waiting for a process failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A sandboxed context that can run commands and exchange files with the
/// host.
///
/// Paths inside the environment are plain strings since they do not need
/// to be valid on the host.
#[async_trait]
pub trait Environment: Send + Sync + 'static {
    /// Runs `command` through a shell, failing with
    /// [`EnvironmentError::Timeout`] if it runs longer than `timeout`.
    async fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, EnvironmentError>;

    /// Copies the host file at `local_path` to `remote_path`, creating
    /// missing parent directories.
    async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), EnvironmentError>;

    /// Copies `remote_path` to the host file at `local_path`, overwriting it.
    async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), EnvironmentError>;
}

/// Runs `command` to completion, killing it once `limit` has passed.
///
/// The command is spawned as the leader of a new process group so that a
/// timeout also takes down whatever it forked into the background.
async fn output_within(
    mut command: Command,
    stdin: Stdio,
    limit: Duration,
) -> Result<Output, EnvironmentError> {
    command
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    let child = command.spawn()?;
    let pgid = child.id();
    match timeout(limit, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => {
            if let Some(pgid) = pgid {
                kill_process_group(pgid);
            }
            warn!("command killed after {limit:?}");
            Err(EnvironmentError::Timeout(limit))
        }
    }
}

fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: `killpg` has no memory-safety preconditions.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(
            "cannot kill process group {pgid}: {}",
            io::Error::last_os_error()
        );
    }
}
