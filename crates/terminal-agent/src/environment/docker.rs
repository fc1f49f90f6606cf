use std::path::Path;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;

use super::{Environment, EnvironmentError, ExecOutput, output_within};

/// Budget for the helper commands behind file transfers.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);

/// How long the client waits past the in-container deadline.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Exit status of a command that `timeout -s KILL` had to stop.
const KILLED: i32 = 128 + 9;

/// Writes stdin to `$1`, refusing to replace a directory.
const UPLOAD_SCRIPT: &str = r#"mkdir -p -- "$(dirname -- "$1")" && cat > "$1""#;

/// Drives a running container through the `docker` CLI.
#[derive(Clone, Debug)]
pub struct DockerEnvironment {
    container: String,
    program: String,
}

impl DockerEnvironment {
    /// Targets the running container named `container`.
    #[inline]
    pub fn new<S: Into<String>>(container: S) -> Self {
        Self {
            container: container.into(),
            program: "docker".to_owned(),
        }
    }

    /// Uses `program` instead of `docker`, e.g. `podman`.
    #[inline]
    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    /// Returns the container name.
    #[inline]
    pub fn container(&self) -> &str {
        &self.container
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd
    }

    async fn run_checked(
        &self,
        args: &[&str],
        stdin: Stdio,
        path: &str,
    ) -> Result<Output, EnvironmentError> {
        let output = output_within(self.command(args), stdin, TRANSFER_TIMEOUT)
            .await
            .map_err(|err| match err {
                EnvironmentError::Io(source) => EnvironmentError::Transfer {
                    path: path.to_owned(),
                    source,
                },
                other => other,
            })?;
        if output.status.success() {
            return Ok(output);
        }
        Err(EnvironmentError::CommandFailed {
            command: format!("{} {}", self.program, args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

/// Rounds `limit` up to whole seconds for the `timeout` utility.
fn whole_seconds(limit: Duration) -> u64 {
    let secs = limit.as_secs() + u64::from(limit.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl Environment for DockerEnvironment {
    /// Runs `command` under `timeout -s KILL` inside the container, so the
    /// whole process tree is stopped there rather than only the client.
    async fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, EnvironmentError> {
        debug!(container = %self.container, "docker exec {command:?}");
        let secs = whole_seconds(timeout).to_string();
        let cmd = self.command([
            "exec",
            self.container.as_str(),
            "timeout",
            "-s",
            "KILL",
            secs.as_str(),
            "sh",
            "-c",
            command,
        ]);
        let started = Instant::now();
        let output: ExecOutput =
            output_within(cmd, Stdio::null(), timeout + KILL_GRACE)
                .await
                .map_err(|err| match err {
                    EnvironmentError::Timeout(_) => {
                        EnvironmentError::Timeout(timeout)
                    }
                    other => other,
                })?
                .into();
        if started.elapsed() >= timeout
            && matches!(output.return_code, KILLED | -1)
        {
            warn!(
                container = %self.container,
                "command killed after {timeout:?}"
            );
            return Err(EnvironmentError::Timeout(timeout));
        }
        Ok(output)
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), EnvironmentError> {
        let source = fs::File::open(local_path).await.map_err(|source| {
            EnvironmentError::Transfer {
                path: remote_path.to_owned(),
                source,
            }
        })?;
        let stdin = Stdio::from(source.into_std().await);
        self.run_checked(
            &[
                "exec",
                "-i",
                self.container.as_str(),
                "sh",
                "-c",
                UPLOAD_SCRIPT,
                "sh",
                remote_path,
            ],
            stdin,
            remote_path,
        )
        .await?;
        Ok(())
    }

    async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), EnvironmentError> {
        let output = self
            .run_checked(
                &["exec", self.container.as_str(), "cat", "--", remote_path],
                Stdio::null(),
                remote_path,
            )
            .await?;
        fs::write(local_path, output.stdout).await.map_err(|source| {
            EnvironmentError::Transfer {
                path: remote_path.to_owned(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    /// Stands in for `docker exec [-i] NAME CMD...` by running CMD on the
    /// host.
    const FAKE_DOCKER: &str = "#!/bin/sh
[ \"$1\" = exec ] || exit 64
shift
[ \"$1\" = -i ] && shift
shift
exec \"$@\"
";

    fn fake_docker(dir: &TempDir) -> DockerEnvironment {
        let program = dir.path().join("docker");
        std::fs::write(&program, FAKE_DOCKER).unwrap();
        std::fs::set_permissions(
            &program,
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
        DockerEnvironment::new("sandbox")
            .with_program(program.to_string_lossy())
    }

    #[test]
    fn test_whole_seconds() {
        assert_eq!(whole_seconds(Duration::from_millis(200)), 1);
        assert_eq!(whole_seconds(Duration::from_secs(300)), 300);
        assert_eq!(whole_seconds(Duration::from_millis(2500)), 3);
        assert_eq!(whole_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_transfer_error() {
        let env = DockerEnvironment::new("sandbox")
            .with_program("/nonexistent/docker");
        assert_eq!(env.container(), "sandbox");

        let err = env
            .download_file("/etc/hostname", Path::new("/tmp/unused"))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::Transfer { .. }));

        let err = env
            .exec("true", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::Io(_)));
    }

    #[tokio::test]
    async fn test_exec() {
        let dir = TempDir::new().unwrap();
        let env = fake_docker(&dir);
        let output = env
            .exec("echo out; echo err >&2; exit 3", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            output,
            ExecOutput {
                stdout: "out\n".to_owned(),
                stderr: "err\n".to_owned(),
                return_code: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_exec_timeout_stops_the_process_tree() {
        let dir = TempDir::new().unwrap();
        let env = fake_docker(&dir);
        let marker = dir.path().join("marker");
        let command =
            format!("(sleep 2; touch '{}') & sleep 10", marker.display());
        let err = env
            .exec(&command, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnvironmentError::Timeout(limit) if limit == Duration::from_secs(1)
        ));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_file_transfer() {
        let dir = TempDir::new().unwrap();
        let env = fake_docker(&dir);
        let local = dir.path().join("in.txt");
        std::fs::write(&local, "payload").unwrap();

        let remote = dir.path().join("deep/dir/file.txt");
        let remote = remote.to_string_lossy();
        env.upload_file(&local, &remote).await.unwrap();
        assert_eq!(std::fs::read_to_string(&*remote).unwrap(), "payload");

        let back = dir.path().join("back.txt");
        env.download_file(&remote, &back).await.unwrap();
        assert_eq!(std::fs::read_to_string(&back).unwrap(), "payload");

        let missing = dir.path().join("missing.txt");
        let err = env
            .download_file(&missing.to_string_lossy(), &back)
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_upload_onto_directory_fails() {
        let dir = TempDir::new().unwrap();
        let env = fake_docker(&dir);
        let local = dir.path().join("in.txt");
        std::fs::write(&local, "payload").unwrap();
        let occupied = dir.path().join("occupied");
        std::fs::create_dir(&occupied).unwrap();

        let err = env
            .upload_file(&local, &occupied.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::CommandFailed { .. }));
        assert!(occupied.is_dir());
    }
}
