use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;

use super::{Environment, EnvironmentError, ExecOutput, output_within};

/// Runs commands on the host with `sh -c`.
///
/// With [`LocalEnvironment::rooted`], file transfers map absolute paths
/// under the root directory, and commands start in it. Commands themselves
/// still see the whole host, so this is a convenience for tests and
/// local experiments, not a sandbox.
#[derive(Clone, Debug, Default)]
pub struct LocalEnvironment {
    root: Option<PathBuf>,
}

impl LocalEnvironment {
    /// An environment over the host file system, using the current
    /// directory as working directory.
    #[inline]
    pub fn new() -> Self {
        Self { root: None }
    }

    /// An environment whose file transfers stay under `root`.
    #[inline]
    pub fn rooted<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Returns the host path that `remote_path` refers to.
    pub fn resolve(&self, remote_path: &str) -> PathBuf {
        let Some(root) = &self.root else {
            return PathBuf::from(remote_path);
        };
        let relative = Path::new(remote_path)
            .strip_prefix("/")
            .unwrap_or(Path::new(remote_path));
        root.join(relative)
    }
}

#[async_trait]
impl Environment for LocalEnvironment {
    async fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, EnvironmentError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(root) = &self.root {
            cmd.current_dir(root);
        }
        trace!("sh -c {command:?}");
        Ok(output_within(cmd, Stdio::null(), timeout).await?.into())
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), EnvironmentError> {
        let target = self.resolve(remote_path);
        let transfer = |source| EnvironmentError::Transfer {
            path: remote_path.to_owned(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(transfer)?;
        }
        fs::copy(local_path, &target).await.map_err(transfer)?;
        Ok(())
    }

    async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), EnvironmentError> {
        fs::copy(self.resolve(remote_path), local_path)
            .await
            .map_err(|source| EnvironmentError::Transfer {
                path: remote_path.to_owned(),
                source,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_resolve() {
        let env = LocalEnvironment::rooted("/sandbox");
        assert_eq!(
            env.resolve("/tmp/out.txt"),
            Path::new("/sandbox/tmp/out.txt")
        );
        assert_eq!(env.resolve("notes.md"), Path::new("/sandbox/notes.md"));
        assert_eq!(
            LocalEnvironment::new().resolve("/tmp/out.txt"),
            Path::new("/tmp/out.txt")
        );
    }

    #[tokio::test]
    async fn test_exec() {
        let root = TempDir::new().unwrap();
        let env = LocalEnvironment::rooted(root.path());
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
    async fn test_exec_timeout() {
        let env = LocalEnvironment::new();
        let err = env
            .exec("sleep 5", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_exec_timeout_kills_background_jobs() {
        let root = TempDir::new().unwrap();
        let env = LocalEnvironment::rooted(root.path());
        let command = "(sleep 1; touch marker) & sleep 5";
        let err = env
            .exec(command, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::Timeout(_)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!root.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_file_transfer() {
        let root = TempDir::new().unwrap();
        let host = TempDir::new().unwrap();
        let env = LocalEnvironment::rooted(root.path());

        let local = host.path().join("in.txt");
        std::fs::write(&local, "payload").unwrap();
        env.upload_file(&local, "/deep/dir/file.txt").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(root.path().join("deep/dir/file.txt"))
                .unwrap(),
            "payload"
        );

        let back = host.path().join("back.txt");
        env.download_file("/deep/dir/file.txt", &back).await.unwrap();
        assert_eq!(std::fs::read_to_string(&back).unwrap(), "payload");

        let err = env
            .download_file("/missing.txt", &back)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("cannot transfer `/missing.txt`"));
    }

    #[tokio::test]
    async fn test_upload_onto_directory_fails() {
        let root = TempDir::new().unwrap();
        let host = TempDir::new().unwrap();
        let env = LocalEnvironment::rooted(root.path());
        std::fs::create_dir(root.path().join("occupied")).unwrap();

        let local = host.path().join("in.txt");
        std::fs::write(&local, "payload").unwrap();
        let err = env.upload_file(&local, "/occupied").await.unwrap_err();
        assert!(matches!(err, EnvironmentError::Transfer { .. }));
        assert!(root.path().join("occupied").is_dir());
    }
}
