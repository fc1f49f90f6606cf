//! Tools that act on an [`Environment`](crate::environment::Environment).
//!
//! Every tool reports failures as tool errors, which the dispatcher turns
//! into `[error] <reason>` results for the model. Nothing a tool does can
//! abort the run.

mod read_file;
mod read_image;
mod shell;
mod staging;
mod truncate;
mod write_file;

use std::fmt::Display;

use terminal_agent_core::tool::Error as ToolError;

pub use read_file::ReadFileTool;
pub use read_image::ReadImageTool;
pub use shell::RunShellTool;
pub use staging::StagingDir;
pub use truncate::{OUTPUT_BUDGET, keep_first, keep_last};
pub use write_file::WriteFileTool;

#[inline]
fn execution_error<E: Display>(err: E) -> ToolError {
    ToolError::execution_error().with_reason(err.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use serde_json::Value;
    use tempfile::TempDir;
    use terminal_agent_core::tool::{Manager, Tool, ToolDispatcher};
    use terminal_agent_model::ToolCallRequest;

    use super::*;
    use crate::environment::{Environment, LocalEnvironment};

    /// A [`LocalEnvironment`] rooted in a temporary directory, plus a
    /// separate staging directory.
    pub struct Sandbox {
        root: TempDir,
        staging: TempDir,
    }

    impl Sandbox {
        pub fn staging(&self) -> StagingDir {
            StagingDir::new(self.staging.path())
        }

        pub fn host_path(&self, remote_path: &str) -> PathBuf {
            LocalEnvironment::rooted(self.root.path()).resolve(remote_path)
        }

        pub fn write(&self, remote_path: &str, content: &str) {
            let path = self.host_path(remote_path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        pub fn read(&self, remote_path: &str) -> String {
            std::fs::read_to_string(self.host_path(remote_path)).unwrap()
        }
    }

    pub fn local_sandbox() -> (Sandbox, Arc<dyn Environment>) {
        let sandbox = Sandbox {
            root: TempDir::new().unwrap(),
            staging: TempDir::new().unwrap(),
        };
        let env = Arc::new(LocalEnvironment::rooted(sandbox.root.path()));
        (sandbox, env)
    }

    pub fn staging_is_empty(sandbox: &Sandbox) -> bool {
        std::fs::read_dir(sandbox.staging.path())
            .unwrap()
            .next()
            .is_none()
    }

    /// Runs `tool` the way the agent does and returns what the model sees.
    pub async fn dispatch<T: Tool>(tool: T, arguments: Value) -> String {
        let name = tool.name().to_owned();
        let mut manager = Manager::default();
        manager.add_tool(tool);
        manager
            .dispatch(ToolCallRequest {
                id: "call_0".to_owned(),
                name,
                arguments,
            })
            .await
            .content
    }
}
