use std::sync::Arc;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use terminal_agent_core::tool::{Tool, ToolResult};
use tokio::fs;

use super::execution_error;
use super::staging::StagingDir;
use crate::environment::Environment;

/// Input of [`WriteFileTool`].
#[derive(Deserialize, JsonSchema)]
pub struct WriteFileParameters {
    #[schemars(description = "Absolute path of the file in the container.")]
    path: String,
    #[schemars(description = "The full content to write.")]
    content: String,
}

/// A tool for writing whole files into the environment.
///
/// Content goes through a staged host file and the environment's upload,
/// so it never passes through shell quoting.
pub struct WriteFileTool {
    environment: Arc<dyn Environment>,
    staging: StagingDir,
    parameter_schema: Value,
}

impl WriteFileTool {
    /// Creates a write file tool.
    pub fn new(environment: Arc<dyn Environment>, staging: StagingDir) -> Self {
        Self {
            environment,
            staging,
            parameter_schema: schema_for!(WriteFileParameters).to_value(),
        }
    }
}

impl Tool for WriteFileTool {
    type Input = WriteFileParameters;

    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        r#"
Writes content to a file in the container, replacing the file if it exists.
Missing parent directories are created.
Prefer this over shell redirection for anything longer than a line."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WriteFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let environment = Arc::clone(&self.environment);
        let staging = self.staging.clone();
        async move {
            // Removed when dropped, whichever way this block exits.
            let staged = staging.create(".tmp").map_err(execution_error)?;
            fs::write(staged.path(), input.content.as_bytes())
                .await
                .map_err(execution_error)?;
            environment
                .upload_file(staged.path(), &input.path)
                .await
                .map_err(execution_error)?;
            Ok("[exit 0]".to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tools::tests::{dispatch, local_sandbox, staging_is_empty};

    #[tokio::test]
    async fn test_write_file() {
        let (sandbox, env) = local_sandbox();
        let tool = WriteFileTool::new(env, sandbox.staging());
        let result = dispatch(
            tool,
            json!({ "path": "/tmp/out.txt", "content": "it's \"quoted\"\n" }),
        )
        .await;
        assert_eq!(result, "[exit 0]");
        assert_eq!(sandbox.read("/tmp/out.txt"), "it's \"quoted\"\n");
        assert!(staging_is_empty(&sandbox));
    }

    #[tokio::test]
    async fn test_failed_upload_cleans_up() {
        let (sandbox, env) = local_sandbox();
        // A directory is in the way of the target file.
        sandbox.write("/occupied/file.txt", "x");
        let tool = WriteFileTool::new(env, sandbox.staging());
        let args = json!({ "path": "/occupied", "content": "y" });
        let result = dispatch(tool, args).await;
        assert!(result.starts_with("[error] "), "unexpected result: {result}");
        assert!(staging_is_empty(&sandbox));
    }
}
