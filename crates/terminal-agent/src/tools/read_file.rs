use std::sync::Arc;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use terminal_agent_core::tool::{Tool, ToolResult};
use tokio::fs;

use super::execution_error;
use super::staging::StagingDir;
use super::truncate::{OUTPUT_BUDGET, keep_first};
use crate::environment::Environment;

/// Input of [`ReadFileTool`].
#[derive(Deserialize, JsonSchema)]
pub struct ReadFileParameters {
    #[schemars(description = "Absolute path of the file in the container.")]
    path: String,
}

/// A tool for reading text files from the environment.
pub struct ReadFileTool {
    environment: Arc<dyn Environment>,
    staging: StagingDir,
    parameter_schema: Value,
}

impl ReadFileTool {
    /// Creates a read file tool.
    pub fn new(environment: Arc<dyn Environment>, staging: StagingDir) -> Self {
        Self {
            environment,
            staging,
            parameter_schema: schema_for!(ReadFileParameters).to_value(),
        }
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFileParameters;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        r#"
Reads a text file from the container and returns its content.
Invalid UTF-8 is replaced, and only the first 8000 characters are returned."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let environment = Arc::clone(&self.environment);
        let staging = self.staging.clone();
        async move {
            let staged = staging.create(".tmp").map_err(execution_error)?;
            environment
                .download_file(&input.path, staged.path())
                .await
                .map_err(execution_error)?;
            let bytes = fs::read(staged.path()).await.map_err(execution_error)?;
            let text = String::from_utf8_lossy(&bytes);
            Ok(keep_first(&text, OUTPUT_BUDGET).into_owned())
        }
    }
}
