use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use terminal_agent_core::CompletionClient;
use terminal_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use terminal_agent_model::{ContentPart, ModelRequest};
use tokio::fs;

use super::execution_error;
use super::staging::StagingDir;
use crate::environment::Environment;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Input of [`ReadImageTool`].
#[derive(Deserialize, JsonSchema)]
pub struct ReadImageParameters {
    #[schemars(
        description = "Absolute path of the PNG image in the container."
    )]
    path: String,
    #[schemars(description = "What to look for or describe in the image.")]
    prompt: String,
}

/// A tool that shows a PNG image from the environment to a vision model
/// and returns its answer.
pub struct ReadImageTool {
    environment: Arc<dyn Environment>,
    staging: StagingDir,
    vision_client: Arc<dyn CompletionClient>,
    parameter_schema: Value,
}

impl ReadImageTool {
    /// Creates a read image tool that asks `vision_client` about images.
    pub fn new(
        environment: Arc<dyn Environment>,
        staging: StagingDir,
        vision_client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            environment,
            staging,
            vision_client,
            parameter_schema: schema_for!(ReadImageParameters).to_value(),
        }
    }
}

impl Tool for ReadImageTool {
    type Input = ReadImageParameters;

    fn name(&self) -> &str {
        "read_image"
    }

    fn description(&self) -> &str {
        r#"
Looks at a PNG image in the container with a vision model and
answers the prompt about it.
Useful for plots, rendered text, screenshots and diagrams."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadImageParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let environment = Arc::clone(&self.environment);
        let staging = self.staging.clone();
        let vision_client = Arc::clone(&self.vision_client);
        async move {
            let bytes = {
                let staged = staging.create(".png").map_err(execution_error)?;
                environment
                    .download_file(&input.path, staged.path())
                    .await
                    .map_err(execution_error)?;
                fs::read(staged.path()).await.map_err(execution_error)?
            };
            if !bytes.starts_with(PNG_SIGNATURE) {
                return Err(ToolError::invalid_input().with_reason(format!(
                    "`{}` is not a PNG image",
                    input.path
                )));
            }

            let data_url =
                format!("data:image/png;base64,{}", BASE64.encode(&bytes));
            let req = ModelRequest::with_user_parts([
                ContentPart::ImageUrl(data_url),
                ContentPart::Text(input.prompt),
            ]);
            debug!("asking the vision model about `{}`", input.path);
            let resp = vision_client.complete(req).await.map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("vision request failed: {err}"))
            })?;
            Ok(resp.transcript)
        }
    }
}
