//! Tool call supports.

mod error;
mod manager;
mod object;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use terminal_agent_model::{ModelTool, ToolCallRequest, ToolCallResult};

pub use error::{Error, ErrorKind};
pub use manager::Manager;

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the environment it acts on.
/// To do this, make the context an immutable state of the tool, which can be
/// set during initialization, and clone it into the future when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// Runs the tool calls requested by the model.
///
/// A dispatcher never fails: whatever goes wrong is reported back to the
/// model inside the returned result, so the conversation can go on.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Returns the definitions advertised to the model.
    fn definitions(&self) -> Vec<ModelTool>;

    /// Runs one tool call to completion.
    async fn dispatch(&self, request: ToolCallRequest) -> ToolCallResult;
}

/// Renders a failed tool call the way the model sees it.
#[inline]
pub fn error_content(reason: &str) -> String {
    format!("[error] {reason}")
}
