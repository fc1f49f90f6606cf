use async_trait::async_trait;
use terminal_agent_model::{ModelTool, ToolCallRequest, ToolCallResult};

use crate::tool::object::{ToolObject, ToolObjectImpl};
use crate::tool::{Error, Tool, ToolDispatcher, error_content};

/// An object that manages the toolset and runs requests from the model.
///
/// Tools are advertised in registration order. Registering a second tool
/// under an existing name replaces the first.
#[derive(Default)]
pub struct Manager {
    tools: Vec<Box<dyn ToolObject>>,
}

impl Manager {
    /// Registers a tool.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let tool: Box<dyn ToolObject> = Box::new(ToolObjectImpl(tool));
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(existing) => {
                warn!("replacing tool `{}`", tool.name());
                *existing = tool;
            }
            None => self.tools.push(tool),
        }
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolDispatcher for Manager {
    fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().trim().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    async fn dispatch(&self, request: ToolCallRequest) -> ToolCallResult {
        let ToolCallRequest {
            id,
            name,
            arguments,
        } = request;

        let result = match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => {
                trace!("running tool `{name}` ({id}) with args: {arguments}");
                tool.execute(arguments).await
            }
            None => {
                warn!("tool not found: {name}");
                Err(Error::not_found()
                    .with_reason(format!("no tool named `{name}`")))
            }
        };

        let content = match result {
            Ok(content) => content,
            Err(err) => {
                debug!("tool `{name}` ({id}) failed: {err}");
                error_content(&err.reason())
            }
        };
        ToolCallResult { id, content }
    }
}
