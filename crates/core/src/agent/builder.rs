use std::sync::Arc;

use terminal_agent_model::ModelProvider;

use super::{Agent, AgentEvent};
use crate::model_client::{CompletionClient, ModelClient};
use crate::tool::{Manager as ToolManager, Tool, ToolDispatcher};

enum Tools {
    Managed(ToolManager),
    Custom(Arc<dyn ToolDispatcher>),
}

/// [`Agent`] builder.
pub struct AgentBuilder {
    name: String,
    completion_client: Arc<dyn CompletionClient>,
    system_prompt: Option<String>,
    tools: Tools,
    max_turns: Option<usize>,
    on_event: Option<Arc<dyn Fn(&AgentEvent) + Send + Sync>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_completion_client(Arc::new(ModelClient::new(provider)))
    }

    /// Creates a new builder around an existing completion client.
    pub fn with_completion_client(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            name: "agent".to_owned(),
            completion_client: client,
            system_prompt: None,
            tools: Tools::Managed(ToolManager::default()),
            max_turns: None,
            on_event: None,
        }
    }

    /// Names the agent. The name shows up in logs.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a tool.
    ///
    /// Ignored if a custom dispatcher was installed with
    /// [`AgentBuilder::with_tool_dispatcher`].
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        match &mut self.tools {
            Tools::Managed(manager) => manager.add_tool(tool),
            Tools::Custom(_) => {
                warn!(
                    "`{}` not registered: custom dispatcher in use",
                    tool.name()
                )
            }
        }
        self
    }

    /// Replaces the built-in tool manager with `dispatcher`.
    #[inline]
    pub fn with_tool_dispatcher(
        mut self,
        dispatcher: Arc<dyn ToolDispatcher>,
    ) -> Self {
        self.tools = Tools::Custom(dispatcher);
        self
    }

    /// Fails a run once the model has answered `max_turns` times and
    /// still asks for tools.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Attaches a callback invoked for every [`AgentEvent`].
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(on_event));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        let tools: Arc<dyn ToolDispatcher> = match self.tools {
            Tools::Managed(manager) => Arc::new(manager),
            Tools::Custom(dispatcher) => dispatcher,
        };
        Agent {
            name: self.name,
            completion_client: self.completion_client,
            tools,
            system_prompt: self.system_prompt,
            max_turns: self.max_turns,
            on_event: self.on_event,
        }
    }
}
