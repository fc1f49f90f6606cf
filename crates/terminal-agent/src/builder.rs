use std::sync::Arc;

use terminal_agent_core::{Agent, AgentBuilder, CompletionClient, ModelClient};
use terminal_agent_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

use crate::config::AgentConfig;
use crate::environment::Environment;
use crate::tools::{
    ReadFileTool, ReadImageTool, RunShellTool, StagingDir, WriteFileTool,
};

/// The name the agent reports in logs.
pub const AGENT_NAME: &str = "coding_agent";

/// The fixed instructions every run starts with.
pub const SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

/// Builds an agent that talks to the configured endpoint and acts on
/// `environment`.
pub fn build_agent(
    config: &AgentConfig,
    environment: Arc<dyn Environment>,
) -> Agent {
    agent_builder(config, environment, None).build()
}

/// Assembles everything [`build_agent`] does, without building yet.
///
/// When `completion_client` is given, it answers both the agent and
/// `read_image`; otherwise clients for the configured endpoint are made.
pub fn agent_builder(
    config: &AgentConfig,
    environment: Arc<dyn Environment>,
    completion_client: Option<Arc<dyn CompletionClient>>,
) -> AgentBuilder {
    let (client, vision_client) = match completion_client {
        Some(client) => (Arc::clone(&client), client),
        None => {
            let client = model_client(config, config.api_model());
            let vision_client = match config.vision_api_model() {
                Some(model) => model_client(config, model),
                None => Arc::clone(&client),
            };
            (client, vision_client)
        }
    };
    let staging = config
        .staging_dir()
        .map(StagingDir::new)
        .unwrap_or_default();

    let mut builder = AgentBuilder::with_completion_client(client)
        .with_name(AGENT_NAME)
        .with_system_prompt(SYSTEM_PROMPT)
        .with_tool(RunShellTool::new(
            Arc::clone(&environment),
            config.command_timeout(),
        ))
        .with_tool(WriteFileTool::new(
            Arc::clone(&environment),
            staging.clone(),
        ))
        .with_tool(ReadFileTool::new(
            Arc::clone(&environment),
            staging.clone(),
        ))
        .with_tool(ReadImageTool::new(environment, staging, vision_client));
    if let Some(max_turns) = config.max_turns() {
        builder = builder.with_max_turns(max_turns);
    }
    builder
}

fn model_client(
    config: &AgentConfig,
    model: &str,
) -> Arc<dyn CompletionClient> {
    let provider_config = OpenAIConfigBuilder::with_api_key(config.api_key())
        .with_model(model)
        .with_base_url(config.base_url())
        .with_app_title("terminal-agent")
        .build();
    Arc::new(ModelClient::new(OpenAIProvider::new(provider_config)))
}

#[cfg(test)]
mod tests {
    use terminal_agent_core::tool::{Manager, ToolDispatcher};

    use super::*;
    use crate::config::AgentConfigBuilder;
    use crate::environment::LocalEnvironment;

    #[test]
    fn test_build_agent() {
        let config = AgentConfigBuilder::with_api_key("sk-or-123")
            .with_vision_model("openai/gpt-4o")
            .build()
            .unwrap();
        let agent = build_agent(&config, Arc::new(LocalEnvironment::new()));
        assert_eq!(agent.name(), AGENT_NAME);
    }

    #[test]
    fn test_shell_tool_schema() {
        let mut manager = Manager::default();
        manager.add_tool(RunShellTool::new(
            Arc::new(LocalEnvironment::new()),
            std::time::Duration::from_secs(1),
        ));
        let definitions = manager.definitions();
        let schema = &definitions[0].parameters;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["command"]["type"], "string");
        assert_eq!(schema["required"][0], "command");
        assert!(SYSTEM_PROMPT.contains("stop calling tools"));
    }
}
