//! Lets a shell-only agent look around the current directory.
//!
//! ```sh
//! OPENROUTER_API_KEY=... cargo run --example smoke_agent
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use terminal_agent::core::{AgentBuilder, AgentEvent, Session, SessionKey};
use terminal_agent::tools::RunShellTool;
use terminal_agent::{AgentConfig, LocalEnvironment};
use terminal_agent_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

const PROMPT: &str = "Run ls and tell me what files are here";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ERROR: {err}");
            return ExitCode::FAILURE;
        }
    };

    let provider = OpenAIProvider::new(
        OpenAIConfigBuilder::with_api_key(config.api_key())
            .with_model(config.api_model())
            .with_base_url(config.base_url())
            .build(),
    );
    let agent = AgentBuilder::with_model_provider(provider)
        .with_name("test_agent")
        .with_system_prompt(
            "You are a helpful assistant. Use run_shell to answer questions.",
        )
        .with_tool(RunShellTool::new(
            Arc::new(LocalEnvironment::new()),
            config.command_timeout(),
        ))
        .on_event(|event| {
            if let AgentEvent::ToolResult { name, content, .. } = event {
                println!("[{name}] {content}");
            }
        })
        .build();

    println!("Prompt: '{PROMPT}'\n");
    let mut session = Session::new(SessionKey::new("test", "user", "session"));
    match agent.run(&mut session, PROMPT).await {
        Ok(reply) => {
            println!("Agent reply:\n{reply}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
