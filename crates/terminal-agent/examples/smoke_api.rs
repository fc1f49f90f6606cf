//! Checks that the configured model is reachable.
//!
//! ```sh
//! OPENROUTER_API_KEY=... cargo run --example smoke_api
//! ```

use std::process::ExitCode;

use terminal_agent::AgentConfig;
use terminal_agent::core::ModelClient;
use terminal_agent_model::{ModelMessage, ModelRequest};
use terminal_agent_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

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

    println!("Calling {} via {}...", config.model(), config.base_url());
    let provider = OpenAIProvider::new(
        OpenAIConfigBuilder::with_api_key(config.api_key())
            .with_model(config.api_model())
            .with_base_url(config.base_url())
            .build(),
    );
    let client = ModelClient::new(provider);
    let req = ModelRequest {
        messages: vec![ModelMessage::User(
            "Reply with exactly: API_OK".to_owned(),
        )],
        tools: vec![],
    };

    match client.send_request(req).await {
        Ok(resp) => {
            println!("Response: {}", resp.transcript);
            match resp.usage {
                Some(usage) => println!("Tokens used: {}", usage.total_tokens),
                None => println!("Tokens used: not reported"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
