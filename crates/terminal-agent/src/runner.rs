//! Runs one task from instruction to final response.

use std::sync::Arc;

use terminal_agent_core::{
    AgentError, AgentEvent, CompletionClient, Session, SessionKey,
};
use tracing::Instrument;

use crate::builder::agent_builder;
use crate::config::AgentConfig;
use crate::environment::Environment;

/// The application name sessions are opened under.
pub const APP_NAME: &str = "terminal_agent";

/// Errors that end a task without a final response.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// There is nothing to do.
    #[error("the instruction is empty")]
    EmptyInstruction,
    /// The agent gave up.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// The result of a finished task.
#[derive(Clone, Debug)]
pub struct TaskOutcome {
    /// The text of the first final response.
    pub final_response: String,
    /// Everything that happened on the way, oldest first.
    pub events: Vec<AgentEvent>,
}

/// Runs tasks against one environment.
///
/// Every call to [`TaskRunner::run`] builds a fresh agent and opens a fresh
/// in-memory session, so nothing carries over between tasks.
pub struct TaskRunner {
    config: AgentConfig,
    environment: Arc<dyn Environment>,
    completion_client: Option<Arc<dyn CompletionClient>>,
    on_event: Option<Arc<dyn Fn(&AgentEvent) + Send + Sync>>,
}

impl TaskRunner {
    /// Creates a runner talking to the endpoint in `config`.
    pub fn new(config: AgentConfig, environment: Arc<dyn Environment>) -> Self {
        Self {
            config,
            environment,
            completion_client: None,
            on_event: None,
        }
    }

    /// Creates a runner that gets completions from `client` instead.
    pub fn with_completion_client(
        config: AgentConfig,
        environment: Arc<dyn Environment>,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            completion_client: Some(client),
            ..Self::new(config, environment)
        }
    }

    /// Attaches a callback invoked for every event while a task runs.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(on_event));
        self
    }

    /// Returns the configuration of this runner.
    #[inline]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs `instruction` until the model gives its first final response.
    ///
    /// The instruction reaches the model verbatim. Only a blank one is
    /// rejected.
    pub async fn run(
        &self,
        instruction: &str,
    ) -> Result<TaskOutcome, RunError> {
        if instruction.trim().is_empty() {
            return Err(RunError::EmptyInstruction);
        }

        let mut builder = agent_builder(
            &self.config,
            Arc::clone(&self.environment),
            self.completion_client.clone(),
        );
        if let Some(on_event) = self.on_event.clone() {
            builder = builder.on_event(move |event| on_event(event));
        }
        let agent = builder.build();

        let mut session =
            Session::new(SessionKey::new(APP_NAME, "user", "session"));
        let span = info_span!("task", model = %self.config.model());
        let result =
            agent.run(&mut session, instruction).instrument(span).await;
        match result {
            Ok(final_response) => Ok(TaskOutcome {
                final_response,
                events: session.events().to_vec(),
            }),
            Err(err) => {
                error!(
                    "task failed after {} events: {err}",
                    session.events().len()
                );
                Err(err.into())
            }
        }
    }
}
