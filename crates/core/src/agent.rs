mod builder;
mod state;

use std::sync::Arc;

use terminal_agent_model::{ModelProviderError, TokenUsage, ToolCallRequest};
use tracing::Instrument;

use crate::model_client::CompletionClient;
use crate::session::Session;
use crate::tool::ToolDispatcher;
pub use builder::AgentBuilder;
pub use state::{AgentStage, NextStep, RunState};

/// Something observable that happened while running the agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    /// The model answered a request.
    ModelResponse {
        /// The text part of the answer.
        transcript: String,
        /// The tool calls requested in the answer.
        tool_calls: Vec<ToolCallRequest>,
        /// Token usage, if reported.
        usage: Option<TokenUsage>,
    },
    /// A tool call finished.
    ToolResult {
        /// The id of the tool call.
        id: String,
        /// The name of the tool that ran.
        name: String,
        /// What the model gets to see.
        content: String,
    },
    /// The model answered without asking for tools; the run is over.
    FinalResponse(String),
}

/// Errors that end a run before the model gives its final response.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model request failed, after retries where applicable.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),
    /// The model kept calling tools past the configured limit.
    #[error("the model still requested tools after {0} turns")]
    TurnLimitExceeded(usize),
    /// A step was fed to the state machine in the wrong stage.
    #[error("unexpected agent stage: {0:?}")]
    UnexpectedStage(AgentStage),
}

type EventCallback = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

/// An agent bound to a model, a toolset and a system prompt.
///
/// The agent itself is stateless between runs; all conversation state lives
/// in the [`Session`] passed to [`Agent::run`].
pub struct Agent {
    name: String,
    completion_client: Arc<dyn CompletionClient>,
    tools: Arc<dyn ToolDispatcher>,
    system_prompt: Option<String>,
    max_turns: Option<usize>,
    on_event: Option<EventCallback>,
}

impl Agent {
    /// Returns the name of this agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submits `input` as a user turn and drives the loop until the model
    /// gives a final response, which is returned.
    ///
    /// Model requests and tool calls are issued strictly one at a time.
    pub async fn run<S: Into<String>>(
        &self,
        session: &mut Session,
        input: S,
    ) -> Result<String, AgentError> {
        let span = info_span!(
            "agent run",
            agent = %self.name,
            session = %session.key()
        );
        self.run_inner(session, input.into()).instrument(span).await
    }

    async fn run_inner(
        &self,
        session: &mut Session,
        input: String,
    ) -> Result<String, AgentError> {
        let mut state = RunState::new(
            self.system_prompt.clone(),
            self.tools.definitions(),
            self.max_turns,
        );
        let mut step = state.start(session.conversation_mut(), input)?;

        loop {
            step = match step {
                NextStep::SendRequest(req) => {
                    debug!("requesting a completion");
                    let resp = self
                        .completion_client
                        .complete(req)
                        .await
                        .map_err(AgentError::Model)?;
                    self.emit(
                        session,
                        AgentEvent::ModelResponse {
                            transcript: resp.transcript.clone(),
                            tool_calls: resp.tool_calls.clone(),
                            usage: resp.usage,
                        },
                    );
                    state.on_model_response(session.conversation_mut(), resp)?
                }
                NextStep::RunTools(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in calls {
                        info!("calling tool `{}` ({})", call.name, call.id);
                        let name = call.name.clone();
                        let result = self.tools.dispatch(call).await;
                        self.emit(
                            session,
                            AgentEvent::ToolResult {
                                id: result.id.clone(),
                                name,
                                content: result.content.clone(),
                            },
                        );
                        results.push(result);
                    }
                    state.on_tool_results(session.conversation_mut(), results)?
                }
                NextStep::Finished(text) => {
                    info!("final response after {} turns", state.turns());
                    self.emit(session, AgentEvent::FinalResponse(text.clone()));
                    return Ok(text);
                }
            };
        }
    }

    fn emit(&self, session: &mut Session, event: AgentEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(&event);
        }
        session.record(event);
    }
}
