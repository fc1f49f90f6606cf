use terminal_agent_model::{
    ModelMessage, ModelRequest, ModelTool, ToolCallRequest, ToolCallResult,
};

use super::AgentError;
use crate::conversation::Conversation;
use crate::model_client::ModelClientResponse;

/// Where a run currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgentStage {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// Waiting for the model to answer.
    ModelThinking,
    /// Waiting for the requested tool calls to finish.
    RunningTools,
    /// A final response has been produced, or the run failed.
    Done,
}

/// What the driver has to do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextStep {
    /// Send this request to the model and report the response with
    /// [`RunState::on_model_response`].
    SendRequest(ModelRequest),
    /// Run these tool calls in order and report the results with
    /// [`RunState::on_tool_results`].
    RunTools(Vec<ToolCallRequest>),
    /// The run is over with this final response.
    Finished(String),
}

/// The agent loop without any I/O.
///
/// `RunState` only records messages into a [`Conversation`] and tells the
/// caller which step comes next. Sending requests and running tools is up
/// to the driver, which makes every transition testable in isolation.
#[derive(Debug)]
pub struct RunState {
    stage: AgentStage,
    system_prompt: Option<String>,
    tools: Vec<ModelTool>,
    max_turns: Option<usize>,
    turns: usize,
}

impl RunState {
    /// Creates an idle run.
    pub fn new(
        system_prompt: Option<String>,
        tools: Vec<ModelTool>,
        max_turns: Option<usize>,
    ) -> Self {
        Self {
            stage: AgentStage::Idle,
            system_prompt,
            tools,
            max_turns,
            turns: 0,
        }
    }

    /// Returns the current stage.
    #[inline]
    pub fn stage(&self) -> AgentStage {
        self.stage
    }

    /// Returns how many model responses this run has received.
    #[inline]
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Submits the user's input and asks for the first completion.
    ///
    /// The system prompt is only added when `conversation` is empty.
    pub fn start(
        &mut self,
        conversation: &mut Conversation,
        input: String,
    ) -> Result<NextStep, AgentError> {
        self.expect_stage(AgentStage::Idle)?;
        if conversation.is_empty() {
            if let Some(prompt) = &self.system_prompt {
                conversation
                    .push(ModelMessage::System(prompt.clone()), prompt.clone());
            }
        }
        conversation.push(ModelMessage::User(input.clone()), input);
        self.stage = AgentStage::ModelThinking;
        Ok(NextStep::SendRequest(self.build_request(conversation)))
    }

    /// Records a model response.
    ///
    /// A response without tool calls finishes the run.
    pub fn on_model_response(
        &mut self,
        conversation: &mut Conversation,
        resp: ModelClientResponse,
    ) -> Result<NextStep, AgentError> {
        self.expect_stage(AgentStage::ModelThinking)?;
        self.turns += 1;

        let msg = match resp.opaque_msg {
            Some(opaque) => ModelMessage::Opaque(opaque),
            None => ModelMessage::Assistant(resp.transcript.clone()),
        };
        conversation.push(msg, resp.transcript.clone());

        if resp.tool_calls.is_empty() {
            self.stage = AgentStage::Done;
            return Ok(NextStep::Finished(resp.transcript));
        }
        if let Some(max_turns) = self.max_turns {
            if self.turns >= max_turns {
                self.stage = AgentStage::Done;
                return Err(AgentError::TurnLimitExceeded(max_turns));
            }
        }
        self.stage = AgentStage::RunningTools;
        Ok(NextStep::RunTools(resp.tool_calls))
    }

    /// Records the results of the last batch of tool calls and asks for the
    /// next completion.
    pub fn on_tool_results(
        &mut self,
        conversation: &mut Conversation,
        results: Vec<ToolCallResult>,
    ) -> Result<NextStep, AgentError> {
        self.expect_stage(AgentStage::RunningTools)?;
        for result in results {
            let transcript = result.content.clone();
            conversation.push(ModelMessage::Tool(result), transcript);
        }
        self.stage = AgentStage::ModelThinking;
        Ok(NextStep::SendRequest(self.build_request(conversation)))
    }

    fn expect_stage(&self, expected: AgentStage) -> Result<(), AgentError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(AgentError::UnexpectedStage(self.stage))
        }
    }

    fn build_request(&self, conversation: &Conversation) -> ModelRequest {
        ModelRequest {
            messages: conversation.messages(),
            tools: self.tools.clone(),
        }
    }
}
