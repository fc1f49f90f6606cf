use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use serde_json::Value;
use terminal_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, TokenUsage, ToolCallRequest,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, Message, ToolCall};

/// Everything accumulated from the stream so far. It is moved into each
/// `next_event` future and handed back with the event it produced.
struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    // Indices into `tool_calls` of calls that have not been emitted yet.
    // A call is only emitted once the stream has moved past it, so its
    // arguments are complete.
    pending_tool_call_idx: VecDeque<usize>,
    pending_finish_reason: Option<ModelFinishReason>,
    pending_usage: Option<TokenUsage>,
    finished: bool,
}

impl PartialState {
    fn new(sse: Sse) -> Self {
        Self {
            sse,
            id: None,
            content: Default::default(),
            reasoning_content: Default::default(),
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
            pending_usage: Default::default(),
            finished: false,
        }
    }

    fn finish(self) -> Option<(String, Message)> {
        Some((
            self.id?,
            Message::Assistant {
                content: Some(self.content),
                tool_calls: if self.tool_calls.is_empty() {
                    None
                } else {
                    Some(self.tool_calls)
                },
                reasoning_content: self.reasoning_content,
            },
        ))
    }

    fn merge_tool_call(&mut self, tool_call: ToolCall) {
        let Some(partial_tool_call) = self
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            self.pending_tool_call_idx.push_back(self.tool_calls.len());
            self.tool_calls.push(tool_call);
            return;
        };
        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial_tool_call.r#type.get_or_insert_default().push_str(&ty);
        }
        let Some(function) = tool_call.function else {
            return;
        };
        match &mut partial_tool_call.function {
            Some(partial_func) => {
                if let Some(name) = function.name {
                    partial_func.name.get_or_insert_default().push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    partial_func
                        .arguments
                        .get_or_insert_default()
                        .push_str(&arguments);
                }
            }
            None => partial_tool_call.function = Some(function),
        }
    }

    /// Pops the oldest pending tool call if the stream has moved past it.
    fn take_ready_tool_call(&mut self) -> Option<ToolCallRequest> {
        let idx = *self.pending_tool_call_idx.front()?;
        // The most recent call may still receive argument fragments.
        if !self.finished && idx + 1 == self.tool_calls.len() {
            return None;
        }
        self.pending_tool_call_idx.pop_front();

        let tool_call = &self.tool_calls[idx];
        let function = tool_call.function.as_ref();
        let arguments = function
            .and_then(|f| f.arguments.as_deref())
            .filter(|args| !args.trim().is_empty())
            .map(|args| {
                serde_json::from_str::<Value>(args).unwrap_or_else(|err| {
                    warn!("tool call arguments are not valid JSON: {err}");
                    Value::String(args.to_owned())
                })
            })
            .unwrap_or_else(|| Value::Object(Default::default()));
        Some(ToolCallRequest {
            id: tool_call.id.clone().unwrap_or_default(),
            name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
            arguments,
        })
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState::new(sse);
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    *this.next_event_fut = None;
                    *this.full_msg = partial_state.finish();
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        *this.next_event_fut = Some(Box::pin(next_event(partial_state)));
        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        // Text deltas are returned as soon as they are read. Everything
        // else is emitted here, in order: tool calls, then the finish
        // reason, then usage, which arrives after the final choice.
        if let Some(tool_call) = partial_state.take_ready_tool_call() {
            return Ok((
                Some(ModelResponseEvent::ToolCall(tool_call)),
                partial_state,
            ));
        }
        if partial_state.finished {
            if let Some(reason) = partial_state.pending_finish_reason.take() {
                return Ok((
                    Some(ModelResponseEvent::Completed(reason)),
                    partial_state,
                ));
            }
            if let Some(usage) = partial_state.pending_usage.take() {
                return Ok((
                    Some(ModelResponseEvent::Usage(usage)),
                    partial_state,
                ));
            }
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                partial_state.finished = true;
                continue;
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.finished = true;
            continue;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if let Some(err) = chunk.error {
            return Err(Error::new(err.message, ErrorKind::Other));
        }
        if let Some(id) = chunk.id {
            if partial_state.id.get_or_insert_with(|| id.clone()) != &id {
                return Err(Error::new("chunk id mismatch", ErrorKind::Other));
            }
        }
        if let Some(usage) = chunk.usage {
            partial_state.pending_usage = Some(usage.into());
        }

        let mut message_delta: Option<String> = None;
        for choice in chunk.choices {
            if let Some(content) =
                choice.delta.content.filter(|c| !c.is_empty())
            {
                partial_state.content.push_str(&content);
                message_delta.get_or_insert_default().push_str(&content);
            }
            if let Some(reasoning_content) = choice.delta.reasoning_content {
                partial_state
                    .reasoning_content
                    .get_or_insert_default()
                    .push_str(&reasoning_content);
            }
            for tool_call in choice.delta.tool_calls.into_iter().flatten() {
                partial_state.merge_tool_call(tool_call);
            }
            if let Some(finish_reason) = choice.finish_reason {
                partial_state.pending_finish_reason =
                    Some(if finish_reason == "tool_calls" {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    });
            }
        }

        if let Some(message_delta) = message_delta {
            return Ok((
                Some(ModelResponseEvent::MessageDelta(message_delta)),
                partial_state,
            ));
        }
    }
}
