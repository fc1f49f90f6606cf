//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use terminal_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

/// Pause before each streamed event, so responses stay asynchronous.
const EVENT_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    preset: PresetResponse,
    turn: usize,
    delay: Duration,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let events_len = this.preset.events.len();
        if this.event_idx > events_len {
            return Poll::Ready(Ok(None));
        }

        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(sleep(this.delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        let event = if this.event_idx < events_len {
            match &this.preset.events[this.event_idx] {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                PresetEvent::ToolCall(req) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
            }
        } else {
            ModelResponseEvent::Completed(if this.preset.has_tool_calls() {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            })
        };
        this.event_idx += 1;
        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        Some(OpaqueMessage::new(
            format!("msg:{}", self.turn),
            self.preset.clone(),
        ))
    }
}

#[derive(Default)]
struct Recorder {
    requests: Vec<ModelRequest>,
    attempts: HashMap<usize, u64>,
}

/// A local fake model for testing purpose.
///
/// Each assistant turn is answered by the preset at the same position in
/// the script. The turn is the number of assistant messages already in the
/// request history, so a script reads top-down like the conversation it
/// produces. Requests past the end of the script fail.
///
/// Clones share the request log, which tests use to inspect what the agent
/// actually sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    recorder: Arc<Mutex<Recorder>>,
}

impl TestModelProvider {
    /// Appends the answer for the next assistant turn.
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Returns every request received so far, including rejected ones.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.recorder
            .lock()
            .expect("recorder poisoned")
            .requests
            .clone()
    }

    fn check_request(&self, req: &ModelRequest) -> Result<usize, Error> {
        let turn = req.assistant_turns();
        let mut recorder = self.recorder.lock().expect("recorder poisoned");
        recorder.requests.push(req.clone());

        let Some(preset) = self.script.get(turn) else {
            return Err(Error {
                message: "script has no step for this turn",
                kind: ErrorKind::Other,
            });
        };
        let attempts = recorder.attempts.entry(turn).or_default();
        *attempts += 1;
        match preset.failures {
            Some(0) => Err(Error {
                message: "always failing step",
                kind: ErrorKind::RateLimitExceeded,
            }),
            Some(failures) if *attempts <= failures => Err(Error {
                message: "scripted failure",
                kind: ErrorKind::RateLimitExceeded,
            }),
            _ => Ok(turn),
        }
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = self.check_request(req).map(|turn| TestModelResponse {
            preset: self.script[turn].clone(),
            turn,
            delay: EVENT_DELAY,
            event_idx: 0,
            sleep: None,
        });
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use serde_json::json;
    use terminal_agent_model::{ModelMessage, ToolCallRequest};

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Vec<ToolCallRequest>, ModelFinishReason, OpaqueMessage) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_calls = vec![];
        let mut finish_reason = None;
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            match event {
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason)
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_calls.push(req),
                ModelResponseEvent::Usage(_) => {}
            }
        }
        (
            msg,
            tool_calls,
            finish_reason.unwrap(),
            resp.make_opaque_message().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_script_follows_turns() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me look.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_1".to_owned(),
                name: "run_shell".to_owned(),
                arguments: json!({ "command": "ls" }),
            }),
        ]));
        provider.add_assistant_response_step(PresetResponse::text("Done."));

        let mut req = ModelRequest {
            messages: vec![
                ModelMessage::System("Be brief.".to_owned()),
                ModelMessage::User("List files".to_owned()),
            ],
            tools: vec![],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_calls, reason, opaque) = collect_response(resp).await;
        assert_eq!(msg, "Let me look.");
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(reason, ModelFinishReason::ToolCalls);

        req.messages.push(ModelMessage::Opaque(opaque));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_calls, reason, _) = collect_response(resp).await;
        assert_eq!(msg, "Done.");
        assert!(tool_calls.is_empty());
        assert_eq!(reason, ModelFinishReason::Stop);

        req.messages
            .push(ModelMessage::Assistant("Done.".to_owned()));
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(
            PresetResponse::text("finally").with_failures(2),
        );
        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        };
        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        assert!(provider.send_request(&req).await.is_ok());
    }
}
