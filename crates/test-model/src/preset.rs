use serde::{Deserialize, Serialize};
use terminal_agent_model::ToolCallRequest;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The scripted answer for one assistant turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the first `failures` requests for this turn are rejected as
    /// rate limited. `Some(0)` rejects every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// A response that only says `text`.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    pub(crate) fn has_tool_calls(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_script_from_json() {
        let script = json!({
            "events": [
                { "type": "message_delta", "data": "Writing the file." },
                {
                    "type": "tool_call",
                    "data": {
                        "id": "call_1",
                        "name": "write_file",
                        "arguments": { "path": "/tmp/out.txt", "content": "hello" }
                    }
                }
            ],
            "failures": 2
        });

        let response: PresetResponse = serde_json::from_value(script).unwrap();
        assert_eq!(response.failures, Some(2));
        assert!(response.has_tool_calls());
        assert_eq!(
            response.events[1],
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_1".to_owned(),
                name: "write_file".to_owned(),
                arguments: json!({
                    "path": "/tmp/out.txt",
                    "content": "hello",
                }),
            })
        );
        assert!(!PresetResponse::text("done").has_tool_calls());
    }
}
