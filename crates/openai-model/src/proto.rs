use serde::{Deserialize, Serialize};
use serde_json::Value;
use terminal_agent_model::{
    ContentPart as ModelContentPart, ModelMessage, ModelRequest, ModelTool,
    TokenUsage,
};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub r#type: Option<String>,
    pub function: Option<FunctionToolCall>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
    /// Set when the upstream model fails after streaming has started.
    pub error: Option<StreamError>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub reasoning_content: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StreamError {
    pub message: String,
    pub code: Option<Value>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: UserContent,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    stream: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

// -----------
// Conversions
// -----------

pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        stream_options: Some(StreamOptions {
            include_usage: true,
        }),
        stream: true,
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: UserContent::Text(content.clone()),
        },
        ModelMessage::UserContent(parts) => Message::User {
            content: UserContent::Parts(
                parts.iter().map(create_content_part).collect(),
            ),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: Some(content.clone()),
            tool_calls: None,
            reasoning_content: None,
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
        ModelMessage::Opaque(opaque_message) => {
            // Opaque messages from this provider always wrap a `Message`.
            let Some(msg) = opaque_message.to_raw::<Message>() else {
                warn!("dropping foreign opaque message {opaque_message:?}");
                return Message::Assistant {
                    content: None,
                    tool_calls: None,
                    reasoning_content: None,
                };
            };
            msg.clone()
        }
    }
}

fn create_content_part(part: &ModelContentPart) -> ContentPart {
    match part {
        ModelContentPart::Text(text) => {
            ContentPart::Text { text: text.clone() }
        }
        ModelContentPart::ImageUrl(url) => ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        },
    }
}

fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use terminal_agent_model::ToolCallResult;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("You are a terminal agent.".to_owned()),
                ModelMessage::User("Run exit 7".to_owned()),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_1".to_owned(),
                    content: "[exit 7]".to_owned(),
                }),
            ],
            tools: vec![ModelTool {
                name: "run_shell".to_owned(),
                description: "Runs shell commands.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("anthropic/claude-opus-4-6")
            .build();

        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "model": "anthropic/claude-opus-4-6",
                "messages": [
                    { "role": "system", "content": "You are a terminal agent." },
                    { "role": "user", "content": "Run exit 7" },
                    { "role": "tool", "tool_call_id": "call_1", "content": "[exit 7]" }
                ],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "run_shell",
                        "description": "Runs shell commands.",
                        "parameters": { "type": "object" }
                    }
                }],
                "stream_options": { "include_usage": true },
                "stream": true
            })
        );
    }

    #[test]
    fn test_image_message() {
        let request = ModelRequest::with_user_parts([
            ModelContentPart::ImageUrl("data:image/png;base64,iVBO".to_owned()),
            ModelContentPart::Text("What does the plot show?".to_owned()),
        ]);
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();

        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(body.get("tools"), None);
        assert_eq!(
            body["messages"][0],
            json!({
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": { "url": "data:image/png;base64,iVBO" }
                    },
                    { "type": "text", "text": "What does the plot show?" }
                ]
            })
        );
    }

    #[test]
    fn test_parse_usage_chunk() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"gen-1","choices":[],"usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#,
        )
        .unwrap();
        assert!(chunk.choices.is_empty());
        assert_eq!(TokenUsage::from(chunk.usage.unwrap()).total_tokens, 15);
    }
}
