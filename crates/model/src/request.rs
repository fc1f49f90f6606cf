use serde_json::Value;

use crate::OpaqueMessage;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

impl ModelRequest {
    /// Creates a tool-less request with a single user message made of the
    /// given parts.
    #[inline]
    pub fn with_user_parts(parts: impl Into<Vec<ContentPart>>) -> Self {
        Self {
            messages: vec![ModelMessage::UserContent(parts.into())],
            tools: vec![],
        }
    }

    /// Returns the number of assistant turns already in the history.
    pub fn assistant_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|msg| {
                matches!(
                    msg,
                    ModelMessage::Assistant(_) | ModelMessage::Opaque(_)
                )
            })
            .count()
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// A user message mixing text and images.
    UserContent(Vec<ContentPart>),
    /// An assistant text.
    Assistant(String),
    /// A tool call result.
    Tool(ToolCallResult),
    /// An opaque message (usually the history message from the model)
    Opaque(OpaqueMessage),
}

/// One part of a multi-part user message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentPart {
    /// Plain text.
    Text(String),
    /// An image referenced by URL. `data:` URLs carry the image inline.
    ImageUrl(String),
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}
