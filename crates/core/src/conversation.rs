//! Conversation-related types.

use terminal_agent_model::ModelMessage;

/// The ordered message history of one session.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    pub(crate) items: Vec<Item>,
}

impl Conversation {
    /// Returns the items in order.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push(&mut self, msg: ModelMessage, transcript: String) {
        self.items.push(Item { msg, transcript });
    }

    pub(crate) fn messages(&self) -> Vec<ModelMessage> {
        self.items.iter().map(|i| i.msg.clone()).collect()
    }
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) msg: ModelMessage,
    pub(crate) transcript: String,
}

impl Item {
    /// Returns the message as it is sent to the model.
    #[inline]
    pub fn message(&self) -> &ModelMessage {
        &self.msg
    }

    /// Returns the transcript of this item.
    ///
    /// The transcript is a string representation of the message item,
    /// which can be exported later. But transcript alone is not enough
    /// to reconstruct the message item.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}
