//! In-memory sessions.

use std::fmt::{self, Display};

use crate::AgentEvent;
use crate::conversation::Conversation;

/// Identifies a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// The application that owns the session.
    pub app_name: String,
    /// The user the session belongs to.
    pub user_id: String,
    /// The session id, unique per user.
    pub session_id: String,
}

impl SessionKey {
    /// Creates a key from its parts.
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// Conversation state and event trace for one task run.
///
/// Sessions live in memory only and are owned by whoever drives the agent.
/// They are not meant to be shared between concurrent runs.
#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    conversation: Conversation,
    events: Vec<AgentEvent>,
}

impl Session {
    /// Opens an empty session.
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            conversation: Conversation::default(),
            events: vec![],
        }
    }

    /// Returns the key of this session.
    #[inline]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns every event observed in this session, oldest first.
    #[inline]
    pub fn events(&self) -> &[AgentEvent] {
        &self.events
    }

    /// Returns the text of the most recent final response.
    pub fn final_response(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|event| match event {
            AgentEvent::FinalResponse(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub(crate) fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub(crate) fn record(&mut self, event: AgentEvent) {
        self.events.push(event);
    }
}
