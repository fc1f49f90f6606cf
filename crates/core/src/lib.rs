//! The agent runtime: tool dispatch, the model client, sessions, and the
//! loop that alternates between them until the model stops calling tools.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod session;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentError, AgentEvent, AgentStage, NextStep,
    RunState,
};
pub use model_client::{
    CompletionClient, ModelClient, ModelClientResponse, RetryPolicy,
};
pub use session::{Session, SessionKey};
