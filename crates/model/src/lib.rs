//! Provider-agnostic types shared by the agent and its model backends.
//!
//! The agent loop talks to every backend through these types only, so a
//! remote OpenAI-compatible endpoint and the scripted test model are
//! interchangeable.
//!
//! Nothing here performs I/O. The traits describe what a provider must
//! deliver; the structs are the payloads exchanged with it.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
