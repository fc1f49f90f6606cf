//! Lets a model complete tasks inside a sandboxed container by running
//! shell commands and moving files in and out.
//!
//! [`TaskRunner`] is the entry point: give it an [`AgentConfig`] and an
//! [`Environment`], then run an instruction to its first final response.
//! The crate also ships a CLI for doing the same from the terminal.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod builder;
pub mod config;
pub mod environment;
mod runner;
pub mod tools;

pub use builder::{AGENT_NAME, SYSTEM_PROMPT, agent_builder, build_agent};
pub use config::{AgentConfig, AgentConfigBuilder, ConfigError};
pub use environment::{
    DockerEnvironment, Environment, EnvironmentError, ExecOutput,
    LocalEnvironment,
};
pub use runner::{APP_NAME, RunError, TaskOutcome, TaskRunner};

/// Re-exports of [`terminal_agent_core`] crate.
pub mod core {
    pub use terminal_agent_core::*;
}
