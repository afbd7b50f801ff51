//! Core logic: the agent loop, tool execution and model turn parsing.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
mod prompt;
pub mod tool;

pub use agent::{Agent, AgentBuilder, AskError, Retention};
pub use model_client::{ModelTurn, ParseError, RetryPolicy};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, PromptStyle};
