//! Tool call supports.
//!
//! A tool failure is never fatal to the conversation: every outcome,
//! including invalid arguments, unknown tool names and timeouts, ends up as
//! a [`ToolObservation`] the model can read and react to.

mod error;
mod executor;
mod object;

use std::fmt::{self, Display};

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub(crate) use executor::Executor;
pub(crate) use object::{ToolObject, ToolObjectImpl};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain
/// any internal state.
///
/// The tool can be context-aware, meaning it can access additional
/// information about the current execution context, such as credentials or
/// limits. To do this, make the context an immutable state of the tool,
/// which can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned + Send;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool, telling the model when and how
    /// to use it.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Builds the input from free text, as produced by text-only prompting.
    ///
    /// The default implementation expects the text to be JSON.
    fn input_from_text(&self, text: &str) -> Result<Self::Input, Error> {
        serde_json::from_str(text)
            .map_err(|err| Error::invalid_input().with_reason(format!("{err}")))
    }

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// Arguments of a tool call, as the model sent them.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolArguments {
    /// Structured arguments, usually a JSON object.
    Structured(Value),
    /// A single free-text input.
    Text(String),
}

impl ToolArguments {
    /// Interprets free text, keeping JSON objects structured.
    pub fn from_text<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        if text.trim_start().starts_with('{') {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str(&text) {
                return ToolArguments::Structured(value);
            }
        }
        ToolArguments::Text(text)
    }

    /// Returns a string argument by key. Free text answers to any key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self {
            ToolArguments::Structured(value) => value.get(key)?.as_str(),
            ToolArguments::Text(text) => Some(text),
        }
    }
}

impl Display for ToolArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolArguments::Structured(value) => write!(f, "{value}"),
            ToolArguments::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolRequest {
    /// Identifier pairing the request with its observation.
    pub call_id: String,
    /// The name of the tool to call.
    pub tool_name: String,
    /// The arguments to call it with.
    pub arguments: ToolArguments,
}

/// The outcome of a tool call, successful or not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolObservation {
    /// Identifier of the request this observes.
    pub call_id: String,
    /// The name of the tool that was called.
    pub tool_name: String,
    /// The tool output, or a human-readable diagnostic on failure.
    pub result: String,
    /// Whether the tool succeeded.
    pub succeeded: bool,
}

impl ToolObservation {
    pub(crate) fn from_result(
        call_id: String,
        tool_name: String,
        result: ToolResult,
    ) -> Self {
        match result {
            Ok(result) => Self {
                call_id,
                tool_name,
                result,
                succeeded: true,
            },
            Err(err) => Self {
                call_id,
                tool_name,
                result: format!("Tool execution failed: {}", err.reason()),
                succeeded: false,
            },
        }
    }
}
