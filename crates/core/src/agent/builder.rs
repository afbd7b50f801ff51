use std::sync::Arc;
use std::time::Duration;

use scout_model::ModelProvider;

use super::{Agent, ObservationFn, Retention, ToolCallFn};
use crate::model_client::{ModelClient, RetryPolicy, TranscriptFn};
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, PromptStyle};
use crate::tool::{
    Tool, ToolObject, ToolObjectImpl, ToolObservation, ToolRequest,
};

type NewClientFn =
    Box<dyn FnOnce(PromptStyle, String, RetryPolicy) -> ModelClient + Send>;

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(super) new_client: NewClientFn,
    pub(super) style: PromptStyle,
    pub(super) system_prompt: String,
    pub(super) retry_policy: RetryPolicy,
    pub(super) tools: Vec<Box<dyn ToolObject>>,
    pub(super) tool_timeout: Option<Duration>,
    pub(super) max_steps: usize,
    pub(super) parse_retries: usize,
    pub(super) retention: Retention,
    pub(super) on_transcript: Option<TranscriptFn>,
    pub(super) on_tool_call: Option<ToolCallFn>,
    pub(super) on_observation: Option<ObservationFn>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            new_client: Box::new(move |style, system_prompt, retry_policy| {
                ModelClient::new(provider, style, system_prompt, retry_policy)
            }),
            style: PromptStyle::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            retry_policy: RetryPolicy::default(),
            tools: vec![],
            tool_timeout: Some(Duration::from_secs(30)),
            max_steps: 15,
            parse_retries: 1,
            retention: Retention::default(),
            on_transcript: None,
            on_tool_call: None,
            on_observation: None,
        }
    }

    /// Sets how the conversation is presented to the model.
    #[inline]
    pub fn with_prompt_style(mut self, style: PromptStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the instructions given to the model.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets how transient model failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Registers a tool. A tool registered later replaces an earlier one
    /// with the same name.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Box::new(ToolObjectImpl(tool)));
        self
    }

    /// Sets how long a tool may run, `None` for no limit.
    ///
    /// Defaults to 30 seconds.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Sets how many model calls one question may take.
    ///
    /// Defaults to 15.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets how many malformed replies are answered with a corrective
    /// note before giving up.
    ///
    /// Defaults to 1.
    #[inline]
    pub fn with_parse_retries(mut self, retries: usize) -> Self {
        self.parse_retries = retries;
        self
    }

    /// Sets what the agent remembers between questions.
    #[inline]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Attaches a callback to be invoked with each piece of text the model
    /// streams.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Attaches a callback to be invoked before a tool runs.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_tool_call = Some(Box::new(on_tool_call));
        self
    }

    /// Attaches a callback to be invoked with each tool outcome.
    #[inline]
    pub fn on_observation(
        mut self,
        on_observation: impl Fn(&ToolObservation) + Send + Sync + 'static,
    ) -> Self {
        self.on_observation = Some(Box::new(on_observation));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
