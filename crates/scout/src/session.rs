use std::time::Duration;

use scout_core::tool::{Tool, ToolObservation, ToolRequest};
use scout_core::{
    Agent, AgentBuilder, AskError, PromptStyle, Retention, RetryPolicy,
};
use scout_model::ModelProvider;
use scout_openai_model::OpenAIProvider;

use crate::config::Config;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    ///
    /// No tools are registered; add them with
    /// [`with_tool`](Self::with_tool).
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self { agent_builder }
    }

    /// Creates a session builder from the startup configuration, with the
    /// web search tool registered.
    pub fn from_config(config: &Config) -> Self {
        let provider = OpenAIProvider::new(config.openai_config());
        Self::with_model_provider(provider)
            .with_prompt_style(config.prompt_style)
            .with_retention(config.retention)
            .with_max_steps(config.max_steps)
            .with_tool_timeout(config.tool_timeout)
            .with_tool(config.search_tool())
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets how tools are offered to the model.
    #[inline]
    pub fn with_prompt_style(mut self, style: PromptStyle) -> Self {
        self.agent_builder = self.agent_builder.with_prompt_style(style);
        self
    }

    /// Sets what the agent remembers between questions.
    #[inline]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.agent_builder = self.agent_builder.with_retention(retention);
        self
    }

    /// Sets how many model calls one question may take.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_steps(max_steps);
        self
    }

    /// Sets how long a tool may run.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.agent_builder =
            self.agent_builder.with_tool_timeout(Some(timeout));
        self
    }

    /// Sets how transient model failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.agent_builder = self.agent_builder.with_retry_policy(policy);
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Attaches a callback to be invoked with text as the model streams it.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_transcript(on_transcript);
        self
    }

    /// Attaches a callback to be invoked before a tool runs.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolRequest) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_tool_call(on_tool_call);
        self
    }

    /// Attaches a callback to be invoked with each tool outcome.
    #[inline]
    pub fn on_observation(
        mut self,
        on_observation: impl Fn(&ToolObservation) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_observation(on_observation);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let agent = self.agent_builder.build();
        let tools: Vec<_> =
            agent.tools().iter().map(|tool| tool.name.as_str()).collect();
        debug!("session ready with tools: {tools:?}");
        Session { agent }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent that you can use directly, and
/// it is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Asks a question and waits for the answer.
    ///
    /// Dropping the returned future cancels the question.
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<String, AskError> {
        self.agent.ask(question).await
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
