mod builder;
mod state;

use std::error::Error as StdError;
use std::fmt::{self, Display};

use scout_model::{ModelProviderError, ModelTool};

use crate::conversation::{Conversation, Turn};
use crate::model_client::{ModelClient, ParseError, TranscriptFn};
use crate::tool::{Executor as ToolExecutor, ToolObservation, ToolRequest};
pub use builder::AgentBuilder;
use state::Run;

type ToolCallFn = Box<dyn Fn(&ToolRequest) + Send + Sync>;
type ObservationFn = Box<dyn Fn(&ToolObservation) + Send + Sync>;

/// Decides what an agent remembers between questions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Retention {
    /// Every question starts a fresh conversation.
    #[default]
    PerQuestion,
    /// Answered questions and their answers are carried into the next
    /// question. Failed or cancelled questions leave no trace.
    Session,
}

/// The error returned when a question could not be answered.
#[derive(Debug)]
pub enum AskError {
    /// The question was blank.
    EmptyQuestion,
    /// The model did not reach a final answer within the step budget.
    StepBudgetExceeded {
        /// The step budget that was spent.
        max_steps: usize,
    },
    /// The model kept replying in a form that could not be understood.
    Parse(ParseError),
    /// The model service failed.
    Model(Box<dyn ModelProviderError>),
}

impl Display for AskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AskError::EmptyQuestion => write!(f, "the question is empty"),
            AskError::StepBudgetExceeded { max_steps } => {
                write!(f, "no final answer within {max_steps} steps")
            }
            AskError::Parse(err) => write!(f, "{err}"),
            AskError::Model(err) => write!(f, "model request failed: {err}"),
        }
    }
}

impl StdError for AskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AskError::Parse(err) => Some(err),
            AskError::Model(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// An agent that answers questions by alternating between asking the model
/// and running the tools it requests.
///
/// Each call to [`Agent::ask`] drives one question to completion. The
/// agent never runs two questions at once; independent agents share
/// nothing and may run concurrently.
pub struct Agent {
    model_client: ModelClient,
    tool_executor: ToolExecutor,
    catalog: Vec<ModelTool>,
    retention: Retention,
    max_steps: usize,
    parse_retries: usize,
    history: Conversation,
    last_conversation: Option<Conversation>,

    on_transcript: Option<TranscriptFn>,
    on_tool_call: Option<ToolCallFn>,
    on_observation: Option<ObservationFn>,
}

impl Agent {
    /// Answers a question.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future abandons the
    /// question; the retained history is left as it was.
    pub async fn ask(&mut self, question: &str) -> Result<String, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let mut conversation = match self.retention {
            Retention::PerQuestion => Conversation::default(),
            Retention::Session => self.history.clone(),
        };
        let start = conversation.len();
        let style = self.model_client.style();
        conversation.push(
            Turn::User(question.to_owned()),
            style.question_message(question),
        );

        info!("asking: {question}");
        let (conversation, outcome) = Run::new(self, conversation).run().await;

        if let (Ok(_), Retention::Session) = (&outcome, self.retention) {
            // Only the question and its answer are kept; the reasoning
            // in between is dropped.
            let exchange = &conversation.items()[start..];
            if let (Some(question), Some(answer)) =
                (exchange.first(), exchange.last())
            {
                self.history.push_item(question.clone());
                self.history.push_item(answer.clone());
            }
        }
        self.last_conversation = Some(conversation);
        outcome
    }

    /// Returns the full conversation of the last finished question,
    /// including its tool calls.
    #[inline]
    pub fn last_conversation(&self) -> Option<&Conversation> {
        self.last_conversation.as_ref()
    }

    /// Returns the exchanges carried between questions.
    ///
    /// This is always empty under [`Retention::PerQuestion`].
    #[inline]
    pub fn history(&self) -> &Conversation {
        &self.history
    }

    /// Returns the tools offered to the model, ordered by name.
    #[inline]
    pub fn tools(&self) -> &[ModelTool] {
        &self.catalog
    }

    /// Forgets everything said so far.
    pub fn reset(&mut self) {
        self.history = Conversation::default();
        self.last_conversation = None;
    }
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            new_client,
            style,
            system_prompt,
            retry_policy,
            tools,
            tool_timeout,
            max_steps,
            parse_retries,
            retention,
            on_transcript,
            on_tool_call,
            on_observation,
        } = builder;

        let tool_executor = ToolExecutor::with_tools(tools, tool_timeout);
        let catalog = tool_executor.definitions();
        Self {
            model_client: new_client(style, system_prompt, retry_policy),
            tool_executor,
            catalog,
            retention,
            max_steps,
            parse_retries,
            history: Conversation::default(),
            last_conversation: None,
            on_transcript,
            on_tool_call,
            on_observation,
        }
    }
}
