//! How the conversation is presented to the model, and how its replies are
//! read back.

mod react;

use scout_model::{
    ModelMessage, ModelRequest, ModelTool, ToolCallRequest, ToolCallResult,
};

use crate::conversation::Conversation;
use crate::model_client::{
    GeneratedTurn, ModelClientResponse, ModelTurn, ParseError,
};
use crate::tool::{ToolArguments, ToolObservation, ToolRequest};

/// The instructions given to the model when none are configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// The prompting contract used to talk to the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PromptStyle {
    /// Tools are described in the system prompt, and the model replies in
    /// the Thought/Action/Action Input/Final Answer text format.
    #[default]
    ReAct,
    /// Tools are sent as native function tools, and the model requests
    /// them with structured tool calls.
    Native,
}

impl PromptStyle {
    pub(crate) fn build_request(
        self,
        system_prompt: &str,
        conversation: &Conversation,
        catalog: &[ModelTool],
    ) -> ModelRequest {
        let system = match self {
            PromptStyle::ReAct => react::system_prompt(system_prompt, catalog),
            PromptStyle::Native => system_prompt.to_owned(),
        };
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ModelMessage::System(system));
        messages.extend(conversation.messages().cloned());

        match self {
            PromptStyle::ReAct => ModelRequest {
                messages,
                tools: vec![],
                stop: vec![react::STOP_SEQUENCE.to_owned()],
            },
            PromptStyle::Native => ModelRequest {
                messages,
                tools: catalog.to_vec(),
                stop: vec![],
            },
        }
    }

    pub(crate) fn question_message(self, question: &str) -> ModelMessage {
        match self {
            PromptStyle::ReAct => {
                ModelMessage::User(format!("Question: {question}"))
            }
            PromptStyle::Native => ModelMessage::User(question.to_owned()),
        }
    }

    pub(crate) fn observation_message(
        self,
        observation: &ToolObservation,
    ) -> ModelMessage {
        match self {
            PromptStyle::ReAct => ModelMessage::User(format!(
                "Observation: {}",
                observation.result
            )),
            PromptStyle::Native => ModelMessage::Tool(ToolCallResult {
                id: observation.call_id.clone(),
                content: observation.result.clone(),
            }),
        }
    }

    /// Returns the note that asks the model to fix a malformed reply.
    pub(crate) fn correction_note(self, err: &ParseError) -> String {
        match self {
            PromptStyle::ReAct => format!(
                "Observation: Invalid Format: {}. Reply with either an \
                 'Action:' and 'Action Input:' pair or a 'Final Answer:'.",
                err.reason
            ),
            PromptStyle::Native => format!(
                "Your previous reply could not be used: {}. Answer the \
                 question or call one of the tools.",
                err.reason
            ),
        }
    }

    pub(crate) fn interpret(
        self,
        resp: ModelClientResponse,
        turn_index: usize,
    ) -> Result<GeneratedTurn, ParseError> {
        match self {
            PromptStyle::ReAct => interpret_react(resp, turn_index),
            PromptStyle::Native => interpret_native(resp, turn_index),
        }
    }
}

fn interpret_react(
    resp: ModelClientResponse,
    turn_index: usize,
) -> Result<GeneratedTurn, ParseError> {
    let raw = resp.transcript.trim_end();
    let step = react::parse(raw).map_err(|reason| ParseError {
        raw: raw.to_owned(),
        reason: reason.to_owned(),
    })?;
    let turn = match step {
        react::Step::Action { tool, input } => ModelTurn::ToolCall(ToolRequest {
            call_id: format!("react-{turn_index}"),
            tool_name: tool.to_owned(),
            arguments: ToolArguments::from_text(input),
        }),
        react::Step::FinalAnswer(answer) => {
            ModelTurn::FinalAnswer(answer.to_owned())
        }
    };
    Ok(GeneratedTurn {
        turn,
        message: ModelMessage::Assistant(raw.to_owned()),
    })
}

fn interpret_native(
    resp: ModelClientResponse,
    turn_index: usize,
) -> Result<GeneratedTurn, ParseError> {
    let ModelClientResponse {
        transcript,
        tool_calls,
        ..
    } = resp;

    if tool_calls.len() > 1 {
        debug!("dropping {} surplus tool calls", tool_calls.len() - 1);
    }
    if let Some(call) = tool_calls.into_iter().next() {
        let id = if call.id.is_empty() {
            format!("call-{turn_index}")
        } else {
            call.id
        };
        let request = ToolCallRequest { id, ..call };
        let turn = ModelTurn::ToolCall(ToolRequest {
            call_id: request.id.clone(),
            tool_name: request.name.clone(),
            arguments: ToolArguments::Structured(request.arguments.clone()),
        });
        return Ok(GeneratedTurn {
            turn,
            message: ModelMessage::AssistantToolCall {
                content: transcript,
                request,
            },
        });
    }

    let answer = transcript.trim();
    if answer.is_empty() {
        return Err(ParseError {
            raw: transcript,
            reason: "the model returned an empty reply".to_owned(),
        });
    }
    Ok(GeneratedTurn {
        turn: ModelTurn::FinalAnswer(answer.to_owned()),
        message: ModelMessage::Assistant(transcript),
    })
}
