use scout_model::{
    ModelFinishReason, ModelMessage, ModelRequest, ModelTool, ToolCallRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionToolCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CompletionMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

// -----------
// Conversions
// -----------

pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let tools: Vec<Tool> = req.tools.iter().map(create_tool).collect();
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        // Only one tool call per turn is consumed downstream.
        parallel_tool_calls: (!tools.is_empty()).then_some(false),
        tools,
        stop: req.stop.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        stream: config.stream,
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: Some(content.clone()),
            tool_calls: None,
        },
        ModelMessage::AssistantToolCall { content, request } => {
            let arguments = match &request.arguments {
                Value::String(raw) => raw.clone(),
                other => other.to_string(),
            };
            Message::Assistant {
                content: (!content.is_empty()).then(|| content.clone()),
                tool_calls: Some(vec![ToolCall {
                    index: None,
                    id: Some(request.id.clone()),
                    r#type: Some("function".to_owned()),
                    function: Some(FunctionToolCall {
                        name: Some(request.name.clone()),
                        arguments: Some(arguments),
                    }),
                }]),
            }
        }
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
    }
}

fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Finish reason of a reply withheld by the service's content filter.
pub const CONTENT_FILTER: &str = "content_filter";

pub fn parse_finish_reason(reason: &str) -> ModelFinishReason {
    match reason {
        "tool_calls" | "function_call" => ModelFinishReason::ToolCalls,
        "length" => ModelFinishReason::Length,
        _ => ModelFinishReason::Stop,
    }
}

/// Folds a streamed tool call fragment into the calls seen so far.
///
/// The first fragment of a call carries its index, id and name; later
/// fragments with the same index append to the arguments.
pub fn merge_tool_call(calls: &mut Vec<ToolCall>, fragment: ToolCall) {
    let Some(partial) = calls
        .iter_mut()
        .find(|call| fragment.index.is_some() && call.index == fragment.index)
    else {
        calls.push(fragment);
        return;
    };
    if let Some(id) = fragment.id {
        partial.id.get_or_insert_default().push_str(&id);
    }
    if let Some(ty) = fragment.r#type {
        partial.r#type = Some(ty);
    }
    let Some(function) = fragment.function else {
        return;
    };
    let partial_func = partial.function.get_or_insert_default();
    if let Some(name) = function.name {
        partial_func.name.get_or_insert_default().push_str(&name);
    }
    if let Some(arguments) = function.arguments {
        partial_func
            .arguments
            .get_or_insert_default()
            .push_str(&arguments);
    }
}

/// Converts a complete tool call into the provider-neutral request.
pub fn to_tool_call_request(call: &ToolCall) -> ToolCallRequest {
    let function = call.function.clone().unwrap_or_default();
    let raw = function.arguments.unwrap_or_default();
    let arguments = if raw.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&raw).unwrap_or(Value::String(raw))
    };
    ToolCallRequest {
        id: call.id.clone().unwrap_or_default(),
        name: function.name.unwrap_or_default(),
        arguments,
    }
}
