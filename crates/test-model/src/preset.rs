use scout_model::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for one model call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a `PresetResponse` with a single text delta.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a `PresetResponse` with a single tool call.
    #[inline]
    pub fn tool_call(request: ToolCallRequest) -> Self {
        Self::with_events([PresetEvent::ToolCall(request)])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialized_shape() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me look.".to_string()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "1".to_string(),
                name: "search".to_string(),
                arguments: json!({ "query": "weather Paris today" }),
            }),
        ])
        .with_failures(2);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["events"][0]["type"], "message_delta");
        assert_eq!(value["events"][1]["type"], "tool_call");
        assert_eq!(value["events"][1]["data"]["name"], "search");
        assert_eq!(value["failures"], 2);

        let parsed: PresetResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, response);
    }
}
