//! Exercises the protocol with a minimal provider that echoes the last user
//! message word by word, or asks for a tool when one is offered.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use scout_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ModelTool, ToolCallRequest,
};
use serde_json::json;
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct EchoError(ErrorKind);

impl Display for EchoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "echo model failed: {}", self.0)
    }
}

impl Error for EchoError {}

impl ModelProviderError for EchoError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

struct EchoResponse {
    events: VecDeque<ModelResponseEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for EchoResponse {
    type Error = EchoError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(sleep(Duration::from_millis(1))));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;
        Poll::Ready(Ok(this.events.pop_front()))
    }
}

struct EchoProvider;

impl ModelProvider for EchoProvider {
    type Error = EchoError;
    type Response = EchoResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.clone()),
            _ => None,
        });
        let Some(text) = last_user else {
            return ready(Err(EchoError(ErrorKind::Other)));
        };

        let mut events = VecDeque::new();
        if let Some(tool) = req.tools.first() {
            events.push_back(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: "call:0".to_owned(),
                name: tool.name.clone(),
                arguments: json!({ "query": text }),
            }));
            events.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::ToolCalls,
            ));
        } else {
            let reply = format!("You said {text}");
            let mut words = reply.split(' ').peekable();
            while let Some(word) = words.next() {
                let delta = if words.peek().is_some() {
                    format!("{word} ")
                } else {
                    word.to_owned()
                };
                events.push_back(ModelResponseEvent::MessageDelta(delta));
            }
            let completed =
                ModelResponseEvent::Completed(ModelFinishReason::Stop);
            events.push_back(completed);
        }
        ready(Ok(EchoResponse {
            events,
            sleep: None,
        }))
    }
}

async fn drain(mut resp: EchoResponse) -> Vec<ModelResponseEvent> {
    let mut events = vec![];
    while let Some(event) =
        poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx))
            .await
            .unwrap()
    {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_text_completion() {
    let req = ModelRequest {
        messages: vec![
            ModelMessage::System("Be brief.".to_owned()),
            ModelMessage::User("Good morning".to_owned()),
        ],
        ..Default::default()
    };
    let resp = EchoProvider.send_request(&req).await.unwrap();
    let events = drain(resp).await;

    let text: String = events
        .iter()
        .filter_map(|event| match event {
            ModelResponseEvent::MessageDelta(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "You said Good morning");
    assert_eq!(
        events.last(),
        Some(&ModelResponseEvent::Completed(ModelFinishReason::Stop))
    );
}

#[tokio::test]
async fn test_tool_call_completion() {
    let req = ModelRequest {
        messages: vec![ModelMessage::User("rust news".to_owned())],
        tools: vec![ModelTool {
            name: "search".to_owned(),
            description: "Searches the web.".to_owned(),
            parameters: json!({ "type": "object" }),
        }],
        stop: vec![],
    };
    let resp = EchoProvider.send_request(&req).await.unwrap();
    let events = drain(resp).await;

    assert_eq!(events.len(), 2);
    let ModelResponseEvent::ToolCall(call) = &events[0] else {
        panic!("expected a tool call, got {:?}", events[0]);
    };
    assert_eq!(call.name, "search");
    assert_eq!(call.arguments, json!({ "query": "rust news" }));
}

#[tokio::test]
async fn test_error() {
    let req = ModelRequest::default();
    let err = EchoProvider.send_request(&req).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(!err.kind().is_transient());
}
