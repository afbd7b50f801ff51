//! A local fake model for testing purpose.

#[macro_use]
extern crate tracing;

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use scout_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.events.is_empty() {
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        Poll::Ready(Ok(this.events.pop_front()))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<ScriptedResponse>,
    requests: Vec<ModelRequest>,
}

struct ScriptedResponse {
    preset: PresetResponse,
    failed_attempts: u64,
}

/// A local fake model for testing purpose.
///
/// Responses are consumed in the order they were added, one per
/// successful request, regardless of what the request contains. Every
/// request is recorded, so tests can assert how many calls were made and
/// what they carried. Once the script runs out, requests fail.
///
/// Clones share the same script, so a test can keep one handle for
/// inspection while another is moved into the agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push_back(ScriptedResponse {
            preset,
            failed_attempts: 0,
        });
    }

    /// Sets the delay before each event is delivered.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, including failed ones.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of requests received so far.
    #[inline]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns the number of scripted responses not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.lock().responses.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A test that panicked while holding the lock has failed anyway.
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn next_response(
        &self,
        req: &ModelRequest,
    ) -> Result<TestModelResponse, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let Some(front) = script.responses.front_mut() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };
        let failures = front.preset.failures;
        match failures {
            Some(0) => {
                return Err(Error {
                    message: "scripted failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            Some(failures) if front.failed_attempts < failures => {
                front.failed_attempts += 1;
                return Err(Error {
                    message: "scripted failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            _ => {}
        }

        let Some(scripted) = script.responses.pop_front() else {
            unreachable!("front response checked above");
        };
        let preset_events = scripted.preset.events;
        let has_tool_call = preset_events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)));

        let mut events: VecDeque<_> = preset_events
            .into_iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg)
                }
                PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req),
            })
            .collect();
        events.push_back(ModelResponseEvent::Completed(if has_tool_call {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        }));
        trace!("serving {} scripted events", events.len());

        Ok(TestModelResponse {
            events,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.next_response(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use scout_model::{ModelMessage, ToolCallRequest};
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>, Option<ModelFinishReason>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        let mut finish_reason = None;
        while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap()
        {
            match event {
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason)
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
        (msg, tool_call, finish_reason)
    }

    fn user_request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scripted_order() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me look.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call:1".to_owned(),
                name: "search".to_owned(),
                arguments: json!({ "query": "todo" }),
            }),
        ]));
        provider.add_response(PresetResponse::text("Done."));

        let resp = provider.send_request(&user_request("Hi")).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "Sure, let me look.");
        assert_eq!(tool_call.unwrap().arguments, json!({ "query": "todo" }));
        assert_eq!(reason, Some(ModelFinishReason::ToolCalls));

        let resp = provider.send_request(&user_request("Go")).await.unwrap();
        let (msg, tool_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "Done.");
        assert!(tool_call.is_none());
        assert_eq!(reason, Some(ModelFinishReason::Stop));

        assert_eq!(provider.request_count(), 2);
        assert_eq!(provider.remaining(), 0);
        assert!(provider.send_request(&user_request("More")).await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mut provider = TestModelProvider::default();
        provider
            .add_response(PresetResponse::text("Finally.").with_failures(2));

        for _ in 0..2 {
            let err = provider
                .send_request(&user_request("Hi"))
                .await
                .err()
                .unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&user_request("Hi")).await.unwrap();
        let (msg, _, _) = collect_response(resp).await;
        assert_eq!(msg, "Finally.");
        assert_eq!(provider.requests().len(), 3);
    }
}
