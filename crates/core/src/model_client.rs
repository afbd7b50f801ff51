use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use futures_util::future::{BoxFuture, FutureExt};
use scout_model::{
    ModelFinishReason, ModelMessage, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, ModelTool,
    ToolCallRequest,
};
use tracing::Instrument;

use crate::conversation::Conversation;
use crate::prompt::PromptStyle;
use crate::tool::ToolRequest;

pub(crate) type TranscriptFn = Arc<dyn Fn(&str) + Send + Sync>;
type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, TranscriptFn) -> BoxFuture<'static, SendRequestResult>
        + Send + Sync
>;

/// What the model decided to do next.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelTurn {
    /// The model answered the question.
    FinalAnswer(String),
    /// The model wants a tool to be called first.
    ToolCall(ToolRequest),
}

/// A model reply that could not be read as a [`ModelTurn`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// The reply text as the model produced it.
    pub raw: String,
    /// Why the reply was rejected.
    pub reason: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not parse model output: {}", self.reason)
    }
}

impl StdError for ParseError {}

/// Controls how transient model failures are retried.
///
/// Only rate limiting and service unavailability are retried; every other
/// failure is reported right away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that retries up to `max_retries` times.
    #[inline]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Creates a policy that never retries.
    #[inline]
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Sets the delay before the first retry.
    #[inline]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the upper bound of the delay between retries.
    #[inline]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Returns the maximum number of retries.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// A parsed model reply, with the message to record for it.
#[derive(Debug)]
pub(crate) struct GeneratedTurn {
    pub turn: ModelTurn,
    pub message: ModelMessage,
}

#[derive(Debug)]
pub(crate) enum GenerateError {
    Provider(Box<dyn ModelProviderError>),
    Parse(ParseError),
    EmptyConversation,
}

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
    style: PromptStyle,
    system_prompt: String,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(
        provider: P,
        style: PromptStyle,
        system_prompt: String,
        retry_policy: RetryPolicy,
    ) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_transcript| {
            let fut = provider.send_request(&req);
            async move {
                trace!("got a request: {:?}", req);
                let resp_or_err = fut.await;
                handle_response::<P>(resp_or_err, on_transcript).await
            }
            .instrument(trace_span!("model client req"))
            .boxed()
        });
        Self {
            handler_fn,
            style,
            system_prompt,
            retry_policy,
        }
    }

    #[inline]
    pub fn style(&self) -> PromptStyle {
        self.style
    }

    /// Asks the model for the next turn of the conversation.
    ///
    /// The conversation is only read. `turn_index` names the tool call ids
    /// of styles whose replies carry none.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    pub async fn generate(
        &self,
        conversation: &Conversation,
        catalog: &[ModelTool],
        turn_index: usize,
        on_transcript: TranscriptFn,
    ) -> Result<GeneratedTurn, GenerateError> {
        if !conversation.has_user_turn() {
            return Err(GenerateError::EmptyConversation);
        }
        let req =
            self.style
                .build_request(&self.system_prompt, conversation, catalog);
        let resp = self
            .send_request(req, on_transcript)
            .await
            .map_err(GenerateError::Provider)?;
        if resp.finish_reason == Some(ModelFinishReason::Length) {
            warn!("model reply was cut off by the token limit");
        }
        self.style
            .interpret(resp, turn_index)
            .map_err(GenerateError::Parse)
    }

    /// Sends a request, retrying transient failures per the retry policy.
    async fn send_request(
        &self,
        req: ModelRequest,
        on_transcript: TranscriptFn,
    ) -> SendRequestResult {
        let max_retries = self.retry_policy.max_retries;
        let mut attempt = 0;
        backoff::future::retry(self.retry_policy.backoff(), || {
            attempt += 1;
            let attempt = attempt;
            let on_transcript = Arc::clone(&on_transcript);
            let fut = (self.handler_fn)(req.clone(), on_transcript);
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_transient() && attempt <= max_retries {
                        warn!("model request failed ({err}), retrying");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub(crate) struct ModelClientResponse {
    pub transcript: String,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: TranscriptFn,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                on_transcript(msg.as_str());
                transcript.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        tool_calls,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use scout_model::ErrorKind;
    use scout_test_model::{PresetEvent, PresetResponse, TestModelProvider};
    use serde_json::json;

    use super::*;
    use crate::conversation::Turn;
    use crate::tool::ToolArguments;

    fn client(provider: TestModelProvider, style: PromptStyle) -> ModelClient {
        ModelClient::new(
            provider,
            style,
            "Be brief.".to_owned(),
            RetryPolicy::default(),
        )
    }

    fn conversation(style: PromptStyle, question: &str) -> Conversation {
        let mut conversation = Conversation::default();
        conversation.push(
            Turn::User(question.to_owned()),
            style.question_message(question),
        );
        conversation
    }

    fn ignore_transcript() -> TranscriptFn {
        Arc::new(|_: &str| {})
    }

    #[tokio::test]
    async fn test_generate_streams_transcript() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Thought: easy.\n".to_owned()),
            PresetEvent::MessageDelta("Final Answer: ".to_owned()),
            PresetEvent::MessageDelta("Hello!".to_owned()),
        ]));
        let client = client(provider.clone(), PromptStyle::ReAct);

        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let on_transcript: TranscriptFn = {
            let seen = Arc::clone(&seen);
            Arc::new(move |delta: &str| {
                seen.lock().unwrap().push(delta.to_owned());
            })
        };
        let conversation = conversation(PromptStyle::ReAct, "Greet me");
        let generated = client
            .generate(&conversation, &[], 0, on_transcript)
            .await
            .unwrap();

        assert_eq!(generated.turn, ModelTurn::FinalAnswer("Hello!".to_owned()));
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(conversation.len(), 1);
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].stop, ["\nObservation:"]);
    }

    #[tokio::test]
    async fn test_generate_native_tool_call() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::tool_call(ToolCallRequest {
            id: "call_abc".to_owned(),
            name: "search".to_owned(),
            arguments: json!({ "query": "weather Paris today" }),
        }));
        let client = client(provider, PromptStyle::Native);

        let generated = client
            .generate(
                &conversation(PromptStyle::Native, "Weather?"),
                &[],
                0,
                ignore_transcript(),
            )
            .await
            .unwrap();
        assert_eq!(
            generated.turn,
            ModelTurn::ToolCall(ToolRequest {
                call_id: "call_abc".to_owned(),
                tool_name: "search".to_owned(),
                arguments: ToolArguments::Structured(
                    json!({ "query": "weather Paris today" })
                ),
            })
        );
    }

    #[tokio::test]
    async fn test_empty_conversation() {
        let provider = TestModelProvider::default();
        let client = client(provider.clone(), PromptStyle::ReAct);
        let result = client
            .generate(&Conversation::default(), &[], 0, ignore_transcript())
            .await;
        assert!(matches!(result, Err(GenerateError::EmptyConversation)));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried() {
        let mut provider = TestModelProvider::default();
        provider.add_response(
            PresetResponse::text("Final Answer: finally").with_failures(2),
        );
        let client = client(provider.clone(), PromptStyle::ReAct);

        let generated = client
            .generate(
                &conversation(PromptStyle::ReAct, "Hi"),
                &[],
                0,
                ignore_transcript(),
            )
            .await
            .unwrap();
        assert_eq!(
            generated.turn,
            ModelTurn::FinalAnswer("finally".to_owned())
        );
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::text("never").with_failures(0));
        let client = client(provider.clone(), PromptStyle::ReAct);

        let result = client
            .generate(
                &conversation(PromptStyle::ReAct, "Hi"),
                &[],
                0,
                ignore_transcript(),
            )
            .await;
        let Err(GenerateError::Provider(err)) = result else {
            panic!("expected a provider error");
        };
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        // An exhausted script fails with a non-transient error.
        let provider = TestModelProvider::default();
        let client = client(provider.clone(), PromptStyle::ReAct);

        let result = client
            .generate(
                &conversation(PromptStyle::ReAct, "Hi"),
                &[],
                0,
                ignore_transcript(),
            )
            .await;
        assert!(matches!(result, Err(GenerateError::Provider(_))));
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::text("Just vibes."));
        let client = client(provider, PromptStyle::ReAct);

        let result = client
            .generate(
                &conversation(PromptStyle::ReAct, "Hi"),
                &[],
                0,
                ignore_transcript(),
            )
            .await;
        let Err(GenerateError::Parse(err)) = result else {
            panic!("expected a parse error");
        };
        assert_eq!(err.raw, "Just vibes.");
    }
}
