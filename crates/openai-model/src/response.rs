use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::future::BoxFuture;
use pin_project_lite::pin_project;
use scout_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::proto::{
    self, ChatCompletion, ChatCompletionChunk, ToolCall, merge_tool_call,
    to_tool_call_request,
};
use crate::sse::Sse;

/// What is left to report once the text has been delivered.
#[derive(Default)]
struct Tail {
    tool_calls: Vec<ToolCall>,
    finish_reason: Option<ModelFinishReason>,
    tool_call_sent: bool,
    completed: bool,
}

impl Tail {
    /// Emits the tool call (if any), then the completion event, then
    /// nothing.
    ///
    /// Only the first tool call is surfaced; the request asks for one call
    /// per turn and surplus ones are dropped.
    fn next_event(&mut self) -> Option<ModelResponseEvent> {
        if !self.tool_call_sent {
            self.tool_call_sent = true;
            if self.tool_calls.len() > 1 {
                warn!(
                    "dropping {} surplus tool calls",
                    self.tool_calls.len() - 1
                );
            }
            if let Some(call) = self.tool_calls.first() {
                return Some(ModelResponseEvent::ToolCall(
                    to_tool_call_request(call),
                ));
            }
        }
        if !self.completed {
            self.completed = true;
            let reason = self.finish_reason.unwrap_or(
                if self.tool_calls.is_empty() {
                    ModelFinishReason::Stop
                } else {
                    ModelFinishReason::ToolCalls
                },
            );
            return Some(ModelResponseEvent::Completed(reason));
        }
        None
    }
}

/// Maps a raw finish reason, failing when the reply was filtered out.
fn finish_reason(reason: &str) -> Result<ModelFinishReason, Error> {
    if reason == proto::CONTENT_FILTER {
        warn!("reply withheld by the content filter");
        return Err(Error::new(
            "the reply was withheld by the content filter",
            ErrorKind::Moderated,
        ));
    }
    Ok(proto::parse_finish_reason(reason))
}

struct StreamState {
    sse: Sse,
    done: bool,
    tail: Tail,
}

type NextEvent = Result<(Option<ModelResponseEvent>, StreamState), Error>;

pin_project! {
    /// A response from an OpenAI-compatible service.
    pub struct OpenAIResponse {
        next_event_fut: Option<BoxFuture<'static, NextEvent>>,
        buffered: VecDeque<ModelResponseEvent>,
    }
}

impl OpenAIResponse {
    /// Wraps a streamed (SSE) reply.
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let state = StreamState {
            sse,
            done: false,
            tail: Tail::default(),
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
            buffered: VecDeque::new(),
        }
    }

    /// Wraps a complete (non-streamed) reply.
    pub(crate) fn from_completion(
        completion: ChatCompletion,
    ) -> Result<Self, Error> {
        let mut buffered = VecDeque::new();
        let mut tail = Tail::default();
        if let Some(choice) = completion.choices.into_iter().next() {
            if let Some(content) =
                choice.message.content.filter(|c| !c.is_empty())
            {
                buffered.push_back(ModelResponseEvent::MessageDelta(content));
            }
            tail.tool_calls = choice.message.tool_calls.unwrap_or_default();
            tail.finish_reason =
                choice.finish_reason.as_deref().map(finish_reason).transpose()?;
        }
        while let Some(event) = tail.next_event() {
            buffered.push_back(event);
        }
        Ok(Self {
            next_event_fut: None,
            buffered,
        })
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        if let Some(event) = this.buffered.pop_front() {
            return Poll::Ready(Ok(Some(event)));
        }
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, state) = match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), state)) => (event, state),
            Ok((None, _)) => {
                *this.next_event_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_event_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        *this.next_event_fut = Some(Box::pin(next_event(state)));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut state: StreamState) -> NextEvent {
    while !state.done {
        let data = match state.sse.next_event().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                state.done = true;
                break;
            }
            Err(err) => {
                return Err(Error::new(format!("{err}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {data}");
        if data == "[DONE]" {
            state.done = true;
            break;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&data)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        // Usage-only chunks carry no choices.
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };

        if let Some(fragments) = choice.delta.tool_calls {
            for fragment in fragments {
                merge_tool_call(&mut state.tail.tool_calls, fragment);
            }
        }
        if let Some(reason) = choice.finish_reason {
            state.tail.finish_reason = Some(finish_reason(&reason)?);
        }
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            return Ok((Some(ModelResponseEvent::MessageDelta(content)), state));
        }
    }

    // Text is always delivered before the tool call and the completion.
    let event = state.tail.next_event();
    Ok((event, state))
}
