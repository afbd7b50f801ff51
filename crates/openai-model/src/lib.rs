//! A model provider for OpenAI-compatible chat-completions APIs.
//!
//! Works with any service speaking the chat-completions protocol (Groq,
//! OpenAI, local servers). Replies can be streamed as server-sent events
//! or fetched as a single JSON document; both surface the same events.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;
mod sse;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use scout_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
pub use response::OpenAIResponse;
use sse::{Chunks, Sse};

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a provider that shares an existing HTTP client.
    #[inline]
    pub fn with_client(client: Client, config: OpenAIConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let streaming = self.config.stream;
        let accept = if streaming {
            "text/event-stream"
        } else {
            "application/json"
        };
        let resp_fut = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, accept)
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(|err| {
                let kind = if err.is_timeout() || err.is_connect() {
                    ErrorKind::Unavailable
                } else {
                    ErrorKind::Other
                };
                Error::new(format!("{err}"), kind)
            })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(error_from_response(resp).await);
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<Mime>().ok());
            let subtype = content_type.as_ref().map(|m| m.subtype().as_str());

            if streaming {
                if subtype != Some("event-stream") {
                    return Err(Error::new(
                        format!("unexpected content type: {content_type:?}"),
                        ErrorKind::Other,
                    ));
                }
                let sse = Sse::new(Chunks::from_response(resp));
                return Ok(OpenAIResponse::from_sse(sse));
            }

            if subtype != Some("json") {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }
            let completion = resp
                .json()
                .await
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
            OpenAIResponse::from_completion(completion)
        }
    }
}

async fn error_from_response(resp: Response) -> Error {
    let status = resp.status();
    let kind = error_kind_for_status(status);
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<proto::ErrorBody>(&body)
        .map(|body| body.error.message)
        .unwrap_or(body);
    error!("model service replied {status}: {message}");
    Error::new(format!("{status}: {message}"), kind)
}

fn error_kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        status if status.is_server_error() => ErrorKind::Unavailable,
        _ => ErrorKind::Other,
    }
}
