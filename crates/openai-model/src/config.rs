use std::fmt::{self, Debug, Formatter};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Builder for [`OpenAIConfig`].
///
/// Defaults target Groq's OpenAI-compatible endpoint; any other
/// chat-completions service works by setting the base URL and model.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    stream: bool,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            stream: true,
        }
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Caps the number of tokens generated per response.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Chooses between streamed (the default) and buffered responses.
    #[inline]
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAIConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        OpenAIConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: Option<f32>,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) stream: bool,
}

impl OpenAIConfig {
    /// Returns the model name.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns `true` if responses are streamed.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OpenAIConfigBuilder::with_api_key("key").build();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(
            config.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert!(config.is_streaming());
        assert_eq!(config.temperature, None);
    }

    #[test]
    fn test_overrides() {
        let config = OpenAIConfigBuilder::with_api_key("key")
            .with_base_url("http://localhost:8080/v1/")
            .with_model("local")
            .with_temperature(0.2)
            .with_max_tokens(256)
            .with_streaming(false)
            .build();
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(config.model(), "local");
        assert_eq!(config.max_tokens, Some(256));
        assert!(!config.is_streaming());
    }

    #[test]
    fn test_debug_hides_key() {
        let config = OpenAIConfigBuilder::with_api_key("sk-secret").build();
        assert!(!format!("{config:?}").contains("sk-secret"));
        let builder = OpenAIConfigBuilder::with_api_key("sk-secret");
        assert!(!format!("{builder:?}").contains("sk-secret"));
    }
}
