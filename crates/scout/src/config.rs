//! Startup configuration, read from the environment.

use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use scout_core::{PromptStyle, Retention};
use scout_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

use crate::tools::TavilySearchTool;

const DEFAULT_MODEL: &str = "llama3-8b-8192";
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// The error returned when the configuration is incomplete or invalid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set to something that cannot be used.
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "{name} is not set. Check your .env file.")
            }
            ConfigError::Invalid {
                name,
                value,
                reason,
            } => write!(f, "invalid value for {name} (`{value}`): {reason}"),
        }
    }
}

impl StdError for ConfigError {}

/// Everything the assistant needs to start.
///
/// Built once at startup and handed to the session; nothing reads the
/// environment after that.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Key for the model service.
    pub groq_api_key: String,
    /// Key for the search service.
    pub tavily_api_key: String,
    /// The model name.
    pub model: String,
    /// Base URL of the OpenAI-compatible model service.
    pub base_url: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Cap on tokens generated per model call.
    pub max_tokens: u32,
    /// Whether model replies are streamed.
    pub stream: bool,
    /// How tools are offered to the model.
    pub prompt_style: PromptStyle,
    /// What the assistant remembers between questions.
    pub retention: Retention,
    /// Model calls allowed per question.
    pub max_steps: usize,
    /// Results requested per search.
    pub search_max_results: u32,
    /// How long a tool may run.
    pub tool_timeout: Duration,
    /// Whether the model's reasoning is echoed while it streams.
    pub verbose: bool,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("groq_api_key", &"<redacted>")
            .field("tavily_api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .field("prompt_style", &self.prompt_style)
            .field("retention", &self.retention)
            .field("max_steps", &self.max_steps)
            .field("search_max_results", &self.search_max_results)
            .field("tool_timeout", &self.tool_timeout)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value
    /// of a variable if it is set.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let config = Config {
            groq_api_key: vars.required("GROQ_API_KEY")?,
            tavily_api_key: vars.required("TAVILY_API_KEY")?,
            model: vars
                .get("SCOUT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: vars
                .get("SCOUT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            temperature: vars.parse("SCOUT_TEMPERATURE", 0.7)?,
            max_tokens: vars.parse("SCOUT_MAX_TOKENS", 1024)?,
            stream: vars.parse_with("SCOUT_STREAM", true, parse_bool)?,
            prompt_style: vars.parse_with(
                "SCOUT_PROMPT_STYLE",
                PromptStyle::ReAct,
                parse_prompt_style,
            )?,
            retention: vars.parse_with(
                "SCOUT_RETENTION",
                Retention::PerQuestion,
                parse_retention,
            )?,
            max_steps: vars.parse("SCOUT_MAX_STEPS", 15)?,
            search_max_results: vars.parse("SCOUT_SEARCH_MAX_RESULTS", 3)?,
            tool_timeout: Duration::from_secs(
                vars.parse("SCOUT_TOOL_TIMEOUT_SECS", 30)?,
            ),
            verbose: vars.parse_with("SCOUT_VERBOSE", false, parse_bool)?,
        };
        config.validate(&vars)?;
        Ok(config)
    }

    /// Returns the model service configuration.
    pub fn openai_config(&self) -> OpenAIConfig {
        OpenAIConfigBuilder::with_api_key(&self.groq_api_key)
            .with_model(&self.model)
            .with_base_url(&self.base_url)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_streaming(self.stream)
            .build()
    }

    /// Returns the search tool.
    pub fn search_tool(&self) -> TavilySearchTool {
        TavilySearchTool::new(&self.tavily_api_key)
            .with_max_results(self.search_max_results)
    }

    fn validate<F>(&self, vars: &Vars<F>) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(vars.invalid(
                "SCOUT_TEMPERATURE",
                "must be between 0 and 2",
            ));
        }
        if self.max_tokens == 0 {
            return Err(vars.invalid("SCOUT_MAX_TOKENS", "must be positive"));
        }
        if self.max_steps == 0 {
            return Err(vars.invalid("SCOUT_MAX_STEPS", "must be positive"));
        }
        if !(1..=20).contains(&self.search_max_results) {
            return Err(vars.invalid(
                "SCOUT_SEARCH_MAX_RESULTS",
                "must be between 1 and 20",
            ));
        }
        if self.tool_timeout.is_zero() {
            return Err(vars.invalid(
                "SCOUT_TOOL_TIMEOUT_SECS",
                "must be positive",
            ));
        }
        Ok(())
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T>(
        &self,
        name: &'static str,
        default: T,
    ) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parse_with(name, default, |value| {
            value.parse().map_err(|err: T::Err| err.to_string())
        })
    }

    fn parse_with<T>(
        &self,
        name: &'static str,
        default: T,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Result<T, ConfigError> {
        let Some(value) = self.get(name) else {
            return Ok(default);
        };
        parse(&value).map_err(|reason| ConfigError::Invalid {
            name,
            value,
            reason,
        })
    }

    fn invalid(&self, name: &'static str, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            name,
            value: self.get(name).unwrap_or_default(),
            reason: reason.to_owned(),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected `true` or `false`".to_owned()),
    }
}

fn parse_prompt_style(value: &str) -> Result<PromptStyle, String> {
    match value.to_ascii_lowercase().as_str() {
        "react" => Ok(PromptStyle::ReAct),
        "native" => Ok(PromptStyle::Native),
        _ => Err("expected `react` or `native`".to_owned()),
    }
}

fn parse_retention(value: &str) -> Result<Retention, String> {
    match value.to_ascii_lowercase().as_str() {
        "question" => Ok(Retention::PerQuestion),
        "session" => Ok(Retention::Session),
        _ => Err("expected `question` or `session`".to_owned()),
    }
}
