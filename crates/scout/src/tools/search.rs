use std::sync::Arc;

use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use scout_core::tool::{Error as ToolError, Tool, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Input of [`TavilySearchTool`].
#[derive(Deserialize, JsonSchema)]
pub struct SearchParameters {
    #[schemars(description = "The search query.")]
    query: String,
    #[schemars(description = "How many results to return, at most.")]
    #[serde(default)]
    max_results: Option<u32>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    url: String,
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct Snippet<'a> {
    url: &'a str,
    content: &'a str,
}

/// A tool for searching the web with the Tavily search API.
///
/// The output is a JSON array of `{url, content}` objects, one per
/// result.
#[derive(Clone)]
pub struct TavilySearchTool {
    client: Client,
    api_key: Arc<str>,
    endpoint: String,
    max_results: u32,
    parameter_schema: Value,
}

impl TavilySearchTool {
    /// Creates a new search tool with the given API key.
    #[inline]
    pub fn new(api_key: &str) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    /// Creates a search tool that shares an existing HTTP client.
    pub fn with_client(client: Client, api_key: &str) -> Self {
        TavilySearchTool {
            client,
            api_key: Arc::from(api_key),
            endpoint: TAVILY_ENDPOINT.to_owned(),
            max_results: 3,
            parameter_schema: schema_for!(SearchParameters).to_value(),
        }
    }

    /// Sets how many results a search returns unless the model asks for
    /// fewer.
    #[inline]
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Sets a custom search endpoint.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Tool for TavilySearchTool {
    type Input = SearchParameters;

    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted \
         results. Useful for when you need to answer questions about current \
         events. Input should be a search query."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn input_from_text(
        &self,
        text: &str,
    ) -> Result<SearchParameters, ToolError> {
        Ok(SearchParameters {
            query: text.trim().to_owned(),
            max_results: None,
        })
    }

    fn execute(
        &self,
        input: SearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let api_key = Arc::clone(&self.api_key);
        let endpoint = self.endpoint.clone();
        let max_results = input
            .max_results
            .map_or(self.max_results, |n| n.clamp(1, self.max_results));
        async move {
            let query = input.query.trim();
            if query.is_empty() {
                return Err(ToolError::invalid_input()
                    .with_reason("the search query is empty"));
            }
            debug!("searching for {query:?}");

            let resp = client
                .post(&endpoint)
                .bearer_auth(&api_key)
                .json(&SearchRequest { query, max_results })
                .send()
                .await
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("search request failed: {err}"))
                })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                warn!("search service returned {status}: {body}");
                return Err(ToolError::execution_error().with_reason(format!(
                    "search service returned {status}: {}",
                    body.trim()
                )));
            }

            let resp: SearchResponse = resp.json().await.map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("invalid search response: {err}"))
            })?;
            format_results(query, &resp.results)
        }
    }
}

fn format_results(query: &str, results: &[SearchResult]) -> ToolResult {
    if results.is_empty() {
        return Ok(format!("No results found for: {query}"));
    }
    let snippets: Vec<_> = results
        .iter()
        .map(|result| Snippet {
            url: &result.url,
            content: &result.content,
        })
        .collect();
    serde_json::to_string(&snippets).map_err(|err| {
        ToolError::execution_error().with_reason(format!("{err}"))
    })
}
