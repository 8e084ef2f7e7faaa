//! Web search tool using the Tavily API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::tool::{Tool, ToolArgs, ToolOutput};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Web search tool backed by Tavily.
///
/// Only registered when an API key is configured.
///
/// # Parameters
///
/// - `query` (required): What to search for.
/// - `maxResults` (optional, default 5): Number of results.
/// - `searchDepth` (optional, default "basic"): `basic` or `advanced`.
pub struct WebSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u64,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: String,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
    #[serde(default)]
    response_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl WebSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, TAVILY_SEARCH_URL)
    }

    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "webSearch"
    }

    fn description(&self) -> &str {
        "Search the web for current information and news."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query to look for information"
                },
                "maxResults": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 20,
                    "default": 5,
                    "description": "Maximum number of results to return"
                },
                "searchDepth": {
                    "type": "string",
                    "enum": ["basic", "advanced"],
                    "default": "basic",
                    "description": "Search depth level"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let query = args.get_string("query")?;
        let max_results = args.get_u64_or("maxResults", 5);
        let search_depth = args
            .get_string_opt("searchDepth")
            .unwrap_or_else(|| "basic".to_string());

        debug!(query = %query, max_results, "Searching the web");

        let request = SearchRequest {
            api_key: &self.api_key,
            query: &query,
            max_results,
            search_depth: &search_depth,
            include_answer: true,
            include_raw_content: false,
            include_images: false,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Tavily search failed");
            return Err(ToolError::ExecutionFailed(format!(
                "Search API error: {} - {}",
                status, body
            )));
        }

        let data: SearchResponse = response.json().await?;

        let results: Vec<Value> = data
            .results
            .into_iter()
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "content": r.content,
                    "publishedDate": r.published_date,
                    "score": r.score,
                })
            })
            .collect();

        Ok(ToolOutput::success(json!({
            "query": data.query,
            "answer": data.answer,
            "results": results,
            "responseTime": data.response_time,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolContext;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_args(params: Value) -> ToolArgs {
        ToolArgs::new(
            params.as_object().cloned().unwrap_or_default(),
            ToolContext::anonymous("user-1"),
        )
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({
                "api_key": "tvly-test",
                "query": "rust 2024 edition",
                "max_results": 3,
                "include_answer": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "rust 2024 edition",
                "answer": "Released with Rust 1.85.",
                "results": [{
                    "title": "Announcing Rust 1.85",
                    "url": "https://blog.rust-lang.org/",
                    "content": "The 2024 edition is stable.",
                    "published_date": "2025-02-20",
                    "score": 0.93
                }],
                "response_time": 0.8
            })))
            .mount(&server)
            .await;

        let tool = WebSearch::with_endpoint("tvly-test", format!("{}/search", server.uri()));
        let output = tool
            .execute(make_args(json!({
                "query": "rust 2024 edition",
                "maxResults": 3,
                "searchDepth": "basic"
            })))
            .await
            .unwrap();

        assert_eq!(output.content["answer"], "Released with Rust 1.85.");
        assert_eq!(output.content["results"][0]["publishedDate"], "2025-02-20");
        assert_eq!(output.content["results"][0]["title"], "Announcing Rust 1.85");
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let tool = WebSearch::with_endpoint("tvly-bad", format!("{}/search", server.uri()));
        let result = tool.execute(make_args(json!({"query": "anything"}))).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed(msg)) if msg.contains("401")));
    }
}
