//! Brave Web Search tool

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{names, Tool, ToolContext, ToolResult};
use crate::env::{EnvSource, ProcessEnv};

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const BRAVE_API_KEY_ENV: &str = "BRAVE_API_KEY";
const MAX_RESULTS: u32 = 20;

/// Tool for performing web searches using Brave Search API
pub struct WebSearchTool {
    client: reqwest::Client,
    timeout_secs: u64,
    api_key: Option<String>,
}

impl WebSearchTool {
    /// A missing key is reported when the tool is called, not here
    pub fn new(api_key: Option<String>) -> Self {
        let timeout_secs = 30;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(format!("lovable-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            timeout_secs,
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn from_env(env: &impl EnvSource) -> Self {
        Self::new(env.var(BRAVE_API_KEY_ENV))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::from_env(&ProcessEnv)
    }
}

#[derive(Debug, Deserialize)]
struct WebSearchParams {
    query: String,
    #[serde(default = "default_count")]
    count: u32,
}

fn default_count() -> u32 {
    10
}

/// Brave Search API response structures
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

fn format_results(response: BraveSearchResponse) -> String {
    let Some(web) = response.web else {
        return "No web results found.".to_string();
    };
    if web.results.is_empty() {
        return "No results found.".to_string();
    }

    let mut output = String::new();
    for (i, result) in web.results.iter().enumerate() {
        output.push_str(&format!("{}. [{}]({})\n", i + 1, result.title, result.url));
        if !result.description.is_empty() {
            output.push_str(&format!("   {}\n", result.description));
        }
    }
    output
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        names::WEB_SEARCH
    }

    fn description(&self) -> &'static str {
        "Search the web. Returns relevant results with titles, URLs, and descriptions."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of results to return (default: 10, max: 20)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let params: WebSearchParams = serde_json::from_value(params)?;
        let count = params.count.clamp(1, MAX_RESULTS);

        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(ToolResult::error(format!(
                "{} environment variable not set. \
                 Get an API key from https://brave.com/search/api/",
                BRAVE_API_KEY_ENV
            )));
        };

        let url = format!(
            "{}?q={}&count={}",
            BRAVE_SEARCH_URL,
            urlencoding::encode(&params.query),
            count
        );

        let result = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.client
                .get(&url)
                .header("Accept", "application/json")
                .header("X-Subscription-Token", api_key)
                .send(),
        )
        .await;

        match result {
            Ok(Ok(response)) => {
                let status = response.status();
                if !status.is_success() {
                    let error_text = response.text().await.unwrap_or_default();
                    return Ok(ToolResult::error(format!(
                        "Brave Search API error: {} {} - {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown"),
                        error_text
                    )));
                }

                match response.json::<BraveSearchResponse>().await {
                    Ok(search_response) => Ok(ToolResult::success(format_results(search_response))),
                    Err(e) => Ok(ToolResult::error(format!(
                        "Failed to parse Brave Search response: {}",
                        e
                    ))),
                }
            }
            Ok(Err(e)) => Ok(ToolResult::error(format!("Request failed: {}", e))),
            Err(_) => Ok(ToolResult::error(format!(
                "Request timed out after {} seconds",
                self.timeout_secs
            ))),
        }
    }
}
