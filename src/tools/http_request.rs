//! Generic HTTP request tool

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::fetch_url::validate_url;
use super::{names, truncate_output, Tool, ToolContext, ToolResult};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_BODY: usize = 50_000;

/// Tool for making arbitrary HTTP requests to APIs
pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("lovable-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct HttpRequestParams {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// String bodies are sent as-is; anything else is sent as JSON
    #[serde(default)]
    body: Option<serde_json::Value>,
    #[serde(default)]
    params: BTreeMap<String, String>,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Parse an HTTP method name, case-insensitively
fn parse_method(method: &str) -> Result<Method, String> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("Invalid HTTP method: {}", method))
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &'static str {
        names::HTTP_REQUEST
    }

    fn description(&self) -> &'static str {
        "Make an HTTP request to an API or web service. Returns the status code, \
         response headers and body (parsed when the body is JSON)."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Target URL (http or https)"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (default: GET)"
                },
                "headers": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Request headers"
                },
                "body": {
                    "description": "Request body: a string is sent as-is, objects are sent as JSON"
                },
                "params": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Query string parameters"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 30)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let params: HttpRequestParams =
            serde_json::from_value(params).context("Invalid http_request params")?;

        if let Err(e) = validate_url(&params.url) {
            return Ok(ToolResult::error(e));
        }
        let method = match parse_method(&params.method) {
            Ok(m) => m,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let mut request = self
            .client
            .request(method, &params.url)
            .timeout(Duration::from_secs(params.timeout))
            .query(&params.params);
        for (name, value) in &params.headers {
            request = request.header(name, value);
        }
        request = match params.body {
            Some(serde_json::Value::String(body)) => request.body(body),
            Some(value) => request.json(&value),
            None => request,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(ToolResult::error(format!(
                    "Request timed out after {} seconds",
                    params.timeout
                )))
            }
            Err(e) => return Ok(ToolResult::error(format!("Request failed: {}", e))),
        };

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        let content = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) if text.len() <= MAX_BODY => value,
            _ => serde_json::Value::String(truncate_output(text, MAX_BODY)),
        };

        let output = json!({
            "success": status.is_success(),
            "status_code": status.as_u16(),
            "headers": headers,
            "content": content,
            "url": final_url,
        });
        let rendered = serde_json::to_string_pretty(&output)?;

        Ok(if status.is_success() {
            ToolResult::success(rendered)
        } else {
            ToolResult::error(rendered)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert_eq!(parse_method("GET").unwrap(), Method::GET);
        assert!(parse_method("NOT A METHOD").is_err());
    }

    #[test]
    fn test_params_defaults() {
        let params: HttpRequestParams =
            serde_json::from_value(json!({ "url": "https://api.example.com" })).unwrap();
        assert_eq!(params.method, "GET");
        assert_eq!(params.timeout, 30);
        assert!(params.headers.is_empty());
        assert!(params.body.is_none());
    }

    #[test]
    fn test_body_param() {
        let params: HttpRequestParams = serde_json::from_value(json!({
            "url": "https://api.example.com/items",
            "method": "POST",
            "body": { "name": "widget" }
        }))
        .unwrap();
        assert_eq!(params.body, Some(json!({ "name": "widget" })));
        assert_eq!(
            HttpRequestTool::new().schema()["properties"]["body"]["description"],
            "Request body: a string is sent as-is, objects are sent as JSON"
        );
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let result = HttpRequestTool::new()
            .execute(json!({ "url": "file:///etc/passwd" }), &context())
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Unsupported URL scheme"));
    }

    #[tokio::test]
    async fn test_rejects_bad_method() {
        let result = HttpRequestTool::new()
            .execute(
                json!({ "url": "https://api.example.com", "method": "NOT A METHOD" }),
                &context(),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Invalid HTTP method"));
    }
}
