//! URL fetching tool
//!
//! HTML responses are stripped of scripts, styles and page chrome, then
//! converted to markdown for more efficient token usage.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use fancy_regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{names, truncate_output, Tool, ToolContext, ToolResult};

const DEFAULT_MAX_LENGTH: usize = 20_000;
const TIMEOUT_SECS: u64 = 30;

/// Tool for fetching web content as markdown
pub struct FetchUrlTool {
    client: reqwest::Client,
}

impl FetchUrlTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("lovable-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct FetchUrlParams {
    url: String,
    max_length: Option<usize>,
}

/// Only http and https URLs may be fetched
pub(crate) fn validate_url(url: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("Invalid URL: {}", e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(format!(
            "Unsupported URL scheme: {}. Only http and https are allowed.",
            scheme
        )),
    }
}

fn is_html(content_type: &str, body: &str) -> bool {
    let head = body.trim_start();
    content_type.contains("text/html")
        || head.starts_with("<!DOCTYPE")
        || head.starts_with("<!doctype")
        || head.starts_with("<html")
}

static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<script[^>]*>.*?</script>",
        r"(?is)<style[^>]*>.*?</style>",
        r"(?is)<(nav|header|footer|aside|noscript)[^>]*>.*?</\1>",
        r"(?s)<!--.*?-->",
        r"(?is)<svg[^>]*>.*?</svg>",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Strip noise elements from HTML (scripts, styles, nav, etc.)
///
/// A pattern that exceeds the regex backtracking limit on a large page is
/// skipped and the HTML is left as it was for that pattern.
fn strip_html_noise(html: &str) -> String {
    let mut html = html.to_string();
    for re in NOISE_PATTERNS.iter() {
        match re.try_replacen(&html, 0, "") {
            Ok(cleaned) => html = cleaned.into_owned(),
            Err(e) => warn!("Skipping HTML noise pattern {}: {}", re.as_str(), e),
        }
    }
    html
}

fn to_markdown(content_type: &str, body: String) -> String {
    if is_html(content_type, &body) {
        let cleaned = strip_html_noise(&body);
        htmd::convert(&cleaned).unwrap_or(cleaned)
    } else {
        body
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &'static str {
        names::FETCH_URL
    }

    fn description(&self) -> &'static str {
        "Fetch a web page or document by URL. HTML is converted to markdown."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http or https URL to fetch"
                },
                "max_length": {
                    "type": "integer",
                    "description": "Maximum bytes of content to return (default: 20000)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let params: FetchUrlParams = serde_json::from_value(params)?;
        let max_length = params.max_length.unwrap_or(DEFAULT_MAX_LENGTH);

        if let Err(e) = validate_url(&params.url) {
            return Ok(ToolResult::error(e));
        }

        let response = match self.client.get(&params.url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(ToolResult::error(format!(
                    "Request timed out after {} seconds",
                    TIMEOUT_SECS
                )))
            }
            Err(e) => return Ok(ToolResult::error(format!("Request failed: {}", e))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Failed to read response body: {}",
                    e
                )))
            }
        };
        let size = body.len();
        let content = truncate_output(to_markdown(&content_type, body), max_length);

        Ok(ToolResult::success(format!(
            "[URL: {}]\n[Content-Type: {}]\n[Size: {} bytes]\n\n{}",
            params.url, content_type, size, content
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context;

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let result = FetchUrlTool::new()
            .execute(json!({ "url": "not a valid url" }), &context())
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_fetch_unsupported_scheme() {
        let result = FetchUrlTool::new()
            .execute(json!({ "url": "ftp://example.com/file" }), &context())
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Unsupported URL scheme"));
    }

    #[test]
    fn test_strip_html_noise() {
        let html = r#"<html><head><style>body{}</style><script>alert(1)</script></head>
<body><nav>menu</nav><!-- hidden --><h1>Title</h1><p>Body</p><footer>foot</footer></body></html>"#;
        let cleaned = strip_html_noise(html);
        assert!(!cleaned.contains("alert"));
        assert!(!cleaned.contains("menu"));
        assert!(!cleaned.contains("hidden"));
        assert!(!cleaned.contains("foot"));
        assert!(cleaned.contains("<h1>Title</h1>"));
    }

    #[test]
    fn test_strip_html_noise_survives_unclosed_nav_on_large_page() {
        let mut html = String::from("<html><body><nav class=x><h1>Title</h1>");
        html.push_str(&"<p>content</p>\n".repeat(200_000));
        html.push_str("<script>alert(1)</script></body></html>");
        assert!(html.len() > 1_000_000);

        let cleaned = strip_html_noise(&html);
        assert!(cleaned.contains("<h1>Title</h1>"));
        assert!(!cleaned.contains("alert(1)"));
    }

    #[test]
    fn test_max_length_counts_bytes() {
        let schema = FetchUrlTool::new().schema();
        assert!(schema["properties"]["max_length"]["description"]
            .as_str()
            .unwrap()
            .contains("bytes"));

        let out = truncate_output("é".repeat(10), 10);
        assert!(out.starts_with(&"é".repeat(5)));
        assert!(out.contains("10 of 20 bytes shown"));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let body = "just text".to_string();
        assert_eq!(to_markdown("text/plain", body.clone()), body);
    }

    #[test]
    fn test_html_detection() {
        assert!(is_html("text/html; charset=utf-8", ""));
        assert!(is_html("unknown", "  <!DOCTYPE html><html></html>"));
        assert!(!is_html("application/json", "{}"));
    }
}
