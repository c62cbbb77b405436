//! Chat model clients
//!
//! Both provider routes produce a [`ModelClient`], which implements the
//! [`ChatModel`] capability the agent loop depends on. Clients are configured
//! with credentials only; nothing touches the network until the first request.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use genai::adapter::AdapterKind;
use genai::chat::{
    ChatOptions, ChatRequest, ChatStreamEvent, Thinking, ToolCall as GenaiToolCall,
    Usage as GenaiUsage,
};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, Headers, ModelIden, ServiceTarget};
use reqwest::header::HeaderValue;
use tracing::info;

use super::provider::ModelSelection;
use crate::config::{ANTHROPIC_API_KEY_ENV, MAX_TOKENS};
use crate::env::EnvSource;
use crate::error::ConfigError;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

pub const REFERER_HEADER: &str = "HTTP-Referer";
pub const TITLE_HEADER: &str = "X-Title";

/// Events streamed back for one chat request
#[derive(Debug, Clone)]
pub enum ModelEvent {
    Text(String),
    Reasoning(String),
    /// Final event, carrying everything captured over the stream
    End {
        usage: Option<GenaiUsage>,
        thinking: Vec<Thinking>,
        tool_calls: Vec<GenaiToolCall>,
    },
}

pub type ModelStream = BoxStream<'static, Result<ModelEvent>>;

/// Anything that can take a chat exchange (messages plus tool definitions)
/// and stream back a response
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name as sent to the provider
    fn model_name(&self) -> &str;

    /// Output token ceiling applied to every request
    fn max_tokens(&self) -> u32;

    async fn stream_chat(&self, request: ChatRequest) -> Result<ModelStream>;
}

/// genai-backed client pinned to one provider endpoint
pub struct ModelClient {
    client: Client,
    route: &'static str,
    model_name: String,
    max_tokens: u32,
    headers: Vec<(String, String)>,
    options: ChatOptions,
}

impl ModelClient {
    /// Build the client for a resolved selection.
    ///
    /// The direct route needs `ANTHROPIC_API_KEY`; its absence is a
    /// configuration error returned to the caller.
    pub fn new(selection: &ModelSelection, env: &impl EnvSource) -> Result<Self, ConfigError> {
        let model_name = selection.model_name().to_string();
        if model_name.is_empty() {
            return Err(ConfigError::EmptyModelName {
                raw: selection.model().raw.clone(),
            });
        }

        let (client, identity) = match selection {
            ModelSelection::OpenRouter {
                api_key,
                site_url,
                site_name,
                ..
            } => {
                let referer = checked_header(REFERER_HEADER, site_url)?;
                let title = checked_header(TITLE_HEADER, site_name)?;
                let client = pinned_client(
                    format!("{}/", OPENROUTER_BASE_URL),
                    AdapterKind::OpenAI,
                    api_key.clone(),
                );
                (client, Some((referer, title)))
            }
            ModelSelection::Direct { .. } => {
                let api_key =
                    env.var(ANTHROPIC_API_KEY_ENV)
                        .ok_or(ConfigError::MissingCredentials {
                            provider: "anthropic",
                            var: ANTHROPIC_API_KEY_ENV,
                        })?;
                let client = pinned_client(
                    format!("{}/", ANTHROPIC_BASE_URL),
                    AdapterKind::Anthropic,
                    api_key,
                );
                (client, None)
            }
        };

        let mut options = ChatOptions::default()
            .with_max_tokens(MAX_TOKENS)
            .with_capture_usage(true)
            .with_capture_tool_calls(true)
            .with_capture_reasoning_content(true);
        let mut headers = Vec::new();
        if let Some((referer, title)) = identity {
            options = options.with_extra_headers(Headers::from([
                (REFERER_HEADER.to_string(), referer.clone()),
                (TITLE_HEADER.to_string(), title.clone()),
            ]));
            headers.push((REFERER_HEADER.to_string(), referer));
            headers.push((TITLE_HEADER.to_string(), title));
        }

        info!(
            "Configured {} client for model {} (max_tokens={})",
            selection.route(),
            model_name,
            MAX_TOKENS
        );

        Ok(Self {
            client,
            route: selection.route(),
            model_name,
            max_tokens: MAX_TOKENS,
            headers,
            options,
        })
    }

    /// Provider route this client talks to
    pub fn route(&self) -> &'static str {
        self.route
    }

    /// Identification headers attached to every request
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

#[async_trait]
impl ChatModel for ModelClient {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<ModelStream> {
        let response = self
            .client
            .exec_chat_stream(&self.model_name, request, Some(&self.options))
            .await?;

        let events = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => Some(Ok(ModelEvent::Text(chunk.content))),
                Ok(ChatStreamEvent::ReasoningChunk(chunk)) => {
                    Some(Ok(ModelEvent::Reasoning(chunk.content)))
                }
                Ok(ChatStreamEvent::End(mut end)) => {
                    let thinking = end.captured_thinking_blocks.take().unwrap_or_default();
                    let usage = end.captured_usage.take();
                    let tool_calls = end.captured_into_tool_calls().unwrap_or_default();
                    Some(Ok(ModelEvent::End {
                        usage,
                        thinking,
                        tool_calls,
                    }))
                }
                Ok(_) => None,
                Err(e) => Some(Err(anyhow::Error::new(e))),
            }
        });
        Ok(events.boxed())
    }
}

/// A genai client whose every request goes to `endpoint` through `adapter`
fn pinned_client(endpoint: String, adapter: AdapterKind, api_key: String) -> Client {
    let resolver = ServiceTargetResolver::from_resolver_fn(
        move |service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { model, .. } = service_target;
            Ok(ServiceTarget {
                endpoint: Endpoint::from_owned(endpoint.clone()),
                auth: AuthData::from_single(api_key.clone()),
                model: ModelIden::new(adapter, model.model_name),
            })
        },
    );
    Client::builder()
        .with_service_target_resolver(resolver)
        .build()
}

fn checked_header(name: &'static str, value: &str) -> Result<String, ConfigError> {
    HeaderValue::from_str(value)
        .map(|_| value.to_string())
        .map_err(|_| ConfigError::InvalidHeader {
            name,
            value: value.to_string(),
        })
}
