//! Agent loop for handling conversations with tool execution
//!
//! The loop alternates between streaming a model response and running the
//! tool calls that response asked for, until the model answers without
//! calling any tools.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use genai::chat::{
    ChatMessage, ChatRequest, ChatRole, ContentPart, MessageContent, Thinking, Tool,
    ToolCall as GenaiToolCall, ToolResponse,
};
use tracing::{debug, error, info, warn};

use super::client::{ChatModel, ModelEvent, ModelStream};
use crate::config::AgentRuntimeConfig;
use crate::tools::{ToolContext, ToolRegistry, ToolResult};

/// Token usage tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Cumulative output tokens across the session
    pub output_tokens: u32,
    /// Current context window size (total input tokens for last request)
    pub context_tokens: u32,
    /// Cache creation tokens in last request
    pub cache_creation_tokens: u32,
    /// Cache read tokens in last request
    pub cache_read_tokens: u32,
}

impl Usage {
    /// Format usage information for logging
    pub fn format_log(&self) -> String {
        let mut details = format!("Context: {} tokens", self.context_tokens);
        if self.cache_read_tokens > 0 || self.cache_creation_tokens > 0 {
            details.push_str(&format!(
                " (cached: {}, new: {})",
                self.cache_read_tokens, self.cache_creation_tokens
            ));
        }
        details.push_str(&format!(", output: {}", self.output_tokens));
        details
    }

    /// Usage for a single request, from genai's report
    fn from_turn(genai_usage: &genai::chat::Usage) -> Self {
        let input_tokens = genai_usage.prompt_tokens.unwrap_or(0) as u32;
        let output_tokens = genai_usage.completion_tokens.unwrap_or(0) as u32;
        let (cache_creation_tokens, cache_read_tokens) = genai_usage
            .prompt_tokens_details
            .as_ref()
            .map(|d| {
                (
                    d.cache_creation_tokens.unwrap_or(0) as u32,
                    d.cached_tokens.unwrap_or(0) as u32,
                )
            })
            .unwrap_or((0, 0));

        Self {
            output_tokens,
            context_tokens: input_tokens + cache_creation_tokens + cache_read_tokens,
            cache_creation_tokens,
            cache_read_tokens,
        }
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.output_tokens += other.output_tokens;
        // Context figures describe the latest request, not a running total
        self.context_tokens = other.context_tokens;
        self.cache_creation_tokens = other.cache_creation_tokens;
        self.cache_read_tokens = other.cache_read_tokens;
    }
}

/// Steps yielded by the agent during processing
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    /// Streaming text chunk
    TextDelta(String),
    /// Streaming thinking/reasoning chunk
    ThinkingDelta(String),
    /// A tool call is about to run
    ToolStarted {
        call_id: String,
        name: String,
        params: serde_json::Value,
    },
    /// A tool call completed
    ToolFinished {
        call_id: String,
        name: String,
        result: ToolResult,
    },
    /// Retrying after error
    Retrying { attempt: u32, error: String },
    /// Agent finished processing this message
    Finished { usage: Usage },
    /// Error occurred; the request is abandoned
    Error(String),
}

enum StreamState {
    NeedsChatRequest,
    Streaming,
    /// Response complete; running its tool calls one at a time
    ExecutingTools,
}

/// Agent for handling conversations
pub struct Agent {
    model: Arc<dyn ChatModel>,
    config: AgentRuntimeConfig,
    tools: ToolRegistry,
    ctx: ToolContext,
    messages: Vec<ChatMessage>,
    total_usage: Usage,

    state: Option<StreamState>,
    active_stream: Option<ModelStream>,
    attempt: u32,

    // Accumulated during streaming, consumed when tools complete
    streaming_text: String,
    streaming_tool_calls: Vec<GenaiToolCall>,
    streaming_thinking: Vec<Thinking>,
    pending_tools: VecDeque<GenaiToolCall>,
    tool_responses: Vec<ToolResponse>,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        config: AgentRuntimeConfig,
        system_prompt: &str,
        tools: ToolRegistry,
        ctx: ToolContext,
    ) -> Self {
        Self {
            model,
            config,
            tools,
            ctx,
            messages: vec![ChatMessage::system(system_prompt)],
            total_usage: Usage::default(),

            state: None,
            active_stream: None,
            attempt: 0,

            streaming_text: String::new(),
            streaming_tool_calls: Vec::new(),
            streaming_thinking: Vec::new(),
            pending_tools: VecDeque::new(),
            tool_responses: Vec::new(),
        }
    }

    /// Tool definitions in genai format
    fn get_tools(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|tool| {
                Tool::new(tool.name())
                    .with_description(tool.description())
                    .with_schema(tool.schema())
            })
            .collect()
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.names()
    }

    /// Send a user message to the agent.
    /// Call next() repeatedly to get AgentSteps until None.
    pub fn send_request(&mut self, user_input: &str) {
        self.messages.push(ChatMessage::user(user_input));
        self.attempt = 0;
        self.state = Some(StreamState::NeedsChatRequest);
    }

    /// Cancel the current streaming operation
    pub fn cancel(&mut self) {
        debug!("Agent::cancel");
        self.state = None;
        self.active_stream = None;
        self.pending_tools.clear();
    }

    pub fn total_usage(&self) -> Usage {
        self.total_usage
    }

    /// Send one message and drive the loop to completion, returning the
    /// text of the final response
    pub async fn run(&mut self, user_input: &str) -> Result<String> {
        self.send_request(user_input);
        let mut text = String::new();
        while let Some(step) = self.next().await {
            match step {
                AgentStep::TextDelta(delta) => text.push_str(&delta),
                // Only the last response's text is the answer
                AgentStep::ToolStarted { .. } => text.clear(),
                AgentStep::Error(e) => anyhow::bail!(e),
                _ => {}
            }
        }
        Ok(text)
    }

    fn backoff(&self) -> Duration {
        let exp = self.attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.config.retry_base_delay_ms.saturating_mul(1 << exp))
    }

    async fn exec_chat(&mut self) -> Result<ModelStream, AgentStep> {
        if self.attempt > 0 {
            tokio::time::sleep(self.backoff()).await;
        }

        let request = ChatRequest::new(self.messages.clone()).with_tools(self.get_tools());
        match self.model.stream_chat(request).await {
            Ok(stream) => {
                info!("Chat request successful ({})", self.model.model_name());
                self.attempt = 0;
                Ok(stream)
            }
            Err(e) => {
                let err = format!("{:#}", e);
                error!("Chat request failed: {}", err);
                self.attempt += 1;
                if self.attempt > self.config.max_retries {
                    return Err(AgentStep::Error(format!(
                        "API error ({}): {}",
                        self.model.model_name(),
                        err
                    )));
                }
                Err(AgentStep::Retrying {
                    attempt: self.attempt,
                    error: err,
                })
            }
        }
    }

    /// Get the next step from the agent.
    /// Returns None when the current message has been fully processed.
    pub async fn next(&mut self) -> Option<AgentStep> {
        loop {
            match self.state.as_ref()? {
                StreamState::NeedsChatRequest => {
                    self.streaming_text.clear();
                    self.streaming_tool_calls.clear();
                    self.streaming_thinking.clear();
                    self.tool_responses.clear();

                    match self.exec_chat().await {
                        Ok(stream) => {
                            self.active_stream = Some(stream);
                            self.state = Some(StreamState::Streaming);
                        }
                        Err(step) => {
                            if !matches!(step, AgentStep::Retrying { .. }) {
                                self.state = None;
                            }
                            return Some(step);
                        }
                    }
                }

                StreamState::Streaming => {
                    let stream = self.active_stream.as_mut()?;

                    match stream.next().await {
                        Some(Ok(ModelEvent::Text(chunk))) => {
                            self.streaming_text.push_str(&chunk);
                            return Some(AgentStep::TextDelta(chunk));
                        }
                        Some(Ok(ModelEvent::Reasoning(chunk))) => {
                            return Some(AgentStep::ThinkingDelta(chunk));
                        }
                        Some(Ok(ModelEvent::End {
                            usage,
                            thinking,
                            tool_calls,
                        })) => {
                            if let Some(ref genai_usage) = usage {
                                let turn_usage = Usage::from_turn(genai_usage);
                                self.total_usage += turn_usage;
                                info!("{}", turn_usage.format_log());
                            }
                            self.streaming_thinking = thinking;
                            self.streaming_tool_calls = tool_calls;
                        }
                        Some(Err(e)) => {
                            error!("Stream error: {:#}", e);
                            self.state = None;
                            self.active_stream = None;
                            return Some(AgentStep::Error(format!("Stream error: {:#}", e)));
                        }
                        None => {
                            self.active_stream = None;

                            if self.streaming_tool_calls.is_empty() {
                                self.push_assistant_message();
                                debug!("Agent finished, messages={}", self.messages.len());
                                self.state = None;
                                return Some(AgentStep::Finished {
                                    usage: self.total_usage,
                                });
                            }

                            self.pending_tools = self.streaming_tool_calls.clone().into();
                            self.state = Some(StreamState::ExecutingTools);
                        }
                    }
                }

                StreamState::ExecutingTools => {
                    let Some(call) = self.pending_tools.pop_front() else {
                        self.push_assistant_message();
                        for response in std::mem::take(&mut self.tool_responses) {
                            self.messages.push(ChatMessage::from(response));
                        }
                        self.state = Some(StreamState::NeedsChatRequest);
                        continue;
                    };
                    if self.tool_responses.iter().all(|r| r.call_id != call.call_id) {
                        // Announce first; the call runs on the following poll
                        self.pending_tools.push_front(call.clone());
                        self.tool_responses.push(ToolResponse::new(call.call_id.clone(), ""));
                        return Some(AgentStep::ToolStarted {
                            call_id: call.call_id,
                            name: call.fn_name,
                            params: call.fn_arguments,
                        });
                    }

                    let result = execute_tool(&self.tools, &self.ctx, &call).await;
                    if let Some(response) = self
                        .tool_responses
                        .iter_mut()
                        .find(|r| r.call_id == call.call_id)
                    {
                        response.content = result.content.clone();
                    }
                    return Some(AgentStep::ToolFinished {
                        call_id: call.call_id,
                        name: call.fn_name,
                        result,
                    });
                }
            }
        }
    }

    /// Record the streamed response as an assistant message.
    /// Thinking blocks come first, then text, then tool calls.
    fn push_assistant_message(&mut self) {
        let mut content = MessageContent::default();
        for thinking in &self.streaming_thinking {
            content = content.append(ContentPart::Thinking(thinking.clone()));
        }
        if !self.streaming_text.is_empty() {
            content = content.append(ContentPart::Text(self.streaming_text.clone()));
        }
        for tc in &self.streaming_tool_calls {
            content = content.append(ContentPart::ToolCall(tc.clone()));
        }

        if content.is_empty() {
            debug!("Agent: no content to push");
            return;
        }
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content,
            options: None,
        });
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Run one tool call. Failures become error results for the model to see.
async fn execute_tool(tools: &ToolRegistry, ctx: &ToolContext, call: &GenaiToolCall) -> ToolResult {
    let Some(tool) = tools.get(&call.fn_name) else {
        warn!("Model requested unknown tool: {}", call.fn_name);
        return ToolResult::error(format!("Error: unknown tool '{}'", call.fn_name));
    };

    debug!("Executing tool {} ({})", call.fn_name, call.call_id);
    match tool.execute(call.fn_arguments.clone(), ctx).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Tool {} failed: {:#}", call.fn_name, e);
            ToolResult::error(format!("Error: {:#}", e))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;

    use super::*;

    /// One scripted model response
    pub enum Scripted {
        Reply(Vec<ModelEvent>),
        Fail(&'static str),
    }

    pub fn text(content: &str) -> Scripted {
        Scripted::Reply(vec![
            ModelEvent::Text(content.to_string()),
            end(Vec::new()),
        ])
    }

    pub fn tool_call(call_id: &str, name: &str, params: serde_json::Value) -> Scripted {
        Scripted::Reply(vec![end(vec![GenaiToolCall {
            call_id: call_id.to_string(),
            fn_name: name.to_string(),
            fn_arguments: params,
        }])])
    }

    fn end(tool_calls: Vec<GenaiToolCall>) -> ModelEvent {
        ModelEvent::End {
            usage: None,
            thinking: Vec::new(),
            tool_calls,
        }
    }

    /// Chat model replaying a fixed script and recording every request
    pub struct ScriptedModel {
        script: Mutex<VecDeque<Scripted>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        pub fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn max_tokens(&self) -> u32 {
            1_000
        }

        async fn stream_chat(&self, request: ChatRequest) -> Result<ModelStream> {
            self.requests.lock().unwrap().push(request);
            match self.script.lock().unwrap().pop_front() {
                Some(Scripted::Reply(events)) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
                Some(Scripted::Fail(msg)) => Err(anyhow::anyhow!(msg)),
                None => Err(anyhow::anyhow!("script exhausted")),
            }
        }
    }
}
