//! Tool system
//!
//! Tools are named async callables with a JSON schema. The agent loop looks
//! them up in a [`ToolRegistry`] and runs them with a [`ToolContext`] that
//! points at the session backend.

mod fetch_url;
mod filesystem;
mod http_request;
mod task;
mod todos;
mod web_search;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::backend::{Backend, Runtime};
use crate::env::EnvSource;

pub use fetch_url::FetchUrlTool;
pub use filesystem::{EditFileTool, GrepTool, LsTool, ReadFileTool, WriteFileTool};
pub use http_request::HttpRequestTool;
pub use task::TaskTool;
pub use todos::{TodoList, WriteTodosTool};
pub use web_search::WebSearchTool;

/// Tool names
pub mod names {
    pub const HTTP_REQUEST: &str = "http_request";
    pub const WEB_SEARCH: &str = "web_search";
    pub const FETCH_URL: &str = "fetch_url";
    pub const LS: &str = "ls";
    pub const READ_FILE: &str = "read_file";
    pub const WRITE_FILE: &str = "write_file";
    pub const EDIT_FILE: &str = "edit_file";
    pub const GREP: &str = "grep";
    pub const WRITE_TODOS: &str = "write_todos";
    pub const TASK: &str = "task";
    pub const READ_SKILL: &str = "read_skill";
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Per-session context handed to every tool call
#[derive(Clone)]
pub struct ToolContext {
    pub backend: Arc<dyn Backend>,
    pub todos: Option<Arc<TodoList>>,
}

impl ToolContext {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            todos: None,
        }
    }

    pub fn with_todos(mut self, todos: Arc<TodoList>) -> Self {
        self.todos = Some(todos);
        self
    }

    /// Context for a session runtime, with files and todos bound to its state
    pub fn for_runtime(runtime: &Runtime, backend: Arc<dyn Backend>) -> Self {
        Self::new(backend).with_todos(Arc::new(TodoList::new(runtime.state.clone())))
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema for the tool's parameters
    fn schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult>;
}

/// Ordered registry of available tools; names are unique
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// The external web tools, in their fixed order
    pub fn web(env: &impl EnvSource) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(HttpRequestTool::new()),
            Arc::new(WebSearchTool::from_env(env)),
            Arc::new(FetchUrlTool::new()),
        ]
    }

    /// Session filesystem and planning tools every agent gets
    pub fn builtin() -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(LsTool),
            Arc::new(ReadFileTool),
            Arc::new(WriteFileTool),
            Arc::new(EditFileTool),
            Arc::new(GrepTool),
            Arc::new(WriteTodosTool),
        ]
    }

    /// Register a tool, replacing any existing tool with the same name in place
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn extend(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// A registry holding only the named tools, in `names` order
    pub fn subset(&self, names: &[String]) -> Self {
        let mut registry = Self::empty();
        for name in names {
            if let Some(tool) = self.get(name) {
                registry.register(tool.clone());
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let mut registry = Self::empty();
        registry.extend(iter);
        registry
    }
}

/// Truncate to at most `max` bytes on a char boundary, appending a notice
pub(crate) fn truncate_output(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let total = text.len();
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str(&format!("\n\n[... truncated, {} of {} bytes shown]", end, total));
    text
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::backend::StateBackend;

    pub fn context() -> ToolContext {
        let runtime = Runtime::with_thread_id("test");
        ToolContext::for_runtime(&runtime, Arc::new(StateBackend::new(&runtime)))
    }

    /// Tool that echoes its `text` param back
    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo text back"
        }

        fn schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
            let text = params["text"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("missing text"))?;
            Ok(ToolResult::success(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_web_tools_order() {
        let env: HashMap<String, String> = HashMap::new();
        let registry: ToolRegistry = ToolRegistry::web(&env).into_iter().collect();
        assert_eq!(
            registry.names(),
            vec![names::HTTP_REQUEST, names::WEB_SEARCH, names::FETCH_URL]
        );
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry: ToolRegistry = ToolRegistry::builtin().into_iter().collect();
        let before = registry.names();
        registry.register(Arc::new(ReadFileTool));
        assert_eq!(registry.names(), before);
    }

    #[test]
    fn test_subset_and_lookup() {
        let mut registry = ToolRegistry::empty();
        registry.extend(ToolRegistry::builtin());
        registry.extend(ToolRegistry::web(&HashMap::<String, String>::new()));

        let subset = registry.subset(&[
            names::WEB_SEARCH.to_string(),
            "does_not_exist".to_string(),
            names::READ_FILE.to_string(),
        ]);
        assert_eq!(subset.names(), vec![names::WEB_SEARCH, names::READ_FILE]);
        assert!(registry.get("does_not_exist").is_none());
        assert!(registry.contains(names::GREP));
    }

    #[test]
    fn test_truncate_output_char_boundary() {
        let text = "héllo wörld".to_string();
        let out = truncate_output(text.clone(), 2);
        assert!(out.starts_with('h'));
        assert!(out.contains("truncated"));
        assert_eq!(truncate_output(text.clone(), 100), text);
    }
}
