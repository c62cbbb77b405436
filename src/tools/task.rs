//! Subagent delegation tool

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{names, Tool, ToolContext, ToolRegistry, ToolResult};
use crate::config::AgentRuntimeConfig;
use crate::llm::{Agent, ChatModel};
use crate::prompts::{FRAMEWORK_PROMPT, GENERAL_PURPOSE_DESCRIPTION};
use crate::subagents::{SubAgentSpec, GENERAL_PURPOSE};

/// A subagent ready to run: its prompt and the tools it may use
struct Delegate {
    name: String,
    description: String,
    system_prompt: String,
    tools: ToolRegistry,
}

/// Runs a job in a fresh subagent and returns its final answer.
///
/// Subagents share the caller's session files but not its conversation, and
/// never get `task` themselves.
pub struct TaskTool {
    model: Arc<dyn ChatModel>,
    config: AgentRuntimeConfig,
    delegates: Vec<Delegate>,
}

impl TaskTool {
    /// `tools` is the main agent's registry without `task`; subagents with a
    /// tool list get the matching subset of it.
    pub fn new(
        model: Arc<dyn ChatModel>,
        config: AgentRuntimeConfig,
        main_prompt: &str,
        tools: &ToolRegistry,
        subagents: &[SubAgentSpec],
    ) -> Self {
        let mut delegates = vec![Delegate {
            name: GENERAL_PURPOSE.to_string(),
            description: GENERAL_PURPOSE_DESCRIPTION.to_string(),
            system_prompt: main_prompt.to_string(),
            tools: tools.clone(),
        }];

        for spec in subagents {
            let delegate = Delegate {
                name: spec.name.clone(),
                description: spec.description.clone(),
                system_prompt: format!("{}\n\n{}", spec.system_prompt, FRAMEWORK_PROMPT),
                tools: match &spec.tools {
                    Some(names) => tools.subset(names),
                    None => tools.clone(),
                },
            };
            // A spec may redefine general-purpose
            match delegates.iter().position(|d| d.name == delegate.name) {
                Some(i) => delegates[i] = delegate,
                None => delegates.push(delegate),
            }
        }

        Self {
            model,
            config,
            delegates,
        }
    }

    /// `(name, description)` of every subagent, general-purpose first
    pub fn subagents(&self) -> Vec<(String, String)> {
        self.delegates
            .iter()
            .map(|d| (d.name.clone(), d.description.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TaskParams {
    description: String,
    subagent_type: String,
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &'static str {
        names::TASK
    }

    fn description(&self) -> &'static str {
        "Launch a subagent to handle a self-contained job. The subagent works on the same \
         files, cannot see this conversation, and returns a single final report."
    }

    fn schema(&self) -> serde_json::Value {
        let types: Vec<&str> = self.delegates.iter().map(|d| d.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "Full description of the job, including what to report back"
                },
                "subagent_type": {
                    "type": "string",
                    "enum": types,
                    "description": "Which subagent to use"
                }
            },
            "required": ["description", "subagent_type"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params: TaskParams = serde_json::from_value(params)?;
        let Some(delegate) = self
            .delegates
            .iter()
            .find(|d| d.name == params.subagent_type)
        else {
            let available: Vec<&str> = self.delegates.iter().map(|d| d.name.as_str()).collect();
            return Ok(ToolResult::error(format!(
                "Unknown subagent type '{}'. Available: {}",
                params.subagent_type,
                available.join(", ")
            )));
        };

        info!("Delegating task to {}", delegate.name);
        let mut agent = Agent::new(
            self.model.clone(),
            self.config.clone(),
            &delegate.system_prompt,
            delegate.tools.clone(),
            ctx.clone(),
        );
        match agent.run(&params.description).await {
            Ok(answer) => Ok(ToolResult::success(answer)),
            Err(e) => Ok(ToolResult::error(format!(
                "Subagent {} failed: {:#}",
                delegate.name, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{text, tool_call, ScriptedModel};
    use crate::tools::test_support::context;
    use crate::tools::{LsTool, ReadFileTool, WriteFileTool};
    use pretty_assertions::assert_eq;

    fn config() -> AgentRuntimeConfig {
        AgentRuntimeConfig {
            max_retries: 0,
            retry_base_delay_ms: 1,
        }
    }

    fn registry() -> ToolRegistry {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(LsTool),
            Arc::new(ReadFileTool),
            Arc::new(WriteFileTool),
        ];
        tools.into_iter().collect()
    }

    fn reviewer() -> SubAgentSpec {
        SubAgentSpec::new("code-reviewer", "Reviews code", "Review it.")
            .with_tools(&[names::READ_FILE])
    }

    #[test]
    fn test_general_purpose_always_present() {
        let model = ScriptedModel::new(Vec::new());
        let tool = TaskTool::new(model, config(), "main", &registry(), &[reviewer()]);
        let names: Vec<String> = tool.subagents().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["general-purpose", "code-reviewer"]);
        assert_eq!(tool.delegates[1].tools.names(), vec![names::READ_FILE]);
        assert_eq!(tool.delegates[0].tools.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_subagent() {
        let model = ScriptedModel::new(Vec::new());
        let tool = TaskTool::new(model, config(), "main", &registry(), &[]);
        let result = tool
            .execute(
                json!({ "description": "x", "subagent_type": "designer" }),
                &context(),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Available: general-purpose"));
    }

    #[tokio::test]
    async fn test_subagent_shares_files() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "call_1",
                names::WRITE_FILE,
                json!({ "file_path": "/memory/research.md", "content": "Use Vite" }),
            ),
            text("Wrote findings to /memory/research.md"),
        ]);
        let tool = TaskTool::new(model.clone(), config(), "main", &registry(), &[]);
        let ctx = context();

        let result = tool
            .execute(
                json!({ "description": "Research bundlers", "subagent_type": "general-purpose" }),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result, ToolResult::success("Wrote findings to /memory/research.md"));
        assert!(ctx.backend.files().await.contains_key("/memory/research.md"));
    }

    #[tokio::test]
    async fn test_subagent_failure_is_tool_error() {
        let model = ScriptedModel::new(Vec::new());
        let tool = TaskTool::new(model, config(), "main", &registry(), &[reviewer()]);
        let result = tool
            .execute(
                json!({ "description": "review", "subagent_type": "code-reviewer" }),
                &context(),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.starts_with("Subagent code-reviewer failed"));
    }
}
