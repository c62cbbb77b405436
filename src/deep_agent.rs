//! Agent-builder framework
//!
//! [`create_deep_agent`] takes a model, a prompt, tools, middleware, a backend
//! factory and subagents, and returns a [`DeepAgent`]. Building does no I/O;
//! each [`DeepAgent::start_session`] creates a fresh runtime with its own
//! files and todo list.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::backend::{Backend, BackendFactory, FileData, FileKind, Runtime, Todo};
use crate::config::AgentRuntimeConfig;
use crate::llm::{Agent, AgentStep, ChatModel, Usage};
use crate::middleware::{apply_system_prompt, Middleware, SkillsMiddleware};
use crate::prompts::{task_prompt, FRAMEWORK_PROMPT};
use crate::subagents::SubAgentSpec;
use crate::tools::{TaskTool, Tool, ToolContext, ToolRegistry};

/// Everything needed to build an agent
#[derive(Clone)]
pub struct AgentSpec {
    pub model: Arc<dyn ChatModel>,
    pub system_prompt: String,
    /// Tools on top of the built-in filesystem and planning tools
    pub tools: Vec<Arc<dyn Tool>>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub backend: BackendFactory,
    pub subagents: Vec<SubAgentSpec>,
    pub runtime: AgentRuntimeConfig,
}

/// Build an agent from its parts. No validation, no I/O.
pub fn create_deep_agent(spec: AgentSpec) -> DeepAgent {
    debug!(
        "create_deep_agent: model={}, tools={}, middleware={}, subagents={}",
        spec.model.model_name(),
        spec.tools.len(),
        spec.middleware.len(),
        spec.subagents.len()
    );
    DeepAgent { spec }
}

/// A configured agent. Cheap to clone; sessions are independent.
#[derive(Clone)]
pub struct DeepAgent {
    spec: AgentSpec,
}

impl DeepAgent {
    pub fn model_name(&self) -> &str {
        self.spec.model.model_name()
    }

    pub fn max_tokens(&self) -> u32 {
        self.spec.model.max_tokens()
    }

    pub fn system_prompt(&self) -> &str {
        &self.spec.system_prompt
    }

    /// Names of the tools passed in at build time, in order
    pub fn tool_names(&self) -> Vec<&'static str> {
        self.spec.tools.iter().map(|t| t.name()).collect()
    }

    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.spec.middleware.iter().map(|m| m.name()).collect()
    }

    /// Skills auto-injected by any skills middleware, in middleware order
    pub fn skills_auto_inject(&self) -> Vec<String> {
        self.spec
            .middleware
            .iter()
            .filter_map(|m| m.as_any().downcast_ref::<SkillsMiddleware>())
            .flat_map(|skills| skills.auto_inject_skills().iter().cloned())
            .collect()
    }

    pub fn subagents(&self) -> &[SubAgentSpec] {
        &self.spec.subagents
    }

    pub fn runtime_config(&self) -> &AgentRuntimeConfig {
        &self.spec.runtime
    }

    /// Start a session with a fresh runtime
    pub fn start_session(&self) -> Session {
        self.start_session_with(Runtime::new())
    }

    pub fn start_session_with(&self, runtime: Runtime) -> Session {
        let spec = &self.spec;
        let backend = (spec.backend)(&runtime);
        let ctx = ToolContext::for_runtime(&runtime, backend.clone());

        let mut tools: ToolRegistry = ToolRegistry::builtin().into_iter().collect();
        tools.extend(spec.tools.iter().cloned());
        for middleware in &spec.middleware {
            tools.extend(middleware.tools());
        }

        let prompt = apply_system_prompt(
            &spec.middleware,
            format!("{}\n\n{}", spec.system_prompt.trim_end(), FRAMEWORK_PROMPT),
        );

        let task = TaskTool::new(
            spec.model.clone(),
            spec.runtime.clone(),
            &prompt,
            &tools,
            &spec.subagents,
        );
        let prompt = format!("{}\n\n{}", prompt.trim_end(), task_prompt(&task.subagents()));
        tools.register(Arc::new(task));

        info!(
            "Session {} started with {} tools",
            runtime.thread_id,
            tools.len()
        );
        let agent = Agent::new(
            spec.model.clone(),
            spec.runtime.clone(),
            &prompt,
            tools,
            ctx,
        );

        Session {
            runtime,
            backend,
            system_prompt: prompt,
            agent,
        }
    }
}

/// One conversation with its own files and todo list
pub struct Session {
    runtime: Runtime,
    backend: Arc<dyn Backend>,
    system_prompt: String,
    agent: Agent,
}

impl Session {
    pub fn thread_id(&self) -> &str {
        &self.runtime.thread_id
    }

    /// Final system prompt, after framework instructions and middleware
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.agent.tool_names()
    }

    /// Queue a user message; poll [`Session::next`] for the response
    pub fn send(&mut self, input: &str) {
        self.agent.send_request(input);
    }

    pub async fn next(&mut self) -> Option<AgentStep> {
        self.agent.next().await
    }

    /// Send a message and wait for the final answer
    pub async fn run(&mut self, input: &str) -> Result<String> {
        self.agent.run(input).await
    }

    pub fn cancel(&mut self) {
        self.agent.cancel();
    }

    pub fn usage(&self) -> Usage {
        self.agent.total_usage()
    }

    /// Every stored file with its display category, sorted by path
    pub async fn files(&self) -> Vec<(String, FileKind)> {
        self.backend
            .files()
            .await
            .into_keys()
            .map(|path| {
                let kind = FileKind::classify(&path);
                (path, kind)
            })
            .collect()
    }

    /// Full contents of every stored file
    pub async fn file_contents(&self) -> BTreeMap<String, FileData> {
        self.backend.files().await
    }

    pub async fn todos(&self) -> Vec<Todo> {
        self.runtime.state.read().await.todos.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{StateBackend, TodoStatus};
    use crate::llm::test_support::{text, tool_call, ScriptedModel};
    use crate::subagents::default_subagents;
    use crate::tools::{names, ToolRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec(model: Arc<ScriptedModel>) -> AgentSpec {
        AgentSpec {
            model,
            system_prompt: "You build landing pages.".to_string(),
            tools: ToolRegistry::web(&std::collections::HashMap::<String, String>::new()),
            middleware: vec![Arc::new(SkillsMiddleware::with_user_dir(
                "/definitely/not/here",
                "frontend-agent",
                vec!["frontend-design".to_string()],
                None,
            ))],
            backend: StateBackend::factory(),
            subagents: default_subagents(),
            runtime: AgentRuntimeConfig {
                max_retries: 0,
                retry_base_delay_ms: 1,
            },
        }
    }

    #[test]
    fn test_accessors() {
        let agent = create_deep_agent(spec(ScriptedModel::new(Vec::new())));
        assert_eq!(agent.model_name(), "scripted");
        assert_eq!(agent.max_tokens(), 1_000);
        assert_eq!(
            agent.tool_names(),
            vec![names::HTTP_REQUEST, names::WEB_SEARCH, names::FETCH_URL]
        );
        assert_eq!(agent.middleware_names(), vec!["skills"]);
        assert_eq!(agent.skills_auto_inject(), vec!["frontend-design".to_string()]);
        assert_eq!(agent.subagents().len(), 2);
    }

    #[test]
    fn test_session_tools_and_prompt() {
        let agent = create_deep_agent(spec(ScriptedModel::new(Vec::new())));
        let session = agent.start_session();

        assert_eq!(
            session.tool_names(),
            vec![
                names::LS,
                names::READ_FILE,
                names::WRITE_FILE,
                names::EDIT_FILE,
                names::GREP,
                names::WRITE_TODOS,
                names::HTTP_REQUEST,
                names::WEB_SEARCH,
                names::FETCH_URL,
                names::READ_SKILL,
                names::TASK,
            ]
        );

        let prompt = session.system_prompt();
        assert!(prompt.starts_with("You build landing pages.\n\n## Working files"));
        assert!(prompt.contains("- `general-purpose`: "));
        assert!(prompt.contains("- `research-agent`: "));
        assert!(prompt.contains("- `code-reviewer`: "));
    }

    #[tokio::test]
    async fn test_session_files_and_todos() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "call_1",
                names::WRITE_FILE,
                json!({ "file_path": "/App.tsx", "content": "export default () => null;" }),
            ),
            tool_call(
                "call_2",
                names::WRITE_FILE,
                json!({ "file_path": "/memory/design.md", "content": "Dark theme" }),
            ),
            tool_call(
                "call_3",
                names::WRITE_TODOS,
                json!({ "todos": [{ "content": "Build hero", "status": "completed" }] }),
            ),
            text("Built it."),
        ]);
        let agent = create_deep_agent(spec(model));
        let mut session = agent.start_session();

        let answer = session.run("Build a landing page").await.unwrap();
        assert_eq!(answer, "Built it.");
        assert_eq!(
            session.files().await,
            vec![
                ("/App.tsx".to_string(), FileKind::Artifact),
                ("/memory/design.md".to_string(), FileKind::Memory),
            ]
        );
        let todos = session.todos().await;
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].status, TodoStatus::Completed);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let model = ScriptedModel::new(vec![
            tool_call(
                "call_1",
                names::WRITE_FILE,
                json!({ "file_path": "/App.tsx", "content": "" }),
            ),
            text("done"),
        ]);
        let agent = create_deep_agent(spec(model));
        let mut first = agent.start_session();
        let second = agent.start_session();

        first.run("go").await.unwrap();
        assert_eq!(first.files().await.len(), 1);
        assert!(second.files().await.is_empty());
        assert_ne!(first.thread_id(), second.thread_id());
    }

    #[tokio::test]
    async fn test_step_stream() {
        let agent = create_deep_agent(spec(ScriptedModel::new(vec![text("Hi")])));
        let mut session = agent.start_session();

        session.send("hello");
        let mut steps = Vec::new();
        while let Some(step) = session.next().await {
            steps.push(step);
        }
        assert_eq!(steps[0], AgentStep::TextDelta("Hi".to_string()));
        assert!(matches!(steps[1], AgentStep::Finished { .. }));
    }
}
