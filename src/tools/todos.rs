//! Todo list planning tool

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use super::{names, Tool, ToolContext, ToolResult};
use crate::backend::{SessionState, Todo};

/// Replaces the session's todo list
pub struct WriteTodosTool;

/// Todo list bound to one session.
///
/// The list lives in the session state next to the files, so hosts can show
/// it alongside them.
pub struct TodoList {
    state: Arc<RwLock<SessionState>>,
}

impl TodoList {
    pub fn new(state: Arc<RwLock<SessionState>>) -> Self {
        Self { state }
    }

    pub async fn replace(&self, todos: Vec<Todo>) {
        self.state.write().await.todos = todos;
    }

    pub async fn snapshot(&self) -> Vec<Todo> {
        self.state.read().await.todos.clone()
    }
}

#[derive(Debug, Deserialize)]
struct WriteTodosParams {
    todos: Vec<Todo>,
}

fn render(todos: &[Todo]) -> String {
    serde_json::to_string(todos).unwrap_or_default()
}

#[async_trait]
impl Tool for WriteTodosTool {
    fn name(&self) -> &'static str {
        names::WRITE_TODOS
    }

    fn description(&self) -> &'static str {
        "Create or update the todo list for the current task. Send the full list every time; \
         keep exactly one item in_progress while working."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            }
                        },
                        "required": ["content", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params: WriteTodosParams = serde_json::from_value(params)?;
        let Some(list) = ctx.todos.as_ref() else {
            return Ok(ToolResult::error("Todo list is not available in this context"));
        };
        let summary = render(&params.todos);
        list.replace(params.todos).await;
        Ok(ToolResult::success(format!("Updated todo list to {}", summary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Runtime, StateBackend, TodoStatus};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_write_todos_replaces_list() {
        let runtime = Runtime::with_thread_id("todos");
        let ctx = ToolContext::new(Arc::new(StateBackend::new(&runtime)))
            .with_todos(Arc::new(TodoList::new(runtime.state.clone())));

        let result = WriteTodosTool
            .execute(
                json!({ "todos": [
                    { "content": "Scaffold App.tsx", "status": "in_progress" },
                    { "content": "Add hero section", "status": "pending" }
                ]}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!result.is_error);

        let todos = runtime.state.read().await.todos.clone();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0].status, TodoStatus::InProgress);
        assert_eq!(todos[1].content, "Add hero section");
    }

    #[tokio::test]
    async fn test_rejects_unknown_status() {
        let runtime = Runtime::with_thread_id("todos");
        let ctx = ToolContext::new(Arc::new(StateBackend::new(&runtime)))
            .with_todos(Arc::new(TodoList::new(runtime.state.clone())));

        let result = WriteTodosTool
            .execute(json!({ "todos": [{ "content": "x", "status": "blocked" }] }), &ctx)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_todo_list() {
        let runtime = Runtime::with_thread_id("todos");
        let ctx = ToolContext::new(Arc::new(StateBackend::new(&runtime)));
        let result = WriteTodosTool.execute(json!({ "todos": [] }), &ctx).await.unwrap();
        assert!(result.is_error);
    }
}
