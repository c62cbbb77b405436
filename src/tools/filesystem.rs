//! Session filesystem tools
//!
//! These operate on the session backend, never on the host filesystem.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{names, Tool, ToolContext, ToolResult};
use crate::error::BackendError;

const DEFAULT_READ_LIMIT: usize = 2000;

fn backend_error(e: BackendError) -> ToolResult {
    ToolResult::error(format!("Error: {}", e))
}

/// List files in a session directory
pub struct LsTool;

#[derive(Debug, Deserialize)]
struct LsParams {
    #[serde(default = "root")]
    path: String,
}

fn root() -> String {
    "/".to_string()
}

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &'static str {
        names::LS
    }

    fn description(&self) -> &'static str {
        "List files and directories at an absolute path (default: /)."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute directory path, e.g. / or /components"
                }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params: LsParams = serde_json::from_value(params)?;
        match ctx.backend.ls(&params.path).await {
            Ok(entries) if entries.is_empty() => {
                Ok(ToolResult::success(format!("No files found in {}", params.path)))
            }
            Ok(entries) => {
                let listing: Vec<String> = entries.into_iter().map(|e| e.path).collect();
                Ok(ToolResult::success(listing.join("\n")))
            }
            Err(e) => Ok(backend_error(e)),
        }
    }
}

/// Read a session file with line numbers
pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
struct ReadFileParams {
    file_path: String,
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_READ_LIMIT
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        names::READ_FILE
    }

    fn description(&self) -> &'static str {
        "Read a file. Output is line-numbered. Use offset (0-indexed line) and limit for large files."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path of the file to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line to start reading from, 0-indexed (default: 0)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read (default: 2000)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params: ReadFileParams = serde_json::from_value(params)?;
        match ctx
            .backend
            .read(&params.file_path, params.offset, params.limit)
            .await
        {
            Ok(content) => Ok(ToolResult::success(content)),
            Err(e) => Ok(backend_error(e)),
        }
    }
}

/// Create a new session file
pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
struct WriteFileParams {
    file_path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        names::WRITE_FILE
    }

    fn description(&self) -> &'static str {
        "Create a new file. Fails if the file already exists; use edit_file to change existing files."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path of the file to create"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params: WriteFileParams = serde_json::from_value(params)?;
        match ctx.backend.write(&params.file_path, &params.content).await {
            Ok(()) => Ok(ToolResult::success(format!(
                "Updated file {}",
                params.file_path
            ))),
            Err(e) => Ok(backend_error(e)),
        }
    }
}

/// Exact string replacement in a session file
pub struct EditFileTool;

#[derive(Debug, Deserialize)]
struct EditFileParams {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        names::EDIT_FILE
    }

    fn description(&self) -> &'static str {
        "Replace an exact string in a file. old_string must match exactly once unless replace_all is true."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path of the file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace, including whitespace and indentation"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default: false)"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params: EditFileParams = serde_json::from_value(params)?;
        match ctx
            .backend
            .edit(
                &params.file_path,
                &params.old_string,
                &params.new_string,
                params.replace_all,
            )
            .await
        {
            Ok(count) => Ok(ToolResult::success(format!(
                "Successfully replaced {} instance(s) of the string in '{}'",
                count, params.file_path
            ))),
            Err(e) => Ok(backend_error(e)),
        }
    }
}

/// Literal text search across session files
pub struct GrepTool;

#[derive(Debug, Deserialize)]
struct GrepParams {
    pattern: String,
    path: Option<String>,
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        names::GREP
    }

    fn description(&self) -> &'static str {
        "Search file contents for a literal string. Returns path:line: text for each match."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Literal text to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Limit the search to this directory or file"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let params: GrepParams = serde_json::from_value(params)?;
        match ctx
            .backend
            .grep(&params.pattern, params.path.as_deref())
            .await
        {
            Ok(matches) if matches.is_empty() => Ok(ToolResult::success(format!(
                "No matches found for '{}'",
                params.pattern
            ))),
            Ok(matches) => {
                let lines: Vec<String> = matches
                    .into_iter()
                    .map(|m| format!("{}:{}: {}", m.path, m.line, m.text))
                    .collect();
                Ok(ToolResult::success(lines.join("\n")))
            }
            Err(e) => Ok(backend_error(e)),
        }
    }
}
