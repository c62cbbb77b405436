//! Session state backend
//!
//! Every file the agent writes lives in session memory, keyed by absolute
//! path. Nothing touches the real filesystem. Paths under `/memory/` hold the
//! agent's own notes; everything else is an app artifact (see [`FileKind`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::BackendError;

/// Prefix for agent memory files
pub const MEMORY_PREFIX: &str = "/memory/";

/// Category of a stored file, used by hosts to decide where to display it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Agent memory (`/memory/...`)
    Memory,
    /// App/code files shown in the filesystem panel and preview
    Artifact,
}

impl FileKind {
    pub fn classify(path: &str) -> Self {
        if path.starts_with(MEMORY_PREFIX) {
            Self::Memory
        } else {
            Self::Artifact
        }
    }
}

/// Stored file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    pub content: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileData {
    pub fn new(content: &str) -> Self {
        let now = Utc::now();
        Self {
            content: split_lines(content),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn text(&self) -> String {
        self.content.join("\n")
    }

    fn replace(&mut self, content: &str) {
        self.content = split_lines(content);
        self.modified_at = Utc::now();
    }
}

fn split_lines(content: &str) -> Vec<String> {
    content.split('\n').map(str::to_string).collect()
}

/// Todo item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// One entry in the agent's todo list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub content: String,
    pub status: TodoStatus,
}

/// Everything a session keeps between turns
#[derive(Debug, Default)]
pub struct SessionState {
    pub files: BTreeMap<String, FileData>,
    pub todos: Vec<Todo>,
}

/// Runtime handle for one agent session
#[derive(Debug, Clone)]
pub struct Runtime {
    pub thread_id: String,
    pub state: Arc<RwLock<SessionState>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_thread_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_thread_id(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    pub is_dir: bool,
}

/// A single grep hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepMatch {
    pub path: String,
    /// 1-indexed
    pub line: usize,
    pub text: String,
}

/// Storage for the agent's working files
#[async_trait]
pub trait Backend: Send + Sync {
    /// List the immediate children of a directory
    async fn ls(&self, path: &str) -> Result<Vec<FileInfo>, BackendError>;

    /// Read a file with line numbers, starting at 0-indexed `offset`
    async fn read(&self, path: &str, offset: usize, limit: usize) -> Result<String, BackendError>;

    /// Create a new file. Existing files are never overwritten.
    async fn write(&self, path: &str, content: &str) -> Result<(), BackendError>;

    /// Replace `old` with `new`, returning the number of replacements
    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<usize, BackendError>;

    /// Literal substring search across files under `path`
    async fn grep(&self, pattern: &str, path: Option<&str>) -> Result<Vec<GrepMatch>, BackendError>;

    /// Snapshot of every stored file
    async fn files(&self) -> BTreeMap<String, FileData>;
}

/// Constructs a backend for a session runtime
pub type BackendFactory = Arc<dyn Fn(&Runtime) -> Arc<dyn Backend> + Send + Sync>;

/// Backend keeping all files in the session state
pub struct StateBackend {
    state: Arc<RwLock<SessionState>>,
}

impl StateBackend {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            state: runtime.state.clone(),
        }
    }

    /// Factory producing a [`StateBackend`] for each session
    pub fn factory() -> BackendFactory {
        Arc::new(|runtime: &Runtime| Arc::new(StateBackend::new(runtime)) as Arc<dyn Backend>)
    }
}

/// Normalize an absolute path: collapse repeated `/`, drop `.` segments,
/// reject `..` and relative paths.
pub fn normalize_path(path: &str) -> Result<String, BackendError> {
    if !path.starts_with('/') {
        return Err(BackendError::InvalidPath(path.to_string()));
    }
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(BackendError::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

fn dir_prefix(path: &str) -> Result<String, BackendError> {
    let normalized = normalize_path(path)?;
    Ok(if normalized == "/" {
        normalized
    } else {
        format!("{}/", normalized)
    })
}

#[async_trait]
impl Backend for StateBackend {
    async fn ls(&self, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        let prefix = dir_prefix(path)?;
        let state = self.state.read().await;

        let mut entries: Vec<FileInfo> = Vec::new();
        for key in state.files.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let entry = match rest.split_once('/') {
                Some((dir, _)) => FileInfo {
                    path: format!("{}{}/", prefix, dir),
                    is_dir: true,
                },
                None => FileInfo {
                    path: key.clone(),
                    is_dir: false,
                },
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn read(&self, path: &str, offset: usize, limit: usize) -> Result<String, BackendError> {
        let path = normalize_path(path)?;
        let state = self.state.read().await;
        let file = state
            .files
            .get(&path)
            .ok_or_else(|| BackendError::NotFound(path.clone()))?;

        if file.content.len() == 1 && file.content[0].is_empty() {
            return Ok("System reminder: File exists but has empty contents".to_string());
        }
        if offset >= file.content.len() {
            return Ok(format!(
                "Line offset {} exceeds file length ({} lines)",
                offset,
                file.content.len()
            ));
        }

        let end = offset.saturating_add(limit).min(file.content.len());
        let mut output = String::new();
        for (i, line) in file.content[offset..end].iter().enumerate() {
            output.push_str(&format!("{:>6}\t{}\n", offset + i + 1, line));
        }
        Ok(output)
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), BackendError> {
        let path = normalize_path(path)?;
        let mut state = self.state.write().await;
        if state.files.contains_key(&path) {
            return Err(BackendError::AlreadyExists(path));
        }
        state.files.insert(path, FileData::new(content));
        Ok(())
    }

    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<usize, BackendError> {
        let path = normalize_path(path)?;
        let mut state = self.state.write().await;
        let file = state
            .files
            .get_mut(&path)
            .ok_or_else(|| BackendError::NotFound(path.clone()))?;

        let text = file.text();
        let count = if old.is_empty() { 0 } else { text.matches(old).count() };
        match count {
            0 => Err(BackendError::NoMatch(old.to_string())),
            n if n > 1 && !replace_all => Err(BackendError::AmbiguousMatch { path, count: n }),
            n => {
                let updated = if replace_all {
                    text.replace(old, new)
                } else {
                    text.replacen(old, new, 1)
                };
                file.replace(&updated);
                Ok(n)
            }
        }
    }

    async fn grep(&self, pattern: &str, path: Option<&str>) -> Result<Vec<GrepMatch>, BackendError> {
        let prefix = match path {
            Some(p) => Some(normalize_path(p)?),
            None => None,
        };
        let state = self.state.read().await;

        let mut matches = Vec::new();
        for (file_path, data) in &state.files {
            if let Some(ref prefix) = prefix {
                let under = file_path == prefix
                    || prefix == "/"
                    || file_path.starts_with(&format!("{}/", prefix));
                if !under {
                    continue;
                }
            }
            for (i, line) in data.content.iter().enumerate() {
                if line.contains(pattern) {
                    matches.push(GrepMatch {
                        path: file_path.clone(),
                        line: i + 1,
                        text: line.clone(),
                    });
                }
            }
        }
        Ok(matches)
    }

    async fn files(&self) -> BTreeMap<String, FileData> {
        self.state.read().await.files.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn backend() -> StateBackend {
        StateBackend::new(&Runtime::with_thread_id("test"))
    }

    #[test]
    fn test_classify() {
        assert_eq!(FileKind::classify("/memory/notes.md"), FileKind::Memory);
        assert_eq!(FileKind::classify("/memory/design/palette.md"), FileKind::Memory);
        assert_eq!(FileKind::classify("/App.tsx"), FileKind::Artifact);
        assert_eq!(FileKind::classify("/src/memory/cache.ts"), FileKind::Artifact);
        assert_eq!(FileKind::classify("/memory"), FileKind::Artifact);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/App.tsx").unwrap(), "/App.tsx");
        assert_eq!(normalize_path("//src//./App.tsx").unwrap(), "/src/App.tsx");
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert!(normalize_path("App.tsx").is_err());
        assert!(normalize_path("/src/../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let backend = backend();
        backend.write("/App.tsx", "line one\nline two").await.unwrap();

        let out = backend.read("/App.tsx", 0, 2000).await.unwrap();
        assert_eq!(out, "     1\tline one\n     2\tline two\n");

        let out = backend.read("/App.tsx", 1, 1).await.unwrap();
        assert_eq!(out, "     2\tline two\n");
    }

    #[tokio::test]
    async fn test_write_refuses_overwrite() {
        let backend = backend();
        backend.write("/App.tsx", "a").await.unwrap();
        let err = backend.write("/App.tsx", "b").await.unwrap_err();
        assert_eq!(err, BackendError::AlreadyExists("/App.tsx".to_string()));
    }

    #[tokio::test]
    async fn test_read_missing_and_empty() {
        let backend = backend();
        assert_eq!(
            backend.read("/nope.ts", 0, 10).await.unwrap_err(),
            BackendError::NotFound("/nope.ts".to_string())
        );

        backend.write("/empty.css", "").await.unwrap();
        let out = backend.read("/empty.css", 0, 10).await.unwrap();
        assert!(out.contains("empty contents"));
    }

    #[tokio::test]
    async fn test_edit_unique_and_replace_all() {
        let backend = backend();
        backend
            .write("/styles.css", "a { color: red; }\nb { color: red; }")
            .await
            .unwrap();

        let err = backend
            .edit("/styles.css", "red", "blue", false)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::AmbiguousMatch { count: 2, .. }));

        let n = backend.edit("/styles.css", "a { color: red", "a { color: green", false).await.unwrap();
        assert_eq!(n, 1);

        let n = backend.edit("/styles.css", "red", "blue", true).await.unwrap();
        assert_eq!(n, 1);

        let files = backend.files().await;
        assert_eq!(
            files["/styles.css"].text(),
            "a { color: green; }\nb { color: blue; }"
        );
    }

    #[tokio::test]
    async fn test_edit_no_match() {
        let backend = backend();
        backend.write("/index.ts", "export {}").await.unwrap();
        let err = backend.edit("/index.ts", "missing", "x", false).await.unwrap_err();
        assert_eq!(err, BackendError::NoMatch("missing".to_string()));
    }

    #[tokio::test]
    async fn test_ls_lists_immediate_children() {
        let backend = backend();
        backend.write("/App.tsx", "").await.unwrap();
        backend.write("/components/Button.tsx", "").await.unwrap();
        backend.write("/components/Card.tsx", "").await.unwrap();
        backend.write("/memory/notes.md", "").await.unwrap();

        let root = backend.ls("/").await.unwrap();
        assert_eq!(
            root,
            vec![
                FileInfo { path: "/App.tsx".to_string(), is_dir: false },
                FileInfo { path: "/components/".to_string(), is_dir: true },
                FileInfo { path: "/memory/".to_string(), is_dir: true },
            ]
        );

        let components = backend.ls("/components").await.unwrap();
        assert_eq!(components.len(), 2);
        assert!(components.iter().all(|e| !e.is_dir));
    }

    #[tokio::test]
    async fn test_grep() {
        let backend = backend();
        backend.write("/App.tsx", "import React from 'react';\nexport default App;").await.unwrap();
        backend.write("/memory/notes.md", "uses React").await.unwrap();

        let all = backend.grep("React", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let scoped = backend.grep("React", Some("/memory")).await.unwrap();
        assert_eq!(
            scoped,
            vec![GrepMatch {
                path: "/memory/notes.md".to_string(),
                line: 1,
                text: "uses React".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_factory_shares_runtime_state() {
        let runtime = Runtime::new();
        let factory = StateBackend::factory();
        let a = factory(&runtime);
        let b = factory(&runtime);

        a.write("/App.tsx", "x").await.unwrap();
        assert!(b.files().await.contains_key("/App.tsx"));
    }
}
