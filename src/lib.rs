//! Lovable Agent - a chat-driven frontend builder agent
//!
//! The crate assembles an agent that writes a React app into a per-session
//! virtual filesystem, using web tools, a skills catalog and subagents.
//!
//! # Example
//!
//! ```no_run
//! use lovable_agent::{create_agent, AgentStep, FileKind};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Model and provider come from MODEL / OPENROUTER_API_KEY / ANTHROPIC_API_KEY
//!     let agent = create_agent()?;
//!     let mut session = agent.start_session();
//!
//!     session.send("Build a landing page for a coffee roaster");
//!     while let Some(step) = session.next().await {
//!         match step {
//!             AgentStep::TextDelta(text) => print!("{}", text),
//!             AgentStep::ToolStarted { name, .. } => println!("\n[{}]", name),
//!             AgentStep::Error(e) => eprintln!("Error: {}", e),
//!             _ => {}
//!         }
//!     }
//!
//!     for (path, kind) in session.files().await {
//!         if kind == FileKind::Artifact {
//!             println!("{}", path);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod assembler;
pub mod backend;
mod config;
mod deep_agent;
mod env;
mod error;
pub mod llm;
pub mod middleware;
mod prompts;
mod subagents;
pub mod tools;

// Re-export the public API
pub use assembler::{create_agent, create_frontend_agent, ASSISTANT_ID, AUTO_INJECT_SKILLS};
pub use backend::{Backend, BackendFactory, FileData, FileKind, Runtime, StateBackend, Todo};
pub use config::{AgentRuntimeConfig, Config, MAX_TOKENS};
pub use deep_agent::{create_deep_agent, AgentSpec, DeepAgent, Session};
pub use env::{EnvSource, ProcessEnv};
pub use error::{BackendError, ConfigError};
pub use llm::{AgentStep, ChatModel, ModelClient, ModelRef, ModelSelection, Usage};
pub use middleware::{Middleware, SkillsMiddleware};
pub use prompts::SYSTEM_PROMPT;
pub use subagents::{default_subagents, SubAgentSpec};
pub use tools::{Tool, ToolRegistry, ToolResult};
