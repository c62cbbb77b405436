//! Frontend agent assembly
//!
//! Resolves the model from the environment, then hands the model, prompt,
//! web tools, skills middleware, state backend and subagents to
//! [`create_deep_agent`]. Configuration errors are returned, never swallowed.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::backend::StateBackend;
use crate::config::{AgentRuntimeConfig, Config};
use crate::deep_agent::{create_deep_agent, AgentSpec, DeepAgent};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::ConfigError;
use crate::llm::{ModelClient, ModelSelection};
use crate::middleware::{Middleware, SkillsMiddleware};
use crate::prompts::SYSTEM_PROMPT;
use crate::subagents::default_subagents;
use crate::tools::ToolRegistry;

pub const ASSISTANT_ID: &str = "frontend-agent";

/// Skills injected into every session regardless of configuration
pub const AUTO_INJECT_SKILLS: &[&str] = &["frontend-design"];

/// Project skills directory when none is configured, anchored to the
/// package rather than the working directory
pub const DEFAULT_SKILLS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/skills");

fn skills_middleware(config: &Config) -> SkillsMiddleware {
    let dir = config
        .skills
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SKILLS_DIR));

    let mut auto_inject: Vec<String> = AUTO_INJECT_SKILLS.iter().map(|s| s.to_string()).collect();
    for name in &config.skills.auto_inject {
        if !auto_inject.contains(name) {
            auto_inject.push(name.clone());
        }
    }

    SkillsMiddleware::new(dir, ASSISTANT_ID, auto_inject)
}

/// Assemble the frontend agent from an environment and configuration
pub fn create_frontend_agent(
    env: &impl EnvSource,
    config: &Config,
) -> Result<DeepAgent, ConfigError> {
    let selection = ModelSelection::resolve(env);
    let model = ModelClient::new(&selection, env)?;

    let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(skills_middleware(config))];

    let agent = create_deep_agent(AgentSpec {
        model: Arc::new(model),
        system_prompt: SYSTEM_PROMPT.to_string(),
        tools: ToolRegistry::web(env),
        middleware,
        backend: StateBackend::factory(),
        subagents: default_subagents(),
        runtime: AgentRuntimeConfig::from_config(config),
    });

    info!(
        "Assembled {} agent (route={}, model={})",
        ASSISTANT_ID,
        selection.route(),
        agent.model_name()
    );
    Ok(agent)
}

/// Assemble the frontend agent from the process environment and the
/// user's config file
pub fn create_agent() -> Result<DeepAgent, ConfigError> {
    let config = Config::load()?;
    create_frontend_agent(&ProcessEnv, &config)
}
