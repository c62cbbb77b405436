//! Agent middleware
//!
//! Middleware hooks into session start: it can rewrite the system prompt and
//! contribute extra tools. Hooks run in list order.

mod skills;

use std::any::Any;
use std::sync::Arc;

use crate::tools::Tool;

pub use skills::{parse_skill_content, ReadSkillTool, Skill, SkillSource, SkillsMiddleware};

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once per session with the prompt assembled so far
    fn modify_system_prompt(&self, prompt: String) -> String {
        prompt
    }

    /// Extra tools made available to the agent
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Run every middleware's prompt hook over `prompt`, in order
pub fn apply_system_prompt(middleware: &[Arc<dyn Middleware>], prompt: String) -> String {
    middleware
        .iter()
        .fold(prompt, |prompt, m| m.modify_system_prompt(prompt))
}
