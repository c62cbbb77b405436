//! Subagent definitions
//!
//! Subagents are reached through the `task` tool. Each runs its own agent
//! loop against the caller's session files and returns its final answer.

use crate::prompts::{CODE_REVIEWER_PROMPT, RESEARCH_AGENT_PROMPT};
use crate::tools::names;

/// Name of the subagent that is always available
pub const GENERAL_PURPOSE: &str = "general-purpose";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAgentSpec {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    /// Tool names the subagent may use; `None` grants every main-agent tool
    pub tools: Option<Vec<String>>,
}

impl SubAgentSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = Some(tools.iter().map(|t| t.to_string()).collect());
        self
    }
}

/// The subagents the frontend agent ships with
pub fn default_subagents() -> Vec<SubAgentSpec> {
    vec![
        SubAgentSpec::new(
            "research-agent",
            "Researches libraries, APIs and design references on the web and reports back \
             a concise summary with sources.",
            RESEARCH_AGENT_PROMPT,
        )
        .with_tools(&[names::WEB_SEARCH, names::FETCH_URL, names::HTTP_REQUEST]),
        SubAgentSpec::new(
            "code-reviewer",
            "Reviews the app's files for bugs, broken imports and accessibility issues. \
             Read-only.",
            CODE_REVIEWER_PROMPT,
        )
        .with_tools(&[names::LS, names::READ_FILE, names::GREP]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_subagents() {
        let subagents = default_subagents();
        let names: Vec<&str> = subagents.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["research-agent", "code-reviewer"]);
        assert!(subagents.iter().all(|s| s.name != GENERAL_PURPOSE));
        assert_eq!(
            subagents[1].tools,
            Some(vec!["ls".to_string(), "read_file".to_string(), "grep".to_string()])
        );
    }
}
