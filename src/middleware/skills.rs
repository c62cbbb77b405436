//! Skills middleware
//!
//! A skill is a directory holding a `SKILL.md`: YAML frontmatter with a name
//! and description, followed by markdown instructions. Skills are discovered
//! from the user's per-assistant directory and from the project directory,
//! with project skills overriding user skills of the same name. Skills
//! bundled into the binary sit underneath both.

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::Middleware;
use crate::config::Config;
use crate::tools::{names, Tool, ToolContext, ToolResult};

const SKILL_FILE: &str = "SKILL.md";

/// `(directory name, SKILL.md)` pairs compiled into the binary
const BUNDLED_SKILLS: &[(&str, &str)] = &[(
    "frontend-design",
    include_str!("../../skills/frontend-design/SKILL.md"),
)];

/// Where a skill was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillSource {
    Bundled,
    User,
    Project,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Markdown instructions following the frontmatter
    pub instructions: String,
    pub path: PathBuf,
    pub source: SkillSource,
}

#[derive(Debug, Deserialize)]
struct SkillFrontmatter {
    name: Option<String>,
    description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split `---` delimited frontmatter from the body. Only a line that is
/// exactly `---` (surrounding whitespace ignored) counts as a delimiter.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.trim_start_matches('\u{feff}').trim_start();
    let rest = content.strip_prefix("---")?;
    let (first, rest) = rest.split_once('\n').unwrap_or((rest, ""));
    if !first.trim().is_empty() {
        return None;
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse SKILL.md content into `(name, description, instructions)`.
///
/// `default_name` (usually the directory name) is used when the frontmatter
/// has no name.
pub fn parse_skill_content(
    content: &str,
    default_name: Option<&str>,
) -> Result<(String, String, String)> {
    let (yaml, body) = split_frontmatter(content)
        .ok_or_else(|| anyhow::anyhow!("SKILL.md must start with YAML frontmatter: --- ... ---"))?;

    let frontmatter: SkillFrontmatter =
        serde_yaml::from_str(yaml).context("Failed to parse SKILL.md YAML frontmatter")?;

    let name = non_empty(frontmatter.name)
        .or_else(|| default_name.map(str::to_string))
        .ok_or_else(|| anyhow::anyhow!("name is required and must not be empty"))?;
    let description = non_empty(frontmatter.description)
        .ok_or_else(|| anyhow::anyhow!("description is required and must not be empty"))?;

    Ok((name, description, body.trim().to_string()))
}

fn load_skill(dir: &Path, source: SkillSource) -> Result<Skill> {
    let path = dir.join(SKILL_FILE);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let default_name = dir.file_name().and_then(|n| n.to_str());
    let (name, description, instructions) = parse_skill_content(&content, default_name)
        .with_context(|| format!("Invalid skill at {}", path.display()))?;

    Ok(Skill {
        name,
        description,
        instructions,
        path,
        source,
    })
}

fn bundled_skills() -> Vec<Skill> {
    BUNDLED_SKILLS
        .iter()
        .filter_map(|(dir, content)| match parse_skill_content(content, Some(*dir)) {
            Ok((name, description, instructions)) => Some(Skill {
                name,
                description,
                instructions,
                path: Path::new(env!("CARGO_MANIFEST_DIR"))
                    .join("skills")
                    .join(dir)
                    .join(SKILL_FILE),
                source: SkillSource::Bundled,
            }),
            Err(e) => {
                warn!("Skipping bundled skill {}: {:#}", dir, e);
                None
            }
        })
        .collect()
}

/// Every valid skill directly under `root`. Invalid skills are skipped.
fn discover(root: &Path, source: SkillSource) -> Vec<Skill> {
    let Ok(entries) = fs::read_dir(root) else {
        debug!("No skills directory at {}", root.display());
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.join(SKILL_FILE).is_file())
        .collect();
    dirs.sort();

    dirs.iter()
        .filter_map(|dir| match load_skill(dir, source) {
            Ok(skill) => Some(skill),
            Err(e) => {
                warn!("Skipping skill: {:#}", e);
                None
            }
        })
        .collect()
}

/// Lazily loaded, shared skill set
#[derive(Debug)]
struct SkillStore {
    /// Searched in order; later directories override earlier ones
    roots: Vec<(PathBuf, SkillSource)>,
    loaded: OnceLock<BTreeMap<String, Skill>>,
}

impl SkillStore {
    fn skills(&self) -> &BTreeMap<String, Skill> {
        self.loaded.get_or_init(|| {
            let mut skills: BTreeMap<String, Skill> = bundled_skills()
                .into_iter()
                .map(|skill| (skill.name.clone(), skill))
                .collect();
            for (root, source) in &self.roots {
                for skill in discover(root, *source) {
                    if let Some(previous) = skills.insert(skill.name.clone(), skill) {
                        debug!("Skill {} overridden ({:?})", previous.name, previous.source);
                    }
                }
            }
            info!("Loaded {} skill(s)", skills.len());
            skills
        })
    }
}

/// Injects the skills catalog, and the full text of selected skills, into
/// the system prompt
#[derive(Debug, Clone)]
pub struct SkillsMiddleware {
    skills_dir: PathBuf,
    assistant_id: String,
    auto_inject: Vec<String>,
    store: Arc<SkillStore>,
}

impl SkillsMiddleware {
    /// Nothing is read from disk until the first session starts
    pub fn new(
        skills_dir: impl Into<PathBuf>,
        assistant_id: impl Into<String>,
        auto_inject: Vec<String>,
    ) -> Self {
        let assistant_id = assistant_id.into();
        let user_dir = Config::config_dir()
            .map(|dir| dir.join("agents").join(&assistant_id).join("skills"));
        Self::with_user_dir(skills_dir, assistant_id, auto_inject, user_dir)
    }

    /// Like [`SkillsMiddleware::new`] with an explicit user skills directory
    pub fn with_user_dir(
        skills_dir: impl Into<PathBuf>,
        assistant_id: impl Into<String>,
        auto_inject: Vec<String>,
        user_dir: Option<PathBuf>,
    ) -> Self {
        let skills_dir = skills_dir.into();
        let mut roots = Vec::new();
        if let Some(dir) = user_dir {
            roots.push((dir, SkillSource::User));
        }
        roots.push((skills_dir.clone(), SkillSource::Project));

        Self {
            skills_dir,
            assistant_id: assistant_id.into(),
            auto_inject,
            store: Arc::new(SkillStore {
                roots,
                loaded: OnceLock::new(),
            }),
        }
    }

    pub fn skills_dir(&self) -> &Path {
        &self.skills_dir
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Skills whose full instructions go into every session's prompt
    pub fn auto_inject_skills(&self) -> &[String] {
        &self.auto_inject
    }

    /// All discovered skills, sorted by name
    pub fn skills(&self) -> Vec<Skill> {
        self.store.skills().values().cloned().collect()
    }

    fn prompt_section(&self) -> Option<String> {
        let skills = self.store.skills();
        for name in &self.auto_inject {
            if !skills.contains_key(name) {
                warn!(
                    "Auto-inject skill '{}' not found in {}",
                    name,
                    self.skills_dir.display()
                );
            }
        }
        if skills.is_empty() {
            return None;
        }

        let mut section = String::from(
            "## Skills\n\n\
             Skills are packaged instructions for specialised tasks. \
             Call `read_skill` with a skill's name to load its instructions before using it.\n\n",
        );
        for skill in skills.values() {
            section.push_str(&format!("- **{}**: {}\n", skill.name, skill.description));
        }

        for name in &self.auto_inject {
            if let Some(skill) = skills.get(name) {
                section.push_str(&format!(
                    "\n### Active skill: {}\n\n{}\n",
                    skill.name, skill.instructions
                ));
            }
        }
        Some(section)
    }
}

impl Middleware for SkillsMiddleware {
    fn name(&self) -> &'static str {
        "skills"
    }

    fn modify_system_prompt(&self, prompt: String) -> String {
        match self.prompt_section() {
            Some(section) => format!("{}\n\n{}", prompt.trim_end(), section),
            None => prompt,
        }
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ReadSkillTool {
            store: self.store.clone(),
        })]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Loads one skill's instructions on demand
pub struct ReadSkillTool {
    store: Arc<SkillStore>,
}

#[derive(Debug, Deserialize)]
struct ReadSkillParams {
    name: String,
}

#[async_trait]
impl Tool for ReadSkillTool {
    fn name(&self) -> &'static str {
        names::READ_SKILL
    }

    fn description(&self) -> &'static str {
        "Load the full instructions of a skill by name."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Skill name as listed in the system prompt"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let params: ReadSkillParams = serde_json::from_value(params)?;
        let skills = self.store.skills();
        match skills.get(&params.name) {
            Some(skill) => Ok(ToolResult::success(format!(
                "# Skill: {}\n\n{}",
                skill.name, skill.instructions
            ))),
            None => {
                let available: Vec<&str> = skills.keys().map(String::as_str).collect();
                Ok(ToolResult::error(format!(
                    "Unknown skill '{}'. Available: {}",
                    params.name,
                    if available.is_empty() {
                        "none".to_string()
                    } else {
                        available.join(", ")
                    }
                )))
            }
        }
    }
}
