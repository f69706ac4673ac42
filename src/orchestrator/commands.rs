//! Files and commands the orchestrator uses inside a sandbox.

/// Agent configuration file, relative to the sandbox root.
pub const CONFIG_PATH: &str = "opencode.json";

/// Backlog written by the planning skill.
pub const BACKLOG_PATH: &str = "stories.json";

/// Requirements document written by the planning skill.
pub const DOCUMENT_PATH: &str = "prd.md";

pub const PLANNING_SKILL: &str = "demo-app-planner";
pub const IMPLEMENTATION_SKILL: &str = "implement-story";

pub fn skill_dir(skill: &str) -> String {
    format!(".opencode/skill/{}", skill)
}

pub fn skill_path(skill: &str) -> String {
    format!("{}/SKILL.md", skill_dir(skill))
}

pub fn plan_command(agent: &str, description: &str) -> String {
    let prompt = format!("Use the {} skill to plan for {}", PLANNING_SKILL, description);
    format!("{} run {}", agent, shell_quote(&prompt))
}

pub fn iterate_command(agent: &str) -> String {
    let prompt = format!("Use the {} skill to continue.", IMPLEMENTATION_SKILL);
    format!("{} run {}", agent, shell_quote(&prompt))
}

/// Quote `s` as a single POSIX shell word.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
