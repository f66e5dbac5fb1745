//! System prompt assembly. The result is held byte-identical across a turn
//! and across handovers (see `AgentState.system_prompt`) so provider-side
//! prompt caching stays warm; only `/model` switching to a provider that
//! can't share the cache anyway, or an explicit `set_system_prompt` after
//! external state changes, should ever change it mid-session.

use std::process::Command;

/// Host environment facts folded into the prompt.
#[derive(Debug, Clone, Default)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub shell: String,
    pub cwd: String,
    pub home: String,
    pub date: String,
}

impl PlatformInfo {
    pub fn gather() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            cwd: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
            home: dirs::home_dir().map(|p| p.display().to_string()).unwrap_or_default(),
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}

/// Repository facts, gathered via `git` subprocess calls so the prompt can
/// mention the branch and whether the tree is dirty without a git library.
#[derive(Debug, Clone, Default)]
pub struct RepoContextInfo {
    pub root: Option<String>,
    pub branch: Option<String>,
    pub has_uncommitted: bool,
}

impl RepoContextInfo {
    pub fn gather() -> Self {
        let mut info = Self::default();

        if let Ok(output) = Command::new("git").args(["rev-parse", "--show-toplevel"]).output() {
            if output.status.success() {
                info.root = Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }
        }
        if let Ok(output) = Command::new("git").args(["branch", "--show-current"]).output() {
            if output.status.success() {
                let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !branch.is_empty() {
                    info.branch = Some(branch);
                }
            }
        }
        if let Ok(output) = Command::new("git").args(["status", "--porcelain"]).output() {
            if output.status.success() {
                info.has_uncommitted = !output.stdout.is_empty();
            }
        }

        info
    }
}

/// Builds the fixed prefix handed to every provider as the system prompt.
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    role: String,
    platform: Option<PlatformInfo>,
    repo: Option<RepoContextInfo>,
    tool_instructions: Vec<String>,
}

impl SystemPromptBuilder {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            platform: None,
            repo: None,
            tool_instructions: Vec::new(),
        }
    }

    pub fn nav() -> Self {
        Self::new(
            "You are nav, a terminal coding assistant. You read and edit files through \
             hashline-anchored tools, run shell commands, and work step by step toward the \
             user's goal. Be direct and concise; prefer acting over asking when the next step \
             is clear.",
        )
        .add_tool_instruction(
            "Always `read` a file before `edit`-ing it; anchors are only valid against the \
             file state from the most recent read or edit.",
        )
        .add_tool_instruction(
            "A batch of edits is all-or-nothing: if any anchor is stale the whole call is \
             rejected and nothing is written. Re-read and retry.",
        )
    }

    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_repo(mut self, repo: RepoContextInfo) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn add_tool_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.tool_instructions.push(instruction.into());
        self
    }

    pub fn build(&self) -> String {
        let mut parts = vec![self.role.clone()];

        if let Some(ref platform) = self.platform {
            parts.push(format!(
                "\n## Environment\n- OS: {} ({})\n- Shell: {}\n- Working directory: {}\n- Home directory: {}\n- Date: {}",
                platform.os, platform.arch, platform.shell, platform.cwd, platform.home, platform.date
            ));
        }

        if let Some(ref repo) = self.repo {
            let mut lines = Vec::new();
            if let Some(ref root) = repo.root {
                lines.push(format!("- Repository root: {root}"));
            }
            if let Some(ref branch) = repo.branch {
                lines.push(format!("- Branch: {branch}"));
            }
            if repo.has_uncommitted {
                lines.push("- Working tree has uncommitted changes".to_string());
            }
            if !lines.is_empty() {
                parts.push(format!("\n## Repository\n{}", lines.join("\n")));
            }
        }

        if !self.tool_instructions.is_empty() {
            parts.push(format!(
                "\n## Tool usage\n{}",
                self.tool_instructions.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n")
            ));
        }

        parts.join("\n")
    }
}

impl Default for SystemPromptBuilder {
    fn default() -> Self {
        Self::nav()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_info_gathers_non_empty_os_and_arch() {
        let info = PlatformInfo::gather();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
    }

    #[test]
    fn build_includes_environment_and_tool_sections() {
        let prompt = SystemPromptBuilder::nav()
            .with_platform(PlatformInfo {
                os: "linux".into(),
                arch: "x86_64".into(),
                shell: "/bin/bash".into(),
                cwd: "/home/user/project".into(),
                home: "/home/user".into(),
                date: "2026-07-27".into(),
            })
            .build();

        assert!(prompt.contains("nav"));
        assert!(prompt.contains("linux"));
        assert!(prompt.contains("/home/user/project"));
        assert!(prompt.contains("## Tool usage"));
    }

    #[test]
    fn bare_builder_has_no_optional_sections() {
        let prompt = SystemPromptBuilder::new("role only").build();
        assert_eq!(prompt, "role only");
    }
}
