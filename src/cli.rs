//! Command-line surface (§6), resolved together with the environment in
//! `config::resolve`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "nav")]
#[command(author, version, about = "Terminal coding assistant with hashline-anchored editing", long_about = None)]
pub struct Cli {
    /// One-shot prompt; omit to start the interactive TUI.
    pub prompt: Option<String>,

    /// Model name, e.g. `gpt-4o`, `claude-sonnet-4-5`, `llama3`.
    #[arg(short = 'm', long, env = "NAV_MODEL")]
    pub model: Option<String>,

    /// Provider to use; auto-detected from the model name when omitted.
    #[arg(short = 'p', long, env = "NAV_PROVIDER", value_enum)]
    pub provider: Option<ProviderArg>,

    /// Override the provider's base URL (useful for Ollama or proxies).
    #[arg(short = 'b', long, env = "NAV_BASE_URL")]
    pub base_url: Option<String>,

    /// Verbose logging (debug level) to the ambient log file.
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// Run tool execution in a sandbox, when one is available on this host.
    #[arg(short = 's', long, default_value_t = false)]
    pub sandbox: bool,

    /// Enable context-window-triggered auto-handover.
    #[arg(long, default_value_t = false)]
    pub enable_handover: bool,

    /// Working directory for tool execution; defaults to the current directory.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum ProviderArg {
    Openai,
    Anthropic,
    Ollama,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_unset() {
        let cli = Cli::parse_from(["nav"]);
        assert!(cli.prompt.is_none());
        assert!(cli.model.is_none());
        assert!(!cli.verbose);
        assert!(!cli.sandbox);
        assert!(!cli.enable_handover);
    }

    #[test]
    fn one_shot_prompt_is_positional() {
        let cli = Cli::parse_from(["nav", "fix the failing test"]);
        assert_eq!(cli.prompt.as_deref(), Some("fix the failing test"));
    }

    #[test]
    fn model_and_provider_flags_parse() {
        let cli = Cli::parse_from(["nav", "-m", "claude-sonnet-4-5", "-p", "anthropic"]);
        assert_eq!(cli.model.as_deref(), Some("claude-sonnet-4-5"));
        assert_eq!(cli.provider, Some(ProviderArg::Anthropic));
    }
}
