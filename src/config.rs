//! Configuration resolution (§3.1, §6): CLI flags, provider-specific env
//! vars, unified `NAV_*` env vars, then defaults, in that precedence order.
//! `SecretString` mirrors the teacher's keystore secret type, minus the
//! encryption-at-rest machinery this spec has no on-disk keystore for.

use std::fmt;
use std::path::PathBuf;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cli::{Cli, ProviderArg};
use crate::error::{NavError, Result};

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Ollama => "ollama",
        }
    }

    fn from_arg(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Openai => Provider::OpenAi,
            ProviderArg::Anthropic => Provider::Anthropic,
            ProviderArg::Ollama => Provider::Ollama,
        }
    }

    /// Auto-detect from a model name substring (§6). Defaults to OpenAI.
    fn detect(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        if lower.contains("claude") {
            return Provider::Anthropic;
        }
        const OLLAMA_MARKERS: &[&str] = &[
            "llama", "mistral", "qwen", "gemma", "phi", "deepseek", "codellama", "vicuna", "starcoder", "yi",
        ];
        if OLLAMA_MARKERS.iter().any(|m| lower.contains(m)) {
            return Provider::Ollama;
        }
        if lower.contains("gpt") || lower.starts_with("o1") || lower.starts_with("o3") {
            return Provider::OpenAi;
        }
        Provider::OpenAi
    }

    /// The provider's default API base URL, used both to pre-fill
    /// `ResolvedConfig::base_url` for providers that need no override
    /// (Ollama) and by the caller when building a client for providers that
    /// do (OpenAI, Anthropic).
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Ollama => "http://127.0.0.1:11434",
        }
    }
}

#[derive(Clone)]
pub struct ResolvedConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub working_dir: PathBuf,
    pub context_window: Option<u32>,
    pub handover_threshold: f32,
    pub sandbox: bool,
    pub log_level: String,
    pub verbose: bool,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("working_dir", &self.working_dir)
            .field("context_window", &self.context_window)
            .field("handover_threshold", &self.handover_threshold)
            .field("sandbox", &self.sandbox)
            .field("log_level", &self.log_level)
            .field("verbose", &self.verbose)
            .finish()
    }
}

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_HANDOVER_THRESHOLD: f32 = 0.8;

/// Resolves CLI flags against the environment. `env` is injected so tests
/// don't depend on (or clobber) the process environment.
pub fn resolve(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<ResolvedConfig> {
    let model = cli
        .model
        .clone()
        .or_else(|| env("NAV_MODEL"))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let provider = cli
        .provider
        .map(Provider::from_arg)
        .or_else(|| env("NAV_PROVIDER").and_then(|s| match s.to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "anthropic" => Some(Provider::Anthropic),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }))
        .unwrap_or_else(|| Provider::detect(&model));

    let base_url = Some(
        cli.base_url
            .clone()
            .or_else(|| env("NAV_BASE_URL"))
            .unwrap_or_else(|| provider.default_base_url().to_string()),
    );

    let api_key = provider_env_key(provider, &env)
        .or_else(|| env("NAV_API_KEY"))
        .map(SecretString::new);

    if api_key.is_none() && provider != Provider::Ollama {
        return Err(NavError::Config(format!(
            "no API key found for provider {}; set NAV_API_KEY or the provider-specific env var",
            provider.as_str()
        )));
    }

    let working_dir = cli
        .working_dir
        .clone()
        .unwrap_or(std::env::current_dir().map_err(|e| NavError::Config(e.to_string()))?);

    let context_window = env("NAV_CONTEXT_WINDOW").and_then(|s| s.parse().ok());

    let handover_threshold = env("NAV_HANDOVER_THRESHOLD")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_HANDOVER_THRESHOLD);

    let sandbox = cli.sandbox || env("NAV_SANDBOX").map(|v| v == "1" || v == "true").unwrap_or(false);

    let log_level = if cli.verbose { "debug".to_string() } else { "info".to_string() };

    Ok(ResolvedConfig {
        provider,
        model,
        base_url,
        api_key,
        working_dir,
        context_window,
        handover_threshold,
        sandbox,
        log_level,
        verbose: cli.verbose,
    })
}

fn provider_env_key(provider: Provider, env: &impl Fn(&str) -> Option<String>) -> Option<String> {
    match provider {
        Provider::OpenAi => env("OPENAI_API_KEY"),
        Provider::Anthropic => env("ANTHROPIC_API_KEY"),
        Provider::Ollama => None,
    }
}
