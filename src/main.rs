mod agent;
mod cli;
mod commands;
mod config;
mod diff;
mod error;
mod hashline;
mod llm;
mod process;
mod session_log;
mod tools;
mod tui;

use std::collections::HashMap;
use std::io::Write;
use std::panic;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use color_eyre::eyre::Result;
use crossterm::event::DisableMouseCapture;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, LeaveAlternateScreen};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use agent::{Agent, SystemPromptBuilder};
use cli::Cli;
use commands::CommandOutcome;
use config::{Provider, ResolvedConfig};
use llm::{AnthropicProvider, LLMProvider, OllamaProvider, OpenAIProvider};
use process::ProcessManager;
use session_log::{RecordType, SessionLogger, SharedSessionLogger};
use tui::{TerminalUi, Tui, TuiState};

fn init_logging(log_level: &str) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_path = session_log::log_dir();
    std::fs::create_dir_all(&log_path)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_path, "nav.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("logging initialized, log directory: {}", log_path.display());
    Ok(guard)
}

fn build_client(provider: Provider, base_url: &str, api_key: &str, model: &str) -> Arc<dyn LLMProvider> {
    match provider {
        Provider::OpenAi => Arc::new(OpenAIProvider::new(base_url, api_key, model)),
        Provider::Anthropic => Arc::new(AnthropicProvider::new(base_url, api_key, model)),
        Provider::Ollama => Arc::new(OllamaProvider::new(base_url, model)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        let _ = std::io::stdout().flush();
        original_hook(panic_info);
    }));

    color_eyre::install()?;

    let cli = Cli::parse_args();
    let cfg = config::resolve(&cli, |key| std::env::var(key).ok())?;

    let _log_guard = init_logging(&cfg.log_level)?;
    tracing::info!("starting nav v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?cfg, "resolved configuration");

    let session_log = Arc::new(Mutex::new(SessionLogger::open(Utc::now())?));
    session_log.lock().unwrap().log(RecordType::Config, Utc::now(), serde_json::json!({
        "provider": cfg.provider.as_str(),
        "model": cfg.model,
        "sandbox": cfg.sandbox,
    }))?;

    let base_url = cfg.base_url.clone().unwrap_or_else(|| cfg.provider.default_base_url().to_string());
    let api_key = cfg.api_key.as_ref().map(|s| s.expose().to_string()).unwrap_or_default();
    let client = build_client(cfg.provider, &base_url, &api_key, &cfg.model);

    let system_prompt = SystemPromptBuilder::nav()
        .with_platform(agent::PlatformInfo::gather())
        .with_repo(agent::RepoContextInfo::gather())
        .build();
    session_log.lock().unwrap().log(RecordType::SystemPrompt, Utc::now(), serde_json::json!({ "text": system_prompt }))?;

    let processes = ProcessManager::new(cfg.working_dir.clone());
    let llm_manager = llm::LlmManager::new(client, cfg.model.clone());

    let tui_state = Arc::new(Mutex::new(TuiState::default()));
    let ui = Arc::new(TerminalUi::new(tui_state.clone()));
    let mut agent = Agent::new(
        llm_manager,
        processes,
        cfg.working_dir.clone(),
        system_prompt,
        cfg.context_window,
        cfg.handover_threshold,
        ui,
    )
    .with_session_sink(Arc::new(SharedSessionLogger(session_log.clone())));

    let mut tui = Tui::new(tui_state)?;
    tui.enter()?;

    let custom_commands: HashMap<String, commands::CommandTableEntry> = HashMap::new();
    let one_shot = cli.prompt.clone();
    let exit_code = tokio::select! {
        code = run_program(&mut agent, &mut tui, &session_log, &custom_commands, &cfg, one_shot) => code,
        code = wait_for_signal() => code,
    };

    tui.exit()?;
    agent.kill_background_processes().await;

    std::process::exit(exit_code);
}

/// `program "one-shot prompt"` (§6) runs exactly that turn and exits;
/// otherwise falls into the ordinary interactive prompt loop.
async fn run_program(
    agent: &mut Agent<TerminalUi>,
    tui: &mut Tui,
    session_log: &Arc<Mutex<SessionLogger>>,
    custom_commands: &HashMap<String, commands::CommandTableEntry>,
    cfg: &ResolvedConfig,
    one_shot: Option<String>,
) -> i32 {
    if let Some(prompt) = one_shot {
        let _ = session_log.lock().unwrap().log(RecordType::UserMessage, Utc::now(), serde_json::json!({ "text": prompt }));
        let (_, result) = tokio::join!(agent.run(prompt), tui.drive_while_running());
        if let Err(e) = result {
            tracing::error!("terminal error while running: {e}");
            return 1;
        }
        if let Some(last) = agent.conversation().last() {
            let _ = session_log.lock().unwrap().log(RecordType::AssistantMessage, Utc::now(), serde_json::json!({ "text": last.text() }));
        }
        return 0;
    }

    run_loop(agent, tui, session_log, custom_commands, cfg).await
}

/// Waits for SIGINT/SIGTERM and maps them to their conventional exit codes
/// (§7); `main` races this against the interactive loop so a signal during a
/// running turn still tears down cleanly.
async fn wait_for_signal() -> i32 {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => 130,
            _ = term.recv() => 143,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        130
    }
}

async fn run_loop(
    agent: &mut Agent<TerminalUi>,
    tui: &mut Tui,
    session_log: &Arc<Mutex<SessionLogger>>,
    custom_commands: &HashMap<String, commands::CommandTableEntry>,
    cfg: &ResolvedConfig,
) -> i32 {
    loop {
        let line = match tui.prompt().await {
            Ok(Some(line)) => line,
            Ok(None) => return 0,
            Err(e) => {
                tracing::error!("terminal error: {e}");
                return 1;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let prompt = match commands::dispatch(&line, custom_commands, agent.conversation().is_empty()) {
            Some(CommandOutcome::Clear) => {
                agent.clear();
                continue;
            }
            Some(CommandOutcome::ShowModel) => {
                agent.notify(&format!("model: {} ({})", agent.model(), agent.provider_name()));
                continue;
            }
            Some(CommandOutcome::SwitchModel(model)) => {
                let base_url = cfg.base_url.clone().unwrap_or_else(|| cfg.provider.default_base_url().to_string());
                let api_key = cfg.api_key.as_ref().map(|s| s.expose().to_string()).unwrap_or_default();
                let client = build_client(cfg.provider, &base_url, &api_key, &model);
                agent.notify(&format!("switched to model: {model}"));
                agent.set_llm(client, model);
                continue;
            }
            Some(CommandOutcome::Handover(instructions)) => {
                let (_, result) = tokio::join!(agent.handover(instructions), tui.drive_while_running());
                if let Err(e) = result {
                    tracing::error!("terminal error while running: {e}");
                }
                continue;
            }
            Some(CommandOutcome::Help(lines)) => {
                for line in lines {
                    agent.notify(&line);
                }
                continue;
            }
            Some(CommandOutcome::Error(message)) => {
                agent.notify_error(&message);
                continue;
            }
            Some(CommandOutcome::CustomPrompt(prompt)) => prompt,
            None => line,
        };

        let _ = session_log.lock().unwrap().log(RecordType::UserMessage, Utc::now(), serde_json::json!({ "text": prompt }));

        let (_, result) = tokio::join!(agent.run(prompt), tui.drive_while_running());
        if let Err(e) = result {
            tracing::error!("terminal error while running: {e}");
        }

        if let Some(last) = agent.conversation().last() {
            let _ = session_log.lock().unwrap().log(RecordType::AssistantMessage, Utc::now(), serde_json::json!({ "text": last.text() }));
        }
    }
}
