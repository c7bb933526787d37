//! `stepwise run`: run one task in a workspace.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use stepwise_agent::{AgentLoop, JsonlRecorder, RunRequest, TracingObserver};
use stepwise_config::AppConfig;
use stepwise_core::{CancellationToken, EventChannel, RunStatus};
use stepwise_providers::OpenAiCompatProvider;
use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::prompt;
use crate::terminal::TerminalObserver;

/// Exit status for a run stopped with Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Args)]
pub struct RunArgs {
    /// Task to run; read from stdin when omitted
    #[arg(short, long)]
    message: Option<String>,

    /// Step budget (defaults to agent.max_steps)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_steps: Option<u32>,

    /// Workspace directory the tools operate in
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Write the JSONL event log here instead of the log directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not write an event log
    #[arg(long, conflicts_with = "log_file")]
    no_log: bool,

    /// File whose contents replace the built-in system prompt
    #[arg(long)]
    system_prompt: Option<PathBuf>,

    /// Configuration file (defaults to ~/.stepwise/config.toml)
    #[arg(long, env = "STEPWISE_CONFIG")]
    config: Option<PathBuf>,

    /// Show model reasoning when the backend provides it
    #[arg(long)]
    show_thinking: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => Ok(AppConfig::load()?),
    }
}

async fn read_task(message: Option<String>) -> anyhow::Result<String> {
    let task = match message {
        Some(message) => message,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read the task from stdin")?;
            buf
        }
    };
    let task = task.trim().to_string();
    anyhow::ensure!(!task.is_empty(), "no task given (use -m or pipe it on stdin)");
    Ok(task)
}

pub async fn run(args: RunArgs, verbose: bool) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_ref()).context("failed to load config")?;

    let provider = OpenAiCompatProvider::from_config(&config.llm).with_context(|| {
        format!(
            "set llm.api_key in {} or export STEPWISE_API_KEY",
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;

    let workspace = args
        .workspace
        .clone()
        .unwrap_or_else(|| config.agent.workspace_dir.clone());
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.display()))?;
    let workspace = workspace.canonicalize().unwrap_or(workspace);

    let prompt_path = args
        .system_prompt
        .clone()
        .or_else(|| config.agent.system_prompt_path.clone());
    let system_prompt = prompt::with_workspace_section(
        &prompt::load_system_prompt(prompt_path.as_deref())?,
        &workspace,
    );

    let task = read_task(args.message).await?;
    let tools = Arc::new(stepwise_tools::default_registry(&workspace, &config.tools));
    let agent = AgentLoop::from_config(Arc::new(provider), tools, &config);

    let mut events = EventChannel::new().with(Arc::new(TerminalObserver::new(args.show_thinking)));
    if verbose {
        events.subscribe(Arc::new(TracingObserver::new()));
    }
    if !args.no_log {
        let recorder = match &args.log_file {
            Some(path) => JsonlRecorder::create(path),
            None => JsonlRecorder::timestamped(AppConfig::log_dir()),
        };
        match recorder {
            Ok(recorder) => events.subscribe(Arc::new(recorder)),
            Err(e) => warn!(error = %e, "Event log disabled"),
        }
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n  Cancelling after the current step...");
                cancel.cancel();
            }
        })
    };

    let max_steps = args.max_steps.unwrap_or(config.agent.max_steps);
    let outcome = agent
        .run(
            RunRequest::new(system_prompt, task).with_max_steps(max_steps),
            events,
            cancel,
        )
        .await;
    ctrl_c.abort();

    println!("{}", outcome.text);
    eprintln!(
        "  [{} · {} steps · {} tokens]",
        outcome.status(),
        outcome.state.current_step,
        outcome.state.total_tokens
    );

    Ok(match outcome.status() {
        RunStatus::Error => ExitCode::FAILURE,
        RunStatus::Cancelled => ExitCode::from(EXIT_CANCELLED),
        _ => ExitCode::SUCCESS,
    })
}
