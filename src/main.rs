use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lovable_agent::{
    create_frontend_agent, AgentStep, Config, FileKind, ModelSelection, ProcessEnv, Session,
    ASSISTANT_ID,
};

const LOG_FILE_NAME: &str = "lovable-agent.log";
const DEFAULT_LOG_FILTER: &str = "info,lovable_agent=debug";

/// Lovable Agent - build web apps from a chat
#[derive(Parser, Debug)]
#[command(name = "lovable-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Config file (defaults to ~/.config/lovable-agent/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the resolved model selection and exit
    #[arg(long)]
    show_config: bool,

    /// Print every session file as JSON before exiting
    #[arg(long)]
    dump_files: bool,
}

/// Stream one turn to the terminal
async fn run_turn(session: &mut Session, input: &str) {
    session.send(input);
    let mut stdout = std::io::stdout();

    while let Some(step) = session.next().await {
        match step {
            AgentStep::TextDelta(text) => {
                print!("{}", text);
                let _ = stdout.flush();
            }
            AgentStep::ThinkingDelta(_) => {}
            AgentStep::ToolStarted { name, params, .. } => {
                let target = params
                    .get("file_path")
                    .or_else(|| params.get("url"))
                    .or_else(|| params.get("query"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                eprintln!("\n→ {} {}", name, target);
            }
            AgentStep::ToolFinished { name, result, .. } => {
                if result.is_error {
                    eprintln!("  {} failed: {}", name, result.content.lines().next().unwrap_or(""));
                }
            }
            AgentStep::Retrying { attempt, error } => {
                eprintln!("Retrying (attempt {}): {}", attempt, error);
            }
            AgentStep::Finished { usage } => {
                println!();
                tracing::info!("{}", usage.format_log());
            }
            AgentStep::Error(e) => {
                eprintln!("\nError: {}", e);
            }
        }
    }
}

async fn repl(session: &mut Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "exit" | "quit" => break,
            _ => run_turn(session, input).await,
        }
    }
    Ok(())
}

async fn dump_files(session: &Session) -> Result<()> {
    let todos = session.todos().await;
    let files: serde_json::Map<String, serde_json::Value> = session
        .file_contents()
        .await
        .into_iter()
        .map(|(path, data)| {
            let kind = FileKind::classify(&path);
            (path, json!({ "kind": kind, "content": data.text() }))
        })
        .collect();
    let output = json!({
        "thread_id": session.thread_id(),
        "files": files,
        "todos": todos,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up file-based logging
    let log_path = std::env::temp_dir().join(LOG_FILE_NAME);
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .init();

    // Load .env files (local first, then home directory)
    // Errors are ignored - files are optional
    let _ = dotenvy::from_filename(".env");
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".env"));
    }

    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if args.show_config {
        let selection = ModelSelection::resolve(&ProcessEnv);
        println!("assistant: {}", ASSISTANT_ID);
        println!("route:     {}", selection.route());
        println!("model:     {}", selection.model_name());
        println!("selection: {:?}", selection);
        println!("config:    {:?}", config);
        return Ok(());
    }

    let agent = create_frontend_agent(&ProcessEnv, &config)?;
    let mut session = agent.start_session();
    tracing::info!("Session {} ready", session.thread_id());

    match args.prompt {
        Some(ref prompt) => run_turn(&mut session, prompt).await,
        None => repl(&mut session).await?,
    }

    if args.dump_files {
        dump_files(&session).await?;
    }
    Ok(())
}
