//! Mentor application binary - composition root.
//!
//! Ties together all Mentor crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Open the memory database and the calendar token store
//! 3. Build the completion backend (OpenAI-compatible or offline)
//! 4. Hand everything to the chat orchestrator
//! 5. Serve the REST API, or run a terminal chat

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use mentor_api::{start_server, AppState};
use mentor_calendar::{GoogleCalendar, TokenStore};
use mentor_chat::ChatOrchestrator;
use mentor_core::config::MentorConfig;
use mentor_core::types::DeleteTarget;
use mentor_memory::{Database, MemoryGateway, SqliteMemoryStore};

use cli::{CliArgs, Command};

const REPL_HELP: &str = "\
Commands:
  /history     show this session's transcript
  /clear       forget the conversation (memories stay)
  /memories    list what I remember about you
  /forget-all  delete every memory
  /help        show this help
  /quit        leave";

/// Wire the gateways from configuration into an orchestrator.
fn build_orchestrator(config: &MentorConfig) -> mentor_core::Result<ChatOrchestrator> {
    let general = &config.general;
    let tz = general.tz()?;

    let db = Database::new(&general.resolve(&config.memory.db_file))?;
    let memory = Arc::new(SqliteMemoryStore::new(Arc::new(db)));

    let tokens = Arc::new(TokenStore::from_config(general, &config.calendar)?);
    let calendar = Arc::new(GoogleCalendar::new(&config.calendar, tz, tokens)?);

    let completion = mentor_llm::build_completion(&config.llm);
    tracing::info!(backend = completion.name(), "Completion backend ready");

    Ok(ChatOrchestrator::new(
        config.chat.clone(),
        tz,
        memory,
        calendar,
        completion,
    ))
}

async fn serve(config: &MentorConfig, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let chat = Arc::new(build_orchestrator(config)?);
    let token_path = config.general.resolve("api_token");
    let token = mentor_api::auth::load_or_generate_token(&token_path);

    let state = AppState::new(chat, token, port);
    start_server(state).await?;
    Ok(())
}

async fn write_line(out: &mut tokio::io::Stdout, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Terminal chat loop. The student id doubles as the session id.
async fn chat_repl(config: &MentorConfig, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let chat = build_orchestrator(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();

    write_line(&mut out, "Hi! Ask me anything, or type /help.").await?;
    loop {
        out.write_all(b"> ").await?;
        out.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/help" => write_line(&mut out, REPL_HELP).await?,
            "/history" => {
                let turns = chat.history(user).await.unwrap_or_default();
                if turns.is_empty() {
                    write_line(&mut out, "(no history yet)").await?;
                }
                for turn in turns {
                    write_line(&mut out, &format!("[{}] {}", turn.role, turn.text)).await?;
                }
            }
            "/clear" => {
                chat.clear_history(user).await;
                write_line(&mut out, "Conversation cleared.").await?;
            }
            "/memories" => match chat.memory().list(user).await {
                Ok(facts) if facts.is_empty() => {
                    write_line(&mut out, "I don't remember anything about you yet.").await?
                }
                Ok(facts) => {
                    for fact in facts {
                        write_line(&mut out, &format!("- {}", fact.text)).await?;
                    }
                }
                Err(e) => write_line(&mut out, &format!("Memory is unavailable: {}", e)).await?,
            },
            "/forget-all" => match chat.memory().delete(user, DeleteTarget::All).await {
                Ok(n) => write_line(&mut out, &format!("Forgot {} memories.", n)).await?,
                Err(e) => write_line(&mut out, &format!("Memory is unavailable: {}", e)).await?,
            },
            _ => match chat.handle_utterance(user, &line).await {
                Ok(reply) => write_line(&mut out, &reply.text).await?,
                Err(e) => write_line(&mut out, &format!("error: {}", e)).await?,
            },
        }
    }
    Ok(())
}

async fn memories(
    config: &MentorConfig,
    user: &str,
    clear: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::new(&config.general.resolve(&config.memory.db_file))?;
    let store = SqliteMemoryStore::new(Arc::new(db));

    if clear {
        let removed = store.delete(user, DeleteTarget::All).await?;
        println!("Removed {} memories for '{}'.", removed, user);
        return Ok(());
    }

    let facts = store.list(user).await?;
    if facts.is_empty() {
        println!("No memories for '{}'.", user);
    }
    for fact in facts {
        println!(
            "{}  {}  {}",
            fact.id,
            fact.created_at.format("%Y-%m-%d %H:%M"),
            fact.text
        );
    }
    Ok(())
}

async fn calendar_auth(config: &MentorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tokens = TokenStore::from_config(&config.general, &config.calendar)?;
    println!("Open this URL in a browser and approve access:\n");
    println!("{}\n", tokens.authorization_url()?);
    print!("Paste the authorization code: ");
    std::io::Write::flush(&mut std::io::stdout())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let code = lines.next_line().await?.unwrap_or_default();
    let code = code.trim();
    if code.is_empty() {
        return Err("no authorization code entered".into());
    }

    tokens.exchange_code(code).await?;
    println!("Calendar connected. Token saved to {}", tokens.path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let config = MentorConfig::load_or_default(&config_path);

    // Logs go to stderr so the chat REPL keeps stdout to itself.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(config = %config_path.display(), "Mentor starting");

    match &args.command {
        Command::Serve { .. } => {
            let port = args.resolve_port(config.general.port);
            serve(&config, port).await
        }
        Command::Chat { user } => chat_repl(&config, user).await,
        Command::Memories { user, clear } => memories(&config, user, *clear).await,
        Command::CalendarAuth => calendar_auth(&config).await,
    }
}
