//! Terminal front-end over the chat core.
//!
//! Reads lines from stdin: slash commands manage threads, anything else is
//! sent as a chat turn.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use confab::chat::{ChatManager, ChatMessage, Role};
use confab::config::Config;
use confab::handler;
use confab::lang::{self, Language, UiLabel};
use confab::llm::{ApiClient, ApiError, LimiterRegistry};

#[derive(Debug, Parser)]
#[command(name = "confab", about = "Chat with an LLM completion endpoint")]
struct Args {
    /// Interface language tag (en or ru).
    #[arg(long)]
    lang: Option<String>,

    /// Model name override.
    #[arg(long)]
    model: Option<String>,

    /// Completion endpoint base URL override.
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confab=warn".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(model) = args.model {
        config.api.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }
    if let Some(tag) = args.lang.as_deref() {
        config.language = Language::from_tag(tag)
            .with_context(|| format!("unsupported language tag {tag:?}"))?;
    }

    let registry = LimiterRegistry::new(config.rate_limit.clone());
    let client = ApiClient::http(
        &config.api,
        registry.for_session("local"),
        config.retry.clone(),
    );

    let mut manager = ChatManager::new(config.limits.max_threads);
    manager
        .create_thread(None, config.language.tag())
        .context("creating initial thread")?;

    repl(&mut manager, &client, &config).await
}

async fn repl(manager: &mut ChatManager, client: &ApiClient, config: &Config) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let lang = config.language;

    print_help(lang);
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = if let Some(command) = line.strip_prefix('/') {
            run_command(manager, config, command).await
        } else {
            send_turn(manager, client, config, line).await
        };
        match result {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => println!("error: {e:#}"),
        }
    }
}

/// Returns `Ok(true)` when the user asked to quit.
async fn run_command(manager: &mut ChatManager, config: &Config, command: &str) -> Result<bool> {
    let (name, arg) = match command.split_once(' ') {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match name {
        "quit" | "q" => return Ok(true),
        "new" => {
            let title = (!arg.is_empty()).then_some(arg);
            let thread = manager.create_thread(title, config.language.tag())?;
            println!("{}: {} [{}]", lang::label(config.language, UiLabel::NewChat), thread.title, thread.id());
        }
        "list" => {
            for thread in manager.threads() {
                let marker = if manager.active_thread().map(|t| t.id().to_string())
                    == Some(thread.id().to_string())
                {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {} [{}] ({} messages)", thread.title, thread.id(), thread.messages().len());
            }
        }
        "switch" => {
            let thread = manager.switch_thread(arg)?;
            println!("{}: {}", lang::label(config.language, UiLabel::SelectChat), thread.title);
        }
        "delete" => {
            manager.delete_thread(arg)?;
            println!("{}: {arg}", lang::label(config.language, UiLabel::DeleteChat));
        }
        "clear" => {
            let id = active_id(manager)?;
            manager.clear_thread(&id)?;
            println!("{}", lang::label(config.language, UiLabel::ClearChat));
        }
        "export" => {
            let id = active_id(manager)?;
            let snapshot = manager.export_thread(&id)?;
            tokio::fs::write(arg, snapshot)
                .await
                .with_context(|| format!("writing {arg}"))?;
            println!("{}: {arg}", lang::label(config.language, UiLabel::ExportChat));
        }
        "import" => {
            let data = tokio::fs::read_to_string(arg)
                .await
                .with_context(|| format!("reading {arg}"))?;
            let thread = manager.import_thread(&data)?;
            println!("{}: {} [{}]", lang::label(config.language, UiLabel::ImportChat), thread.title, thread.id());
        }
        _ => print_help(config.language),
    }
    Ok(false)
}

async fn send_turn(
    manager: &mut ChatManager,
    client: &ApiClient,
    config: &Config,
    text: &str,
) -> Result<bool> {
    let id = active_id(manager)?;
    let request = handler::build_request(manager.thread(&id)?, text, config)?;
    manager.append_message(&id, ChatMessage::new(Role::User, text))?;

    println!("{}", lang::label(config.language, UiLabel::Thinking));
    let reply = match client.send(&request).await {
        Ok(raw) => handler::parse_response(raw),
        Err(e) => Err(e),
    };
    // A failed exchange is recorded into the history instead of dropped, so
    // the session stays usable and the attempt stays visible.
    let message = reply.unwrap_or_else(|e: ApiError| {
        debug!(error = %e, "send failed");
        ChatMessage::with_error(
            Role::Assistant,
            lang::label(config.language, UiLabel::SendFailed),
            e.to_string(),
        )
    });
    match &message.error {
        Some(error) => println!("[{}] {error}", lang::label(config.language, UiLabel::SendFailed)),
        None => println!("{}", message.content),
    }
    manager.append_message(&id, message)?;
    Ok(false)
}

fn active_id(manager: &ChatManager) -> Result<String> {
    manager
        .active_thread()
        .map(|t| t.id().to_string())
        .context("no active thread; use /new or /switch")
}

fn print_help(lang_tag: Language) {
    println!("{}", lang::label(lang_tag, UiLabel::Placeholder));
    println!(
        "commands: /new [title]  /list  /switch <id>  /delete <id>  /clear  /export <file>  /import <file>  /quit"
    );
}
