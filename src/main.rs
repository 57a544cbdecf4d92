use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use parley::adapters::{HttpConversationApi, WebSocketConnector};
use parley::application::{
    GetConversationDetailHandler, GetConversationDetailQuery, ListConversationsHandler,
    ListConversationsQuery, QueryConversationsHandler, QueryConversationsQuery, SessionController,
    SessionHandle, SessionSnapshot, StatusFilter,
};
use parley::config::AppConfig;
use parley::domain::conversation::{format_duration, ConnectionStatus, Sender};
use parley::domain::foundation::ConversationId;
use parley::ports::ConversationApi;

#[derive(Debug, Parser)]
#[command(name = "parley")]
#[command(about = "Chat with the assistant and browse past conversations", long_about = None)]
struct Cli {
    /// Emit logs as JSON (overrides PARLEY__LOGGING__JSON)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat session
    Chat(ChatArgs),
    /// List conversations
    List(ListArgs),
    /// Show one conversation with its history
    Show {
        /// Conversation id
        id: ConversationId,
    },
    /// Ask a question about past conversations
    Ask(AskArgs),
}

#[derive(Debug, Args)]
struct ChatArgs {
    /// Resume an existing conversation instead of starting fresh
    #[arg(long, value_name = "ID")]
    resume: Option<ConversationId>,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// all, ACTIVE or ENDED
    #[arg(long, default_value = "all")]
    status: StatusFilter,

    /// Case-insensitive title search
    #[arg(long)]
    search: Option<String>,
}

#[derive(Debug, Args)]
struct AskArgs {
    question: String,

    #[arg(long, default_value_t = 5)]
    max_results: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if cli.json {
        config.logging.json = true;
    }
    config.validate().context("Invalid configuration")?;
    init_tracing(&config);

    let api: Arc<dyn ConversationApi> = Arc::new(
        HttpConversationApi::new(&config.backend).context("Failed to create HTTP client")?,
    );

    match cli.command {
        Command::Chat(args) => chat(&config, api, args).await,
        Command::List(args) => list(api, args).await,
        Command::Show { id } => show(api, id).await,
        Command::Ask(args) => ask(api, args).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = config.logging.env_filter();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    // Already-installed subscribers are left alone.
    if config.logging.json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

async fn chat(config: &AppConfig, api: Arc<dyn ConversationApi>, args: ChatArgs) -> Result<()> {
    let connector = Arc::new(WebSocketConnector::new(
        config.backend.clone(),
        config.realtime.clone(),
    ));
    let session = SessionController::spawn(api, connector);

    let renderer = tokio::spawn(render(session.subscribe()));

    if let Some(id) = args.resume {
        session
            .load_conversation(id)
            .await
            .with_context(|| format!("Failed to load conversation {}", id))?;
    }

    println!("Type a message. Commands: /new, /end, /load <id>, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) => break,
            ("/new", _) => {
                session.start_new_conversation().await?;
                println!("-- new conversation --");
            }
            ("/end", _) => match session.end_conversation().await {
                Ok(Some(summary)) => println!("-- conversation ended --\nSummary: {}", summary),
                Ok(None) => println!("-- conversation ended --"),
                Err(e) => eprintln!("error: {}", e),
            },
            ("/load", id) => match id.parse::<ConversationId>() {
                Ok(id) => {
                    if let Err(e) = session.load_conversation(id).await {
                        eprintln!("error: {}", e);
                    }
                }
                Err(_) => eprintln!("usage: /load <id>"),
            },
            _ => spawn_send(&session, line.to_string()),
        }
    }

    session.shutdown().await?;
    renderer.abort();
    Ok(())
}

/// Sends without blocking the prompt; the first message of a conversation
/// waits for the channel handshake.
fn spawn_send(session: &SessionHandle, text: String) {
    let session = session.clone();
    tokio::spawn(async move {
        if let Err(e) = session.send_user_message(text).await {
            if !e.is_superseded() {
                eprintln!("error: {}", e);
            }
        }
    });
}

/// Prints assistant replies and connectivity changes as they happen.
async fn render(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut conversation = None;
    let mut printed = 0;
    let mut connection = ConnectionStatus::Disconnected;

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();

        if snapshot.conversation_id != conversation {
            conversation = snapshot.conversation_id;
            printed = 0;
            if let Some(id) = conversation {
                println!("-- conversation {} --", id);
            }
        }
        if snapshot.messages.len() < printed {
            printed = 0;
        }

        for message in &snapshot.messages[printed..] {
            if message.sender == Sender::Ai {
                println!("assistant> {}", message.content);
            }
        }
        printed = snapshot.messages.len();

        if snapshot.connection != connection {
            connection = snapshot.connection;
            if conversation.is_some() {
                eprintln!("[{}]", connection.label());
            }
        }
        let _ = io::stdout().flush();
    }
}

async fn list(api: Arc<dyn ConversationApi>, args: ListArgs) -> Result<()> {
    let handler = ListConversationsHandler::new(api);
    let conversations = handler
        .handle(ListConversationsQuery {
            status: args.status,
            search: args.search,
        })
        .await?;

    if conversations.is_empty() {
        println!("No conversations.");
        return Ok(());
    }

    for c in conversations {
        println!(
            "{:>6}  {:<6}  {}  {:>4}  {:>3} msgs  {}",
            c.id,
            c.status.as_str(),
            c.start_timestamp.display_short(),
            format_duration(c.duration),
            c.message_count,
            c.display_title()
        );
    }
    Ok(())
}

async fn show(api: Arc<dyn ConversationApi>, id: ConversationId) -> Result<()> {
    let handler = GetConversationDetailHandler::new(api);
    let detail = handler
        .handle(GetConversationDetailQuery { conversation_id: id })
        .await?;

    println!("{} [{}]", detail.display_title(), detail.status.as_str());
    println!(
        "Started {}  Duration {}",
        detail.start_timestamp.display_short(),
        format_duration(detail.duration)
    );
    if let Some(summary) = &detail.summary {
        println!("Summary: {}", summary);
    }
    println!();
    for message in &detail.messages {
        println!(
            "[{}] {}: {}",
            message.timestamp.display_short(),
            message.sender,
            message.content
        );
    }
    Ok(())
}

async fn ask(api: Arc<dyn ConversationApi>, args: AskArgs) -> Result<()> {
    let handler = QueryConversationsHandler::new(api);
    let answer = handler
        .handle(QueryConversationsQuery {
            question: args.question,
            max_results: Some(args.max_results),
            ..Default::default()
        })
        .await?;

    println!("{}", answer.answer);

    if !answer.relevant_excerpts.is_empty() {
        println!("\nExcerpts:");
        for excerpt in &answer.relevant_excerpts {
            println!(
                "  #{} {}: {}",
                excerpt.conversation_id, excerpt.sender, excerpt.content
            );
        }
    }
    if !answer.related_conversations.is_empty() {
        println!("\nRelated:");
        for related in &answer.related_conversations {
            println!(
                "  #{} {}",
                related.id,
                related.title.as_deref().unwrap_or("(untitled)")
            );
        }
    }
    Ok(())
}
