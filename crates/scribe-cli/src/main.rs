use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use scribe_application::ChatService;
use scribe_core::PassphraseSession;
use scribe_core::conversation::{ConversationRepository, MessageRole};
use scribe_infrastructure::{AsyncDirConversationRepository, ConfigService};
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

/// Read from the environment so the passphrase never shows up in `ps`.
const PASSPHRASE_ENV: &str = "SCRIBE_PASSPHRASE";

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Scribe - encrypted local conversation store", long_about = None)]
struct Cli {
    /// Store root (defaults to the per-user data directory)
    #[arg(long, global = true, env = "SCRIBE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations, most recently updated first
    List,
    /// Print a conversation
    Show {
        id: String,
        /// Print the stored JSON instead of a transcript
        #[arg(long)]
        json: bool,
    },
    /// Export a conversation as a plaintext transcript
    Export {
        id: String,
        /// Output file, or a directory to place a generated file name in
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a conversation
    Delete { id: String },
    /// Migrate a legacy store layout
    Migrate,
    /// Start a new conversation
    New {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Append a message to a conversation
    Append {
        id: String,
        /// user, assistant or system
        #[arg(long, default_value = "user")]
        role: MessageRole,
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigService::new().get_config().map_err(|e| anyhow!(e))?;
    commands::logging::init(&config.logging.level);
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = Some(dir);
    }

    let session = Arc::new(PassphraseSession::new());
    if let Some(passphrase) = std::env::var(PASSPHRASE_ENV).ok().filter(|p| !p.is_empty()) {
        session.unlock(passphrase);
    }

    let repository = Arc::new(
        AsyncDirConversationRepository::from_config(&config.store, session)
            .await
            .map_err(|e| anyhow!(e.user_message()))?,
    );
    let service = ChatService::new(repository.clone());

    let outcome = run(cli.command, repository.as_ref(), &service).await;
    let shutdown = repository.shutdown().await;

    outcome.map_err(|e| anyhow!(e.user_message()))?;
    shutdown.map_err(|e| anyhow!(e.user_message()))?;
    Ok(())
}

async fn run(
    command: Commands,
    repository: &AsyncDirConversationRepository,
    service: &ChatService,
) -> scribe_core::Result<()> {
    use commands::conversations;

    match command {
        Commands::List => conversations::list(repository).await,
        Commands::Show { id, json } => conversations::show(repository, &id, json).await,
        Commands::Export { id, out } => conversations::export(service, &id, out).await,
        Commands::Delete { id } => conversations::delete(repository, &id).await,
        Commands::Migrate => conversations::migrate(repository).await,
        Commands::New {
            provider,
            model,
            title,
        } => conversations::new(service, &provider, &model, title.as_deref()).await,
        Commands::Append { id, role, text } => {
            conversations::append(service, &id, role, &text).await
        }
    }
}
