//! Clonechat CLI — the main entry point.
//!
//! Commands:
//! - `onboard`    — Write a default config
//! - `chat`       — Interactive chat over the shared conversation
//! - `ask`        — Run a single send cycle
//! - `history`    — Print the conversation
//! - `knowledge`  — List topics or test retrieval
//! - `gateway`    — Start the HTTP API server
//! - `doctor`     — Diagnose system health

use clap::{Parser, Subcommand};
use clonechat_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "clonechat",
    about = "Clonechat — retrieval-augmented chat assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Chat interactively; every committed entry is printed as it arrives
    Chat,

    /// Send a single message and print the reply
    Ask {
        /// The message to send
        #[arg(short, long)]
        message: String,
    },

    /// Print the shared conversation
    History {
        /// Only the most recent N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the knowledge base
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// List every topic with its keywords
    List,

    /// Show which item a query would retrieve
    Query {
        /// The query to score
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    // An invalid config is reported by the command itself.
    let json_logs = AppConfig::load().map(|c| c.logging.json).unwrap_or(false);
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Ask { message } => commands::ask::run(message).await?,
        Commands::History { limit, json } => commands::history::run(limit, json).await?,
        Commands::Knowledge { action } => match action {
            KnowledgeAction::List => commands::knowledge::list().await?,
            KnowledgeAction::Query { query } => commands::knowledge::query(query).await?,
        },
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
