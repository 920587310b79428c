use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ask, chat, ingest, version};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Model and database options shared by the conversational commands
#[derive(Args, Debug, Clone)]
pub struct AgentArgs {
    /// SQLite database to answer from (opened read-only)
    #[arg(long, env = "DB_PATH")]
    pub db: PathBuf,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model to use
    #[arg(short, long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// OpenAI-compatible host
    #[arg(long, env = "OPENAI_HOST", default_value = "https://api.openai.com")]
    pub host: String,

    /// Maximum rows returned by a single query
    #[arg(long, default_value_t = 1000)]
    pub max_rows: usize,

    /// Binding values for SQL parameters, e.g. --context year=2024
    #[arg(short, long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Load QuickBooks or Rootfi JSON exports into the data table
    Ingest {
        /// Export files to load
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Database to write (the data table is replaced)
        #[arg(long, env = "DB_PATH")]
        db: PathBuf,

        /// JSON object mapping a category to QuickBooks account prefixes
        #[arg(long)]
        categories: Option<String>,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question
        question: String,

        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Start an interactive conversation
    Chat {
        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest {
            files,
            db,
            categories,
        } => ingest::execute(files, db, categories),
        Command::Ask { question, agent } => ask::execute(question, agent).await,
        Command::Chat { agent } => chat::execute(agent).await,
        Command::Version => version::execute(),
    }
}
