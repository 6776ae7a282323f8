//! LocalMind CLI, the main entry point.
//!
//! Commands:
//! - `chat`         Interactive or single-message chat
//! - `serve`        Start the HTTP gateway
//! - `compact`      Run one compaction check for a session
//! - `summary`      Print a session's chapter narrative
//! - `models`       List installed models (optionally pull the required ones)
//! - `summarizers`  Show which preferred summarizers are installed
//! - `reset`        Delete all chat history and long-term memories

use clap::{Parser, Subcommand};
use localmind_core::message::DEFAULT_SESSION;

mod commands;

#[derive(Parser)]
#[command(
    name = "localmind",
    about = "LocalMind: a local assistant with layered conversational memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session to continue
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,

        /// Chat model (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fold the oldest turns of a session into a chapter if it is over the window
    Compact {
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,

        /// Summarizer model (auto-selected if omitted)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Print the chapter narrative of a session
    Summary {
        #[arg(short, long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// List installed models
    Models {
        /// Pull any required model that is missing
        #[arg(long)]
        pull: bool,
    },

    /// Show which preferred summarizer models are installed
    Summarizers,

    /// Delete the transcript database and the vector store
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Chat {
            message,
            session,
            model,
        } => commands::chat::run(message, session, model).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Compact { session, model } => commands::compact::run(session, model).await?,
        Commands::Summary { session } => commands::summary::run(session).await?,
        Commands::Models { pull } => commands::models::run(pull).await?,
        Commands::Summarizers => commands::summarizers::run().await?,
        Commands::Reset { yes } => commands::reset::run(yes).await?,
    }

    Ok(())
}
