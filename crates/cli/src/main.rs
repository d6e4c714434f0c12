//! Nimbus CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Start the HTTP gateway
//! - `chat`  — Send a single message from the terminal
//! - `config` — Print the effective configuration as TOML

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "nimbus",
    about = "Nimbus — tool-augmented cloud operations chat assistant",
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
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a single message and print the streamed answer
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { message } => commands::chat::run(&message).await?,
        Commands::Config => commands::config_cmd::run()?,
    }

    Ok(())
}
