//! Rightsizer CLI
//!
//! A command-line tool for triggering harvests, applying pending changes
//! and inspecting the rightsizer service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{invoke, pending, status, KindArg};

/// Rightsizer CLI
#[derive(Parser)]
#[command(name = "rsz")]
#[command(author, version, about = "CLI for the rightsizer service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (falls back to the config file, then localhost)
    #[arg(long, env = "RSZ_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest recommendations for a resource kind into pending changes
    Harvest {
        /// Resource kind to harvest
        kind: KindArg,
    },

    /// Apply a pending change
    Apply {
        /// Pending change key ({ResourceKind}/{resourceId})
        key: String,
    },

    /// Inspect pending changes
    #[command(subcommand)]
    Pending(PendingCommands),

    /// Show service health and readiness
    Status,
}

#[derive(Subcommand)]
pub enum PendingCommands {
    /// List pending changes
    List {
        /// Filter by resource kind
        #[arg(long, short)]
        kind: Option<KindArg>,
    },

    /// Show a single pending change
    Show {
        /// Pending change key ({ResourceKind}/{resourceId})
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let api_url = config::Config::load()?.resolve_api_url(cli.api_url);
    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Harvest { kind } => {
            invoke::harvest(&client, kind, cli.format).await?;
        }
        Commands::Apply { key } => {
            invoke::apply(&client, &key, cli.format).await?;
        }
        Commands::Pending(pending_cmd) => match pending_cmd {
            PendingCommands::List { kind } => {
                pending::list(&client, kind, cli.format).await?;
            }
            PendingCommands::Show { key } => {
                pending::show(&client, &key, cli.format).await?;
            }
        },
        Commands::Status => {
            status::show(&client, cli.format).await?;
        }
    }

    Ok(())
}
