pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "fileshare")]
#[command(about = "Fileshare CLI - administration for the file sharing backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create database tables and indexes")]
    Migrate,

    #[command(about = "Run one purge sweep over files marked for deletion")]
    Sweep,

    #[command(about = "Mint a bearer token for local development")]
    Token {
        #[arg(help = "Identity token the bearer token stands for")]
        identifier: String,
        #[arg(long, help = "Display name carried in the token")]
        name: Option<String>,
    },

    #[command(about = "Check server health status from the /health endpoint")]
    Health {
        #[arg(long, default_value = "http://localhost:3000", help = "Server base URL")]
        url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::store::migrate(output_format).await,
        Commands::Sweep => commands::store::sweep(output_format).await,
        Commands::Token { identifier, name } => commands::token::mint(&identifier, name, output_format),
        Commands::Health { url } => commands::health::check(&url, output_format).await,
    }
}
