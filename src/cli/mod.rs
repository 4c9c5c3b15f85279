pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "nexus")]
#[command(about = "Nexus CLI - PIX codes, marketplace modules and API tokens")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Encode, decode and check PIX BR Codes")]
    Pix {
        #[command(subcommand)]
        cmd: commands::pix::PixCommands,
    },

    #[command(about = "Install and manage marketplace modules")]
    Module {
        #[command(subcommand)]
        cmd: commands::module::ModuleCommands,
    },

    #[command(about = "Issue API tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Pix { cmd } => commands::pix::handle(cmd, &config, output_format),
        Commands::Module { cmd } => commands::module::handle(cmd, &config, output_format),
        Commands::Token { cmd } => commands::token::handle(cmd, &config, output_format),
    }
}
